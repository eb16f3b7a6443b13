use serde::Serialize;

use crate::value::Value;

/// 带独立开闭标记的区间。
///
/// # 契约（What）
/// - `is_closed()` 仅在两端都闭合时为真，`is_open()` 仅在两端都开放时为真；
/// - 一端闭合一端开放的混合区间两者都为假；
/// - 边界值不做大小校验，语义由使用方解释。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Range {
    lower: Value,
    upper: Value,
    lower_closed: bool,
    upper_closed: bool,
}

impl Range {
    pub fn new(lower: Value, lower_closed: bool, upper: Value, upper_closed: bool) -> Self {
        Self {
            lower,
            upper,
            lower_closed,
            upper_closed,
        }
    }

    /// `[lower, upper]`
    pub fn closed(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::new(lower.into(), true, upper.into(), true)
    }

    /// `(lower, upper)`
    pub fn open(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::new(lower.into(), false, upper.into(), false)
    }

    /// `[lower, upper)`
    pub fn half_open(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::new(lower.into(), true, upper.into(), false)
    }

    pub fn lower(&self) -> &Value {
        &self.lower
    }

    pub fn upper(&self) -> &Value {
        &self.upper
    }

    pub fn is_lower_closed(&self) -> bool {
        self.lower_closed
    }

    pub fn is_upper_closed(&self) -> bool {
        self.upper_closed
    }

    pub fn is_closed(&self) -> bool {
        self.lower_closed && self.upper_closed
    }

    pub fn is_open(&self) -> bool {
        !self.lower_closed && !self.upper_closed
    }
}
