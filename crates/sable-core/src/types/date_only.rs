use core::fmt;
use core::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

use crate::error::SableError;

const FORMAT: &str = "%Y-%m-%d";

/// 不带时区与时间分量的日历日期，规范文本形式为 `YYYY-MM-DD`。
///
/// # 契约（What）
/// - `to_string()` 始终输出补零的规范形式；
/// - `from_str` 只接受规范形式，因此对任何合法字面量 `s` 都有 `s.parse::<DateOnly>()?.to_string() == s`；
/// - 日期运算属于外部协作方，这里只提供访问器与编解码。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateOnly(NaiveDate);

impl DateOnly {
    /// 由年月日构造；非法日期返回 `None`。
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// 暴露底层 `chrono` 日期，供外部日期运算使用。
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateOnly {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl fmt::Display for DateOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl FromStr for DateOnly {
    type Err = SableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &'static str| SableError::InvalidValue {
            kind: "date",
            literal: s.to_owned(),
            reason: reason.into(),
        };
        let date = NaiveDate::parse_from_str(s, FORMAT).map_err(|_| invalid("expected YYYY-MM-DD"))?;
        let parsed = Self(date);
        // chrono 接受未补零的月日，这里拒绝非规范写法以保证往返一致。
        if parsed.to_string() != s {
            return Err(invalid("non-canonical date literal"));
        }
        Ok(parsed)
    }
}

impl Serialize for DateOnly {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
