//! 命名空间内的具名注册表。
//!
//! # 教案级说明
//! - **意图 (Why)**：装饰器、管线项、处理器、中间件工厂都遵循“名字 → 回调”的形状，
//!   统一为泛型 [`Registry`]，让重复注册策略只在一处实现；
//! - **契约 (What)**：
//!   - 名字只在所属命名空间与注册表类别内唯一，跨命名空间同名互不影响；
//!   - 迭代顺序等于首次注册顺序，`Overwrite` 策略原位替换，不改变顺序；
//!   - `Reject` 策略下重复注册返回 [`SableError::DuplicateRegistration`]，旧条目保持不变。

use std::collections::HashMap;
use std::fmt;

use sable_core::{RegistryKind, Result, SableError};

/// 重复注册策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegistrationPolicy {
    /// 拒绝重复名字，启动期即暴露配置错误。
    #[default]
    Reject,
    /// 后注册者覆盖先注册者。
    Overwrite,
}

/// 保序的具名注册表。
pub struct Registry<T> {
    kind: RegistryKind,
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Registry<T> {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// 按策略插入条目。
    ///
    /// - **输入 (What)**：`namespace` 仅用于错误上下文，通常为点分隔的命名空间路径；
    /// - **返回**：`Overwrite` 时返回被替换的旧条目。
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        entry: T,
        policy: RegistrationPolicy,
        namespace: &str,
    ) -> Result<Option<T>> {
        let name = name.into();
        if let Some(&position) = self.index.get(&name) {
            return match policy {
                RegistrationPolicy::Reject => Err(SableError::DuplicateRegistration {
                    kind: self.kind,
                    name,
                    namespace: namespace.to_owned(),
                }),
                RegistrationPolicy::Overwrite => {
                    let slot = &mut self.entries[position].1;
                    Ok(Some(std::mem::replace(slot, entry)))
                }
            };
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, entry));
        Ok(None)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&position| &self.entries[position].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let position = *self.index.get(name)?;
        Some(&mut self.entries[position].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按注册顺序遍历。
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// 按注册顺序列出名字。
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_policy_keeps_first_entry() {
        let mut registry = Registry::new(RegistryKind::Handler);
        registry
            .insert("ping", 1, RegistrationPolicy::Reject, "")
            .expect("首次注册必须成功");
        let err = registry
            .insert("ping", 2, RegistrationPolicy::Reject, "")
            .expect_err("重复注册必须被拒绝");
        assert!(matches!(err, SableError::DuplicateRegistration { .. }));
        assert_eq!(registry.get("ping"), Some(&1));
    }

    #[test]
    fn overwrite_policy_replaces_in_place() {
        let mut registry = Registry::new(RegistryKind::Middleware);
        for (name, value) in [("a", 1), ("b", 2)] {
            registry
                .insert(name, value, RegistrationPolicy::Overwrite, "")
                .expect("首次注册必须成功");
        }
        let previous = registry
            .insert("a", 3, RegistrationPolicy::Overwrite, "")
            .expect("覆盖策略不应失败");
        assert_eq!(previous, Some(1));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"], "覆盖不应改变顺序");
        assert_eq!(registry.get("a"), Some(&3));
    }
}
