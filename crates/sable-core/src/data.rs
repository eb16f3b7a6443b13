//! 实体元数据袋。
//!
//! # 教案级说明
//! - **意图 (Why)**：模型、字段、属性、关系、枚举与枚举成员都需要承载装饰器贡献的任意元数据，
//!   统一为一个键值结构，避免每类实体各自维护一套存取逻辑；
//! - **契约 (What)**：键唯一、后写覆盖；读取缺失键返回 `None` 而非错误，读取不改变状态；
//! - **设计 (How)**：内部持有 `BTreeMap`，迭代顺序稳定，便于日志与快照比对；
//! - **权衡 (Trade-offs)**：注册阶段结束后不再加锁冻结，只依赖“定型后无人写入”的约定。

use std::collections::{BTreeMap, btree_map};

use crate::value::Value;

/// 键值元数据表。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataBag(BTreeMap<String, Value>);

impl DataBag {
    /// 创建空的数据袋。
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或覆盖键值对。
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// 读取键值；缺失时返回 `None`。
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 移除键并返回旧值。
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 按键的字典序遍历。
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a DataBag {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_and_absent_reads_are_none() {
        let mut bag = DataBag::new();
        assert_eq!(bag.data("unique"), None, "未写入的键必须返回“无值”");
        bag.set_data("unique", true);
        bag.set_data("unique", false);
        assert_eq!(bag.data("unique"), Some(&Value::Bool(false)));
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.remove("unique"), Some(Value::Bool(false)));
        assert!(bag.is_empty());
    }
}
