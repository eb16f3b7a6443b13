use core::fmt;
use core::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Serialize, Serializer};

use crate::error::SableError;

/// 12 字节的对象标识，规范文本形式为 24 位小写十六进制。
///
/// # 教案式说明
/// - **意图 (Why)**：为文档型存储的主键提供与外部系统一致的编码；
/// - **布局 (How)**：`generate` 采用 4 字节秒级时间戳 + 5 字节进程标识 + 3 字节自增计数；
/// - **契约 (What)**：`from_str` 只接受小写形式，保证 `from_str(to_string(x)) == x` 且 `to_string(from_str(s)) == s`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

static COUNTER: AtomicU32 = AtomicU32::new(0);

impl ObjectId {
    /// 以原始字节构造。
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// 生成新的标识。
    pub fn generate() -> Self {
        let seconds = chrono::Utc::now().timestamp() as u32;
        let process = u64::from(std::process::id()) ^ 0x5ab1_e000_0000;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&process.to_be_bytes()[3..]);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// 生成时刻（秒级 Unix 时间戳）。
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ObjectId {
    type Err = SableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &'static str| SableError::InvalidValue {
            kind: "object id",
            literal: s.to_owned(),
            reason: reason.into(),
        };
        if s.len() != 24 {
            return Err(invalid("expected 24 hexadecimal characters"));
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(invalid("hexadecimal digits must be lowercase"));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| invalid("not a hexadecimal string"))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_roundtrip() {
        let first = ObjectId::generate();
        let second = ObjectId::generate();
        assert_ne!(first, second, "同一秒内计数器必须区分两个标识");
        let text = first.to_string();
        assert_eq!(text.len(), 24);
        assert_eq!(text.parse::<ObjectId>().expect("生成值必须可解析"), first);
    }

    #[test]
    fn rejects_malformed_literals() {
        assert!("65f1c0ffee".parse::<ObjectId>().is_err());
        assert!("65F1C0FFEE0123456789ABCD".parse::<ObjectId>().is_err());
        assert!("zzzzzzzzzzzzzzzzzzzzzzzz".parse::<ObjectId>().is_err());
    }
}
