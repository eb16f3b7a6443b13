//! 全局日志安装。
//!
//! # 教案式说明
//! - **意图（Why）**：库代码只发出 `tracing` 事件，由宿主在进程入口一次性决定输出方式；
//! - **逻辑（How）**：
//!   1. 检查本模块是否已安装，以及外部是否已设置全局 Subscriber；
//!   2. 以 `RUST_LOG` 优先、配置兜底的顺序构造 `EnvFilter`；
//!   3. 组装 `registry + EnvFilter + fmt` 并设置为全局 Subscriber；
//! - **契约（What）**：重复调用返回 [`LoggingError::AlreadyInstalled`]；外部已配置 Subscriber 时返回
//!   [`LoggingError::SubscriberAlreadySet`]，不会覆盖宿主自己的配置。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

use crate::config::LoggingConfig;

static INSTALLED: OnceLock<String> = OnceLock::new();

/// 日志安装错误。
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("logging has already been installed")]
    AlreadyInstalled,
    #[error("a global tracing subscriber is already set")]
    SubscriberAlreadySet,
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("failed to set global subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 安装全局日志。
pub fn install(config: &LoggingConfig) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Err(LoggingError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(LoggingError::SubscriberAlreadySet);
    }

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| config.filter.clone());
    let filter = build_filter(&directives)?;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    INSTALLED
        .set(directives.clone())
        .map_err(|_| LoggingError::AlreadyInstalled)?;
    tracing::info!(filter = %directives, "logging installed");
    Ok(())
}

/// 已安装时返回生效的过滤指令。
pub fn installed_filter() -> Option<&'static str> {
    INSTALLED.get().map(String::as_str)
}

fn build_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|err| LoggingError::InvalidFilter {
        filter: directives.to_owned(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directives_are_validated() {
        assert!(build_filter("info,sable_router=debug").is_ok());
        let err = build_filter("sable_router=loud").expect_err("非法级别必须被拒绝");
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
    }
}
