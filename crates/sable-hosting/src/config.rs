//! 应用配置。
//!
//! # 教案级说明
//! - **意图 (Why)**：把“重复注册怎么处理”“中间件是否继承”“未命中返回什么状态码”“日志过滤”
//!   这些部署期决策从代码中剥离，交给 TOML 文件；
//! - **契约 (What)**：
//!   - 所有字段都有默认值，空文本即得到默认配置；
//!   - 未知字段视为错误，避免拼写错误被静默忽略；
//!   - 解析或校验失败统一返回 [`SableError::Configuration`]。
//!
//! ```toml
//! [registration]
//! duplicates = "reject"      # 或 "overwrite"
//!
//! [dispatch]
//! inherit_middleware = true
//! not_found_status = 404
//!
//! [logging]
//! filter = "info"
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use sable_core::{Result, SableError};
use sable_router::{DispatchOptions, RegistrationPolicy};
use serde::Deserialize;

/// 顶层配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SableConfig {
    pub registration: RegistrationConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

/// `[registration]` 段。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationConfig {
    pub duplicates: DuplicatePolicy,
}

/// 重复注册策略的配置表示。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Overwrite,
}

impl From<DuplicatePolicy> for RegistrationPolicy {
    fn from(value: DuplicatePolicy) -> Self {
        match value {
            DuplicatePolicy::Reject => RegistrationPolicy::Reject,
            DuplicatePolicy::Overwrite => RegistrationPolicy::Overwrite,
        }
    }
}

/// `[dispatch]` 段。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub inherit_middleware: bool,
    /// 未命中请求映射的状态码，必须落在 `100..=599`。
    pub not_found_status: u16,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inherit_middleware: true,
            not_found_status: 404,
        }
    }
}

/// `[logging]` 段。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` 指令，`RUST_LOG` 存在时以环境变量为准。
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl SableConfig {
    /// 从 TOML 文本解析并校验。
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SableConfig =
            toml::from_str(source).map_err(|err| SableError::Configuration(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 读取文件并解析。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|err| SableError::Configuration(format!("cannot read `{}`: {err}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn registration_policy(&self) -> RegistrationPolicy {
        self.registration.duplicates.into()
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            inherit_middleware: self.dispatch.inherit_middleware,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(100..=599).contains(&self.dispatch.not_found_status) {
            return Err(SableError::Configuration(format!(
                "dispatch.not_found_status must be within 100..=599, got {}",
                self.dispatch.not_found_status
            )));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(SableError::Configuration("logging.filter must not be empty".to_owned()));
        }
        Ok(())
    }
}

impl FromStr for SableConfig {
    type Err = SableError;

    fn from_str(source: &str) -> Result<Self> {
        Self::from_toml_str(source)
    }
}
