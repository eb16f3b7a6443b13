//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为命名空间注册、装饰器应用、管线执行与请求分发提供统一的错误域；
//! - 区分“注册期配置错误”（应让启动失败）与“服务期回调失败”（只终止当前请求）。
//!
//! ## 设计要求（What）
//! - 所有错误派生 `thiserror::Error`，可直接交给上层的 `?` 与日志系统；
//! - 每个变体映射到 [`codes`] 中的稳定错误码，供外层边界转换为响应；
//! - 中间件短路（不调用 `next`）是正常控制流，不在此建模。

use std::borrow::Cow;
use std::error::Error as StdError;

use thiserror::Error;

/// 宿主回调抛出的底层原因，保持 `Send + Sync` 以便跨任务传播。
pub type ErrorCause = Box<dyn StdError + Send + Sync + 'static>;

/// 框架统一的返回值别名，默认错误类型为 [`SableError`]。
pub type Result<T, E = SableError> = core::result::Result<T, E>;

/// 宿主回调（装饰器、管线项、处理器、中间件）的返回值别名。
pub type CallbackResult<T> = core::result::Result<T, ErrorCause>;

/// 稳定错误码常量。
///
/// 码值遵循 `<域>.<语义>` 命名，外层边界可据此映射状态码与告警维度。
pub mod codes {
    /// 命名空间、处理器或注册项不存在。
    pub const NOT_FOUND: &str = "namespace.not_found";
    /// 同一命名空间内重复注册同名扩展点。
    pub const DUPLICATE_REGISTRATION: &str = "registry.duplicate";
    /// 装饰器、管线项、处理器或中间件回调失败。
    pub const CALLBACK_FAILURE: &str = "callback.failure";
    /// 调用方取消了请求分发。
    pub const CANCELLED: &str = "dispatch.cancelled";
    /// 值类型字面量无法解析。
    pub const INVALID_VALUE: &str = "value.invalid";
    /// 值无法序列化为响应体。
    pub const SERIALIZATION: &str = "value.serialization";
    /// 配置文本非法。
    pub const CONFIGURATION: &str = "config.invalid";
}

/// 注册项所属的扩展点类别，用于错误上下文与日志字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    Namespace,
    ModelDecorator,
    FieldDecorator,
    RelationDecorator,
    PropertyDecorator,
    EnumDecorator,
    EnumMemberDecorator,
    PipelineItem,
    Handler,
    HandlerGroup,
    ModelHandlerGroup,
    Middleware,
    Program,
    Setup,
}

impl RegistryKind {
    /// 返回适合日志与错误消息的短名称。
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Namespace => "namespace",
            RegistryKind::ModelDecorator => "model decorator",
            RegistryKind::FieldDecorator => "field decorator",
            RegistryKind::RelationDecorator => "relation decorator",
            RegistryKind::PropertyDecorator => "property decorator",
            RegistryKind::EnumDecorator => "enum decorator",
            RegistryKind::EnumMemberDecorator => "enum member decorator",
            RegistryKind::PipelineItem => "pipeline item",
            RegistryKind::Handler => "handler",
            RegistryKind::HandlerGroup => "handler group",
            RegistryKind::ModelHandlerGroup => "model handler group",
            RegistryKind::Middleware => "middleware",
            RegistryKind::Program => "program",
            RegistryKind::Setup => "setup hook",
        }
    }
}

impl core::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sable 核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合注册期与服务期的全部失败路径，使宿主只需面对一个错误类型；
///   借助细粒度枚举帮助排障人员快速定位是“配置错了”还是“回调炸了”。
/// - **契约 (What)**：
///   - 所有变体均满足 `Send + Sync + 'static`；
///   - `NotFound` 用于查找未命中，请求未匹配时分发引擎返回的是正常结果而非该错误；
///   - `CallbackFailure` 永远向直接调用方传播，不会被吞掉；
///   - `Cancelled` 表示在某个步骤之间观测到取消信号，其后的步骤均未执行。
/// - **执行逻辑 (How)**：通过 [`SableError::code`] 将变体映射为稳定错误码。
/// - **设计权衡 (Trade-offs)**：使用 `String` 保存名称与路径，牺牲少量分配换取可读的诊断信息。
#[derive(Debug, Error)]
pub enum SableError {
    /// 查找目标不存在。
    #[error("{kind} `{name}` is not registered")]
    NotFound { kind: RegistryKind, name: String },

    /// 同一命名空间内重复注册，且当前策略禁止覆盖。
    ///
    /// - **契约 (What)**：`namespace` 为点分隔的命名空间路径，根命名空间为空字符串。
    #[error("{kind} `{name}` is already registered in namespace `{namespace}`")]
    DuplicateRegistration {
        kind: RegistryKind,
        name: String,
        namespace: String,
    },

    /// 宿主回调失败。
    ///
    /// - **意图 (Why)**：静默丢失元数据或静默吞掉请求失败都不可接受，因此保留底层原因；
    /// - **契约 (What)**：`stage` 标识失败所在的扩展点类别，`name` 为注册名。
    #[error("{stage} `{name}` failed: {source}")]
    CallbackFailure {
        stage: RegistryKind,
        name: String,
        #[source]
        source: ErrorCause,
    },

    /// 请求在步骤之间被取消。
    #[error("dispatch cancelled before `{step}`")]
    Cancelled { step: String },

    /// 值类型字面量非法。
    #[error("invalid {kind} literal `{literal}`: {reason}")]
    InvalidValue {
        kind: &'static str,
        literal: String,
        reason: Cow<'static, str>,
    },

    /// 值无法序列化。
    #[error("value cannot be serialized: {0}")]
    Serialization(String),

    /// 配置非法。
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl SableError {
    /// 构造 `NotFound`。
    pub fn not_found(kind: RegistryKind, name: impl Into<String>) -> Self {
        SableError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// 将宿主回调返回的任意错误包装为 `CallbackFailure`。
    ///
    /// 若 `cause` 本身已是 `CallbackFailure` 或 `Cancelled`，原样返回，避免多层包装掩盖真正的失败点。
    pub fn callback(stage: RegistryKind, name: impl Into<String>, cause: impl Into<ErrorCause>) -> Self {
        let cause: ErrorCause = cause.into();
        match cause.downcast::<SableError>() {
            Ok(inner) => match *inner {
                inner @ (SableError::CallbackFailure { .. } | SableError::Cancelled { .. }) => inner,
                other => SableError::CallbackFailure {
                    stage,
                    name: name.into(),
                    source: Box::new(other),
                },
            },
            Err(cause) => SableError::CallbackFailure {
                stage,
                name: name.into(),
                source: cause,
            },
        }
    }

    /// 以纯文本消息构造 `CallbackFailure`，常用于校验类管线项。
    pub fn callback_message(
        stage: RegistryKind,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message: String = message.into();
        SableError::CallbackFailure {
            stage,
            name: name.into(),
            source: message.into(),
        }
    }

    /// 复制出一个独立的错误：变体、名称与消息保持一致，底层原因以文本形式保留。
    ///
    /// 分发链把原始失败留给分发器，把副本交还给上游中间件。
    pub fn to_detached(&self) -> Self {
        match self {
            SableError::NotFound { kind, name } => SableError::NotFound {
                kind: *kind,
                name: name.clone(),
            },
            SableError::DuplicateRegistration {
                kind,
                name,
                namespace,
            } => SableError::DuplicateRegistration {
                kind: *kind,
                name: name.clone(),
                namespace: namespace.clone(),
            },
            SableError::CallbackFailure { stage, name, source } => SableError::CallbackFailure {
                stage: *stage,
                name: name.clone(),
                source: source.to_string().into(),
            },
            SableError::Cancelled { step } => SableError::Cancelled { step: step.clone() },
            SableError::InvalidValue {
                kind,
                literal,
                reason,
            } => SableError::InvalidValue {
                kind: *kind,
                literal: literal.clone(),
                reason: reason.clone(),
            },
            SableError::Serialization(message) => SableError::Serialization(message.clone()),
            SableError::Configuration(message) => SableError::Configuration(message.clone()),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            SableError::NotFound { .. } => codes::NOT_FOUND,
            SableError::DuplicateRegistration { .. } => codes::DUPLICATE_REGISTRATION,
            SableError::CallbackFailure { .. } => codes::CALLBACK_FAILURE,
            SableError::Cancelled { .. } => codes::CANCELLED,
            SableError::InvalidValue { .. } => codes::INVALID_VALUE,
            SableError::Serialization(_) => codes::SERIALIZATION,
            SableError::Configuration(_) => codes::CONFIGURATION,
        }
    }

    /// 是否为回调失败。
    pub fn is_callback_failure(&self) -> bool {
        matches!(self, SableError::CallbackFailure { .. })
    }

    /// 是否为取消。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SableError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_keeps_innermost_failure() {
        let inner = SableError::callback_message(RegistryKind::PipelineItem, "isEmail", "not an email");
        let outer = SableError::callback(RegistryKind::Handler, "signUp", inner);
        match outer {
            SableError::CallbackFailure { stage, name, .. } => {
                assert_eq!(stage, RegistryKind::PipelineItem);
                assert_eq!(name, "isEmail");
            }
            other => panic!("应保留最内层失败，实际为 {other:?}"),
        }
    }

    #[test]
    fn detached_copy_keeps_variant_and_message() {
        let original = SableError::callback(RegistryKind::Handler, "ping", std::io::Error::other("disk gone"));
        let copy = original.to_detached();
        assert_eq!(copy.code(), original.code());
        assert_eq!(copy.to_string(), original.to_string(), "副本的消息必须与原始失败一致");
        let cancelled = SableError::Cancelled { step: "auth".to_owned() }.to_detached();
        assert!(cancelled.is_cancelled());
    }

    #[test]
    fn callback_wraps_foreign_errors() {
        let io = std::io::Error::other("disk gone");
        let err = SableError::callback(RegistryKind::Middleware, "audit", io);
        assert_eq!(err.code(), codes::CALLBACK_FAILURE);
        assert!(err.to_string().contains("middleware `audit` failed"));
        assert!(StdError::source(&err).is_some(), "底层原因必须可追溯");
    }
}
