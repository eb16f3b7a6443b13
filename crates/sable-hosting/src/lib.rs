#![deny(unsafe_code)]
#![doc = "sable-hosting: 应用装配、TOML 配置、日志安装与请求服务入口。"]
#![doc = ""]
#![doc = "典型用法：读取 [`SableConfig`]，调用 [`logging::install`]，用 [`AppBuilder`] 定义扩展点，"]
#![doc = "`build` 得到 [`App`] 后执行 `prepare`，再把请求交给 [`App::dispatch`]。"]

pub mod app;
pub mod builder;
pub mod config;
pub mod logging;

pub use app::{App, Hook};
pub use builder::AppBuilder;
pub use config::{DispatchConfig, DuplicatePolicy, LoggingConfig, RegistrationConfig, SableConfig};
pub use logging::{LoggingError, install};

/// 宿主入口的一站式导入。
pub mod prelude {
    pub use sable_router::prelude::*;

    pub use crate::{App, AppBuilder, SableConfig};
}
