//! 运行期应用。
//!
//! # 教案级说明
//! - **意图 (Why)**：把冻结后的命名空间树、分发器、启动钩子与具名程序聚合为一个对象，
//!   作为传输层与命令行入口共同面对的门面；
//! - **契约 (What)**：
//!   - [`App`] 只读，可放入 `Arc` 在多个任务间共享；
//!   - `prepare` 按注册顺序执行启动钩子，首个失败即返回，其后的钩子不再执行；
//!   - `dispatch` 总是返回响应：未命中映射为配置的状态码，错误经 [`Response::from_error`] 转换。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use sable_core::{
    CallbackResult, Cancellation, RegistryKind, Request, Response, Result, SableError, Value,
};
use sable_router::{DispatchOutcome, Dispatcher, Namespace, Registry};
use tracing::{info, warn};

use crate::config::SableConfig;

/// 启动钩子与具名程序共用的回调形状，接收冻结后的主命名空间。
pub trait Hook: Send + Sync + 'static {
    fn call(&self, main: Arc<Namespace>) -> BoxFuture<'static, CallbackResult<()>>;
}

impl<F, Fut> Hook for F
where
    F: Fn(Arc<Namespace>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult<()>> + Send + 'static,
{
    fn call(&self, main: Arc<Namespace>) -> BoxFuture<'static, CallbackResult<()>> {
        (self)(main).boxed()
    }
}

pub(crate) type SharedHook = Arc<dyn Hook>;

/// 装配完成的应用。
pub struct App {
    config: SableConfig,
    dispatcher: Dispatcher,
    setups: Vec<SharedHook>,
    programs: Registry<SharedHook>,
}

impl App {
    pub(crate) fn new(
        config: SableConfig,
        dispatcher: Dispatcher,
        setups: Vec<SharedHook>,
        programs: Registry<SharedHook>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            setups,
            programs,
        }
    }

    pub fn config(&self) -> &SableConfig {
        &self.config
    }

    /// 主命名空间，即树根。
    pub fn main_namespace(&self) -> &Namespace {
        self.dispatcher.root()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// 已注册的程序名，按注册顺序。
    pub fn program_names(&self) -> impl Iterator<Item = &str> {
        self.programs.names()
    }

    /// 按注册顺序执行启动钩子。
    pub async fn prepare(&self) -> Result<()> {
        for (index, hook) in self.setups.iter().enumerate() {
            let name = format!("setup#{index}");
            hook.call(Arc::clone(self.dispatcher.root()))
                .await
                .map_err(|cause| {
                    warn!(hook = %name, "setup hook failed");
                    SableError::callback(RegistryKind::Setup, name.clone(), cause)
                })?;
        }
        info!(hooks = self.setups.len(), "application prepared");
        Ok(())
    }

    /// 运行具名程序。
    pub async fn run_program(&self, name: &str) -> Result<()> {
        let program = self
            .programs
            .get(name)
            .ok_or_else(|| SableError::not_found(RegistryKind::Program, name))?;
        info!(program = %name, "running program");
        program
            .call(Arc::clone(self.dispatcher.root()))
            .await
            .map_err(|cause| SableError::callback(RegistryKind::Program, name, cause))
    }

    /// 分发请求并折叠为响应。
    pub async fn dispatch(
        &self,
        request: impl Into<Arc<Request>>,
        body: Value,
        cancellation: Cancellation,
    ) -> Response {
        match self.dispatcher.dispatch(request, body, cancellation).await {
            Ok(DispatchOutcome::Completed(response)) => response,
            Ok(DispatchOutcome::NotFound) => Response::error(self.config.dispatch.not_found_status, "not found"),
            Err(error) => Response::from_error(&error),
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("setups", &self.setups.len())
            .field("programs", &self.programs)
            .finish()
    }
}
