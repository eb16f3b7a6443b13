//! 应用装配。

use std::fmt;
use std::sync::Arc;

use sable_core::{RegistryKind, Result};
use sable_router::{Dispatcher, Namespace, Registry, install_std};
use tracing::{debug, info};

use crate::app::{App, Hook, SharedHook};
use crate::config::SableConfig;

/// `AppBuilder` 聚合注册期的全部步骤，`build` 之后树即冻结。
///
/// # 教案级注释
/// - **设计目标 (Why)**：主命名空间在整个进程中只有一个，由 Builder 独占创建与持有，
///   宿主通过 [`Self::main_namespace_mut`] 逐步定义扩展点；
/// - **关键流程 (How)**
///   1. `new`：按配置的重复注册策略创建主命名空间；
///   2. `with_std`：安装内建 `std` 命名空间；
///   3. `setup`/`program`：登记启动钩子与具名程序；
///   4. `build`：把树移交给 [`Dispatcher`]，产出只读的 [`App`]。
/// - **契约说明 (What)**
///   - 配置步骤返回 `Result<&mut Self>`，注册冲突立即暴露；
///   - 钩子只在 [`App::prepare`] 中执行，Builder 本身不运行任何异步代码。
pub struct AppBuilder {
    config: SableConfig,
    main: Namespace,
    setups: Vec<SharedHook>,
    programs: Registry<SharedHook>,
}

impl AppBuilder {
    pub fn new(config: SableConfig) -> Self {
        let main = Namespace::main_with_policy(config.registration_policy());
        Self {
            config,
            main,
            setups: Vec::new(),
            programs: Registry::new(RegistryKind::Program),
        }
    }

    pub fn config(&self) -> &SableConfig {
        &self.config
    }

    /// 主命名空间。
    pub fn main_namespace_mut(&mut self) -> &mut Namespace {
        &mut self.main
    }

    /// 安装内建 `std` 命名空间。
    pub fn with_std(&mut self) -> Result<&mut Self> {
        install_std(&mut self.main)?;
        Ok(self)
    }

    /// 登记启动钩子。
    pub fn setup<H: Hook>(&mut self, hook: H) -> &mut Self {
        self.setups.push(Arc::new(hook));
        debug!(hooks = self.setups.len(), "setup hook registered");
        self
    }

    /// 登记具名程序，重名按主命名空间的策略处理。
    pub fn program<H: Hook>(&mut self, name: impl Into<String>, hook: H) -> Result<&mut Self> {
        let name = name.into();
        let policy = self.main.registration_policy();
        self.programs
            .insert(name.clone(), Arc::new(hook) as SharedHook, policy, "")?;
        debug!(program = %name, "program registered");
        Ok(self)
    }

    /// 冻结命名空间树并构造应用。
    pub fn build(self) -> Result<App> {
        let AppBuilder {
            config,
            main,
            setups,
            programs,
        } = self;
        let dispatcher = Dispatcher::with_options(main, config.dispatch_options());
        info!(
            std = dispatcher.root().namespace(sable_router::STD_NAMESPACE).is_some(),
            setups = setups.len(),
            programs = programs.len(),
            inherit_middleware = config.dispatch.inherit_middleware,
            "application built"
        );
        Ok(App::new(config, dispatcher, setups, programs))
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new(SableConfig::default())
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("main", &self.main.display_path())
            .field("setups", &self.setups.len())
            .field("programs", &self.programs)
            .finish()
    }
}
