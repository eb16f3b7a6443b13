//! 处理器、处理器分组与模型处理器分组。
//!
//! # 教案级说明
//! - **意图 (Why)**：处理器是分发链的终点，产出响应；分组把一组处理器挂在同一路径段之下，
//!   模型处理器分组则以模型名作为路径段，为每个模型暴露固定形状的子路由 `/<model>/<action>`；
//! - **契约 (What)**：
//!   - 处理器接收按值移动的 [`RequestCtx`]，返回 `Response` 或失败；
//!   - 未显式指定方法的处理器接受任意方法；
//!   - 分组内处理器名与命名空间内处理器名互不冲突。

use std::fmt;
use std::future::{self, Future};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use sable_core::{CallbackResult, Method, RegistryKind, RequestCtx, Response, Result};
use tracing::debug;

use crate::registry::{RegistrationPolicy, Registry};
use crate::route::HandlerRoute;

/// 请求处理器。
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: RequestCtx) -> BoxFuture<'static, CallbackResult<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult<Response>> + Send + 'static,
{
    fn call(&self, ctx: RequestCtx) -> BoxFuture<'static, CallbackResult<Response>> {
        (self)(ctx).boxed()
    }
}

/// 同步处理器适配器，见 [`sync_handler`]。
pub struct SyncHandler<F>(F);

impl<F> Handler for SyncHandler<F>
where
    F: Fn(RequestCtx) -> CallbackResult<Response> + Send + Sync + 'static,
{
    fn call(&self, ctx: RequestCtx) -> BoxFuture<'static, CallbackResult<Response>> {
        future::ready((self.0)(ctx)).boxed()
    }
}

/// 把同步函数适配为处理器。
pub fn sync_handler<F>(callback: F) -> SyncHandler<F>
where
    F: Fn(RequestCtx) -> CallbackResult<Response> + Send + Sync + 'static,
{
    SyncHandler(callback)
}

/// 注册表中的处理器条目。
#[derive(Clone)]
pub struct HandlerEntry {
    handler: Arc<dyn Handler>,
    route: HandlerRoute,
}

impl HandlerEntry {
    pub fn new<H: Handler>(handler: H, route: HandlerRoute) -> Self {
        Self {
            handler: Arc::new(handler),
            route,
        }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn route(&self) -> &HandlerRoute {
        &self.route
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry").field("route", &self.route).finish()
    }
}

/// 分组类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    /// 普通分组，路径段为分组名。
    Plain,
    /// 模型分组，路径段为模型名。
    Model,
}

/// 处理器分组。
///
/// # 教案式说明
/// - **意图 (Why)**：`define_handler_group`/`define_model_handler_group` 在注册期把分组交给宿主回调，
///   由回调在其中定义处理器；分组定义完成后整体登记到命名空间；
/// - **契约 (What)**：分组继承所属命名空间的重复注册策略，组内重名按策略处理。
pub struct HandlerGroup {
    name: String,
    kind: GroupKind,
    namespace: String,
    policy: RegistrationPolicy,
    handlers: Registry<HandlerEntry>,
}

impl HandlerGroup {
    pub(crate) fn new(
        name: impl Into<String>,
        kind: GroupKind,
        namespace: String,
        policy: RegistrationPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            namespace,
            policy,
            handlers: Registry::new(RegistryKind::Handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// 定义接受任意方法的处理器。
    pub fn define_handler<H: Handler>(&mut self, name: impl Into<String>, handler: H) -> Result<()> {
        self.insert(name.into(), HandlerEntry::new(handler, HandlerRoute::any()))
    }

    /// 定义只接受指定方法的处理器。
    pub fn define_handler_with_method<H: Handler>(
        &mut self,
        name: impl Into<String>,
        method: Method,
        handler: H,
    ) -> Result<()> {
        self.insert(name.into(), HandlerEntry::new(handler, HandlerRoute::method(method)))
    }

    fn insert(&mut self, name: String, entry: HandlerEntry) -> Result<()> {
        let scope = if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        };
        self.handlers.insert(name.clone(), entry, self.policy, &scope)?;
        debug!(group = %scope, handler = %name, "handler defined in group");
        Ok(())
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerEntry> {
        self.handlers.get(name)
    }

    pub fn handlers(&self) -> &Registry<HandlerEntry> {
        &self.handlers
    }
}

impl fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("handlers", &self.handlers)
            .finish()
    }
}
