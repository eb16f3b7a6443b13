//! 中间件、中间件工厂与 `next` 续延。
//!
//! # 教案级说明
//! - **意图 (Why)**：中间件以洋葱模型包裹处理器：进入时按根到叶、注册顺序执行，
//!   返回时按相反顺序看到下游产出的响应；
//! - **契约 (What)**：
//!   - 工厂在链装配时以引用处参数调用一次，产出的中间件实例被缓存复用；
//!   - 中间件收到 `(ctx, next)`，可以修改上下文、不调用 `next` 直接返回（短路）、
//!     调用 `next.run(ctx).await` 后加工响应，或返回失败；
//!   - 每一步之前检查取消令牌，观测到取消后不再调用任何中间件或处理器。
//! - **设计 (How)**：[`Next`] 持有装配好的链、步骤下标与终端处理器，每次 `run` 只推进一步，
//!   不在装配期构造嵌套闭包。

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use sable_core::{Arguments, CallbackResult, RegistryKind, RequestCtx, Response, Result, SableError};
use tracing::{debug, trace};

use crate::handler::Handler;

/// 链上的中间件。
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: RequestCtx, next: Next) -> BoxFuture<'static, CallbackResult<Response>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(RequestCtx, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult<Response>> + Send + 'static,
{
    fn call(&self, ctx: RequestCtx, next: Next) -> BoxFuture<'static, CallbackResult<Response>> {
        (self)(ctx, next).boxed()
    }
}

/// 以参数构造中间件的工厂。
pub trait MiddlewareFactory: Send + Sync + 'static {
    fn create(&self, arguments: &Arguments) -> CallbackResult<Arc<dyn Middleware>>;
}

impl<F, M> MiddlewareFactory for F
where
    F: Fn(&Arguments) -> CallbackResult<M> + Send + Sync + 'static,
    M: Middleware,
{
    fn create(&self, arguments: &Arguments) -> CallbackResult<Arc<dyn Middleware>> {
        let middleware = (self)(arguments)?;
        Ok(Arc::new(middleware))
    }
}

/// 为闭包标注中间件签名，使参数与返回类型无需逐一注解。
pub fn middleware_fn<F, Fut>(callback: F) -> F
where
    F: Fn(RequestCtx, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult<Response>> + Send + 'static,
{
    callback
}

/// 为闭包标注工厂签名，见 [`middleware_fn`]。
pub fn factory_fn<F, M>(callback: F) -> F
where
    F: Fn(&Arguments) -> CallbackResult<M> + Send + Sync + 'static,
    M: Middleware,
{
    callback
}

/// 命名空间上登记的一次中间件使用。
#[derive(Clone, Debug, PartialEq)]
pub struct MiddlewareUse {
    reference: Vec<String>,
    arguments: Arguments,
}

impl MiddlewareUse {
    pub fn new(reference: Vec<String>, arguments: Arguments) -> Self {
        Self {
            reference,
            arguments,
        }
    }

    /// 相对登记命名空间的工厂引用。
    pub fn reference(&self) -> &[String] {
        &self.reference
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn display_name(&self) -> String {
        self.reference.join(".")
    }
}

/// 装配完成的链节点。
#[derive(Clone)]
pub struct ChainLink {
    name: String,
    middleware: Arc<dyn Middleware>,
}

impl ChainLink {
    pub fn new(name: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        Self {
            name: name.into(),
            middleware,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink").field("name", &self.name).finish()
    }
}

/// 装配完成的中间件链。
pub type Chain = Arc<[ChainLink]>;

/// 一次分发内所有续延共享的状态。
///
/// - `progress` 记录推进到达的最深步骤，用于识别短路；
/// - `failure` 保存链上出现的第一个失败。中间件拿到的是它的副本，即使中间件把失败
///   吞掉并返回 `Ok`，分发器仍以这里的原始失败作为结果。
#[derive(Debug, Default)]
pub(crate) struct ChainState {
    progress: AtomicUsize,
    failure: Mutex<Option<SableError>>,
}

impl ChainState {
    /// 登记失败并返回交给上游的错误：首个失败被保存，上游拿到副本。
    fn record(&self, error: SableError) -> SableError {
        let mut slot = self.failure.lock();
        if slot.is_some() {
            return error;
        }
        let detached = error.to_detached();
        *slot = Some(error);
        detached
    }

    /// 取出链上的首个失败。
    pub(crate) fn take_failure(&self) -> Option<SableError> {
        self.failure.lock().take()
    }
}

/// 指向链中下一步的续延。
///
/// # 教案式说明
/// - **契约 (What)**：`Next` 不可克隆，`run` 消耗续延，因此每个中间件至多推进一次下游；
///   下游失败向上传播，已包装的 `CallbackFailure` 不会被重复包装；链上的首个失败同时记入
///   共享状态，中间件无法把它吞掉；
/// - **执行逻辑 (How)**：
///   1. 记录本次推进到达的最深步骤，用于识别短路；
///   2. 检查取消令牌；
///   3. 下标未越界时调用对应中间件，否则调用终端处理器；
///   4. 失败交给 [`ChainState`] 登记后再返回。
///
/// ```compile_fail
/// fn assert_clone<T: Clone>() {}
/// assert_clone::<sable_router::Next>();
/// ```
pub struct Next {
    chain: Chain,
    index: usize,
    terminal: Arc<dyn Handler>,
    handler_name: Arc<str>,
    state: Arc<ChainState>,
}

impl Next {
    pub(crate) fn new(chain: Chain, terminal: Arc<dyn Handler>, handler_name: &str) -> Self {
        Self {
            chain,
            index: 0,
            terminal,
            handler_name: Arc::from(handler_name),
            state: Arc::new(ChainState::default()),
        }
    }

    pub(crate) fn state(&self) -> Arc<ChainState> {
        Arc::clone(&self.state)
    }

    /// 尚未执行的中间件数量（不含处理器）。
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }

    /// 推进到下一步。
    pub fn run(self, ctx: RequestCtx) -> BoxFuture<'static, Result<Response>> {
        let state = Arc::clone(&self.state);
        async move { self.step(ctx).await.map_err(|error| state.record(error)) }.boxed()
    }

    async fn step(self, ctx: RequestCtx) -> Result<Response> {
        let Next {
            chain,
            index,
            terminal,
            handler_name,
            state,
        } = self;
        state.progress.fetch_max(index + 1, Ordering::AcqRel);
        match chain.get(index).cloned() {
            Some(link) => {
                ctx.cancellation().check(&link.name)?;
                trace!(middleware = %link.name, step = index, "entering middleware");
                let next = Next {
                    chain,
                    index: index + 1,
                    terminal,
                    handler_name,
                    state: Arc::clone(&state),
                };
                let response = link
                    .middleware
                    .call(ctx, next)
                    .await
                    .map_err(|cause| SableError::callback(RegistryKind::Middleware, &link.name, cause))?;
                if state.progress.load(Ordering::Acquire) <= index + 1 {
                    debug!(
                        middleware = %link.name,
                        code = response.code(),
                        "middleware short-circuited the chain"
                    );
                }
                Ok(response)
            }
            None => {
                ctx.cancellation().check(&handler_name)?;
                trace!(handler = %handler_name, "entering handler");
                terminal
                    .call(ctx)
                    .await
                    .map_err(|cause| SableError::callback(RegistryKind::Handler, &*handler_name, cause))
            }
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &self.remaining())
            .field("handler", &self.handler_name)
            .finish()
    }
}
