//! 请求分发引擎。
//!
//! # 教案级说明
//! - **意图 (Why)**：把“匹配 → 装配中间件链 → 洋葱式执行 → 响应”串成一个可并发调用的入口；
//! - **状态机 (What)**：`Unmatched → Matched → Dispatching → Completed | Failed`
//!   - 未命中：返回 [`DispatchOutcome::NotFound`]，这是正常结果而非错误；
//!   - 命中：按根到叶收集各命名空间登记的中间件（可配置为只取命中命名空间自身），
//!     以匹配结果构造 [`RequestCtx`] 并从链头开始执行；
//!   - 完成：返回 [`DispatchOutcome::Completed`]；
//!   - 失败：中间件或处理器失败、工厂失败、取消，均以 `Err` 返回，其余链节点不再执行。
//! - **并发 (How)**：树以 `Arc<Namespace>` 只读共享；唯一的共享可变状态是以命中命名空间路径为键的
//!   链缓存（`DashMap`），链一经装配即被复用。
//! - **权衡 (Trade-offs)**：链缓存假设树在服务期不变；替换树需要新建分发器。

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sable_core::{
    Cancellation, RegistryKind, Request, RequestCtx, Response, Result, RuntimeHandle, SableError,
    Value,
};
use tracing::{debug, warn};

use crate::matcher;
use crate::middleware::{Chain, ChainLink, Next};
use crate::namespace::Namespace;

/// 分发选项。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchOptions {
    /// 祖先命名空间登记的中间件是否作用于后代命名空间命中的请求。
    pub inherit_middleware: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            inherit_middleware: true,
        }
    }
}

/// 分发结果。
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// 链执行完毕（包括被中间件短路）。
    Completed(Response),
    /// 没有处理器匹配请求。
    NotFound,
}

impl DispatchOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchOutcome::NotFound)
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            DispatchOutcome::Completed(response) => Some(response),
            DispatchOutcome::NotFound => None,
        }
    }

    /// 未命中时映射为 404 错误响应。
    pub fn into_response(self) -> Response {
        match self {
            DispatchOutcome::Completed(response) => response,
            DispatchOutcome::NotFound => Response::not_found(),
        }
    }
}

/// 分发器。
///
/// # 契约（What）
/// - 构造时接管整棵树的所有权，之后树只读；
/// - `dispatch` 可在多个任务中并发调用，每个请求拥有独立的 [`RequestCtx`]。
pub struct Dispatcher {
    root: Arc<Namespace>,
    options: DispatchOptions,
    runtime: Option<RuntimeHandle>,
    chains: DashMap<Vec<String>, Chain>,
}

impl Dispatcher {
    pub fn new(root: impl Into<Arc<Namespace>>) -> Self {
        Self::with_options(root, DispatchOptions::default())
    }

    pub fn with_options(root: impl Into<Arc<Namespace>>, options: DispatchOptions) -> Self {
        Self {
            root: root.into(),
            options,
            runtime: None,
            chains: DashMap::new(),
        }
    }

    /// 注入运行时句柄，所有请求上下文都会携带它。
    pub fn with_runtime(mut self, runtime: RuntimeHandle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn root(&self) -> &Arc<Namespace> {
        &self.root
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// 只做匹配，不执行任何回调。
    pub fn resolve(&self, request: &Request) -> Option<sable_core::HandlerMatch> {
        matcher::resolve(&self.root, request).map(|resolution| resolution.handler_match)
    }

    /// 分发一个请求。
    ///
    /// # 执行逻辑（How）
    /// 1. 检查取消令牌，已取消则不做匹配直接返回 `Cancelled`；
    /// 2. 匹配失败返回 `NotFound` 结果；
    /// 3. 取得（或装配并缓存）命中命名空间的中间件链；
    /// 4. 构造请求上下文并从链头执行；每一步之前再次检查取消令牌。
    pub async fn dispatch(
        &self,
        request: impl Into<Arc<Request>>,
        body: Value,
        cancellation: Cancellation,
    ) -> Result<DispatchOutcome> {
        let request: Arc<Request> = request.into();
        cancellation.check("match")?;

        let Some(resolution) = matcher::resolve(&self.root, &request) else {
            debug!(method = %request.method(), path = %request.path(), state = "unmatched", "no handler matched");
            return Ok(DispatchOutcome::NotFound);
        };
        let handler_match = resolution.handler_match;
        let terminal = Arc::clone(resolution.entry.handler());
        debug!(
            method = %request.method(),
            path = %request.path(),
            handler = %handler_match.handler_name(),
            namespace = %resolution.namespace.display_path(),
            state = "matched",
            "request matched"
        );

        let chain = self.chain_for(resolution.namespace)?;
        let handler_name = handler_match.handler_name().to_owned();
        let mut ctx = RequestCtx::new(Arc::clone(&request), body, handler_match)
            .with_cancellation(cancellation);
        if let Some(runtime) = &self.runtime {
            ctx = ctx.with_runtime(Arc::clone(runtime));
        }

        debug!(handler = %handler_name, middleware = chain.len(), state = "dispatching", "dispatching request");
        let next = Next::new(chain, terminal, &handler_name);
        let state = next.state();
        let result = next.run(ctx).await;
        // 链上的首个失败优先于中间件返回的结果。
        let result = match state.take_failure() {
            Some(failure) => Err(failure),
            None => result,
        };
        match result {
            Ok(response) => {
                debug!(handler = %handler_name, code = response.code(), state = "completed", "request completed");
                Ok(DispatchOutcome::Completed(response))
            }
            Err(error) => {
                warn!(handler = %handler_name, code = error.code(), error = %error, state = "failed", "request failed");
                Err(error)
            }
        }
    }

    /// 分发并把结果折叠为响应：未命中映射为 404，错误经 [`Response::from_error`] 转换。
    pub async fn serve(&self, request: impl Into<Arc<Request>>, body: Value, cancellation: Cancellation) -> Response {
        match self.dispatch(request, body, cancellation).await {
            Ok(outcome) => outcome.into_response(),
            Err(error) => Response::from_error(&error),
        }
    }

    /// 已缓存的链数量。
    pub fn cached_chains(&self) -> usize {
        self.chains.len()
    }

    /// 取得命名空间的链，首次访问时在缓存条目的写锁内装配。
    ///
    /// 同一命名空间的并发首个请求因此只调用一次工厂；工厂运行期间同一分片的其他键会短暂等待，
    /// 工厂内不得回调本分发器。装配失败不写入缓存。
    fn chain_for(&self, namespace: &Namespace) -> Result<Chain> {
        let key = namespace.path().to_vec();
        if let Some(chain) = self.chains.get(&key) {
            return Ok(Arc::clone(chain.value()));
        }
        match self.chains.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let chain = self.assemble(namespace)?;
                Ok(Arc::clone(entry.insert(chain).value()))
            }
        }
    }

    fn assemble(&self, namespace: &Namespace) -> Result<Chain> {
        let lineage = if self.options.inherit_middleware {
            self.root
                .lineage(namespace.path())
                .ok_or_else(|| SableError::not_found(RegistryKind::Namespace, namespace.display_path()))?
        } else {
            vec![namespace]
        };

        let mut links = Vec::new();
        for owner in lineage {
            for enrolled in owner.middleware_uses() {
                let reference: Vec<&str> = enrolled.reference().iter().map(String::as_str).collect();
                let name = qualified(owner, &enrolled.display_name());
                let factory = owner
                    .middleware_factory(&reference)
                    .ok_or_else(|| SableError::not_found(RegistryKind::Middleware, name.clone()))?;
                let middleware = factory
                    .create(enrolled.arguments())
                    .map_err(|cause| SableError::callback(RegistryKind::Middleware, name.clone(), cause))?;
                links.push(ChainLink::new(name, middleware));
            }
        }
        debug!(
            namespace = %namespace.display_path(),
            chain = ?links.iter().map(ChainLink::name).collect::<Vec<_>>(),
            "middleware chain assembled"
        );
        Ok(Arc::from(links))
    }
}

fn qualified(owner: &Namespace, name: &str) -> String {
    if owner.path().is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", owner.display_path(), name)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("root", &self.root.display_path())
            .field("options", &self.options)
            .field("cached_chains", &self.chains.len())
            .finish()
    }
}
