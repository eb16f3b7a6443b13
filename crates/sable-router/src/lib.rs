#![deny(unsafe_code)]
#![doc = "sable-router: 命名空间扩展点注册表与洋葱式请求分发引擎。"]
#![doc = ""]
#![doc = "注册阶段通过 `&mut Namespace` 顺序定义装饰器、管线项、处理器与中间件；"]
#![doc = "服务阶段把整棵树交给 [`Dispatcher`]，以只读方式并发分发请求。"]

pub mod builtin;
pub mod decorator;
pub mod dispatch;
pub mod handler;
mod matcher;
pub mod middleware;
pub mod namespace;
pub mod pipeline;
pub mod registry;
pub mod route;

pub use builtin::{STD_NAMESPACE, install_std};
pub use decorator::{Decoratable, Decorator, DecoratorRegistry};
pub use dispatch::{DispatchOptions, DispatchOutcome, Dispatcher};
pub use handler::{GroupKind, Handler, HandlerEntry, HandlerGroup, SyncHandler, sync_handler};
pub use middleware::{
    Chain, ChainLink, Middleware, MiddlewareFactory, MiddlewareUse, Next, factory_fn, middleware_fn,
};
pub use namespace::Namespace;
pub use pipeline::{
    Pipeline, PipelineCtx, PipelineItem, PipelineItemRef, SharedPipelineItem, Transform, Validator,
    transform, validator,
};
pub use registry::{RegistrationPolicy, Registry};
pub use route::{HandlerRoute, RoutePattern, RouteSegment};

/// 宿主代码的一站式导入：核心类型加上注册与分发入口。
pub mod prelude {
    pub use sable_core::prelude::*;

    pub use crate::{
        DispatchOutcome, Dispatcher, HandlerGroup, Namespace, Next, Pipeline, PipelineCtx,
        RegistrationPolicy, factory_fn, middleware_fn, sync_handler, transform, validator,
    };
}
