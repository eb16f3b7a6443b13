#![deny(unsafe_code)]
#![doc = "sable-core: 命名空间扩展点与请求分发所共享的值模型、实体句柄与请求/响应契约。"]
#![doc = ""]
#![doc = "本 crate 不包含任何注册表或分发逻辑，只定义上层（`sable-router`、`sable-hosting`）与宿主回调之间传递的数据类型："]
#![doc = "动态值 [`Value`]、元数据袋 [`DataBag`]、模式实体与装饰器句柄、请求快照 [`Request`]、请求上下文 [`RequestCtx`]、"]
#![doc = "响应 [`Response`]、取消令牌 [`Cancellation`] 以及统一错误域 [`SableError`]。"]

pub mod cancellation;
pub mod data;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;
pub mod value;

pub use cancellation::Cancellation;
pub use data::DataBag;
pub use entity::{
    DecoratorTarget, Entity, EntityKind, Enum, EnumMember, Field, Model, Property, Relation,
};
pub use error::{CallbackResult, ErrorCause, RegistryKind, Result, SableError, codes};
pub use request::{HandlerMatch, HeaderMap, Method, Request, RequestCtx, RuntimeHandle};
pub use response::{Body, Response};
pub use types::{DateOnly, File, ObjectId, Range};
pub use value::{Arguments, Value};
