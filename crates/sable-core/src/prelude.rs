//! 常用类型的一站式导入。
//!
//! 宿主代码通常只需 `use sable_core::prelude::*;` 即可编写装饰器、管线项、处理器与中间件。

pub use crate::{
    Arguments, Body, CallbackResult, Cancellation, DataBag, DecoratorTarget, Entity, EntityKind, Enum, EnumMember,
    ErrorCause, Field, HandlerMatch, HeaderMap, Method, Model, Property, Relation, RegistryKind,
    Request, RequestCtx, Response, Result, SableError, Value,
};
pub use crate::types::{DateOnly, File, ObjectId, Range};
