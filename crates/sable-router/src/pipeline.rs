//! 管线项与管线。
//!
//! # 教案级说明
//! - **意图 (Why)**：字段值的转换与校验由具名步骤串联而成，模式中以名字引用；
//!   注册表不在结构上区分“转换”和“校验”，两者都接收 [`PipelineCtx`] 并返回替换值；
//! - **契约 (What)**：
//!   - 步骤严格按配置顺序执行，上一步的输出是下一步的输入；
//!   - 第 *i* 步失败时，*i+1..n* 不再执行，失败以 `CallbackFailure` 上报并携带该步骤名；
//!   - 同步回调通过 [`transform`] 与 [`validator`] 适配，异步回调直接以闭包注册。

use std::fmt;
use std::future::{self, Future};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use sable_core::{Arguments, CallbackResult, RequestCtx, Value};

/// 管线项的调用输入。
#[derive(Clone, Debug, Default)]
pub struct PipelineCtx {
    value: Value,
    arguments: Arguments,
    object: Option<Value>,
    request: Option<RequestCtx>,
}

impl PipelineCtx {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_object(mut self, object: Option<Value>) -> Self {
        self.object = object;
        self
    }

    pub fn with_request(mut self, request: Option<RequestCtx>) -> Self {
        self.request = request;
        self
    }

    /// 当前值。
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// 引用处配置的具名参数。
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// 字段所属对象。
    pub fn object(&self) -> Option<&Value> {
        self.object.as_ref()
    }

    /// 触发本次处理的请求上下文。
    pub fn request(&self) -> Option<&RequestCtx> {
        self.request.as_ref()
    }
}

/// 可异步执行的管线项。
pub trait PipelineItem: Send + Sync + 'static {
    fn call(&self, ctx: PipelineCtx) -> BoxFuture<'static, CallbackResult<Value>>;
}

impl<F, Fut> PipelineItem for F
where
    F: Fn(PipelineCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult<Value>> + Send + 'static,
{
    fn call(&self, ctx: PipelineCtx) -> BoxFuture<'static, CallbackResult<Value>> {
        (self)(ctx).boxed()
    }
}

/// 同步转换适配器，见 [`transform`]。
pub struct Transform<F>(F);

impl<F> PipelineItem for Transform<F>
where
    F: Fn(Value, &Arguments) -> CallbackResult<Value> + Send + Sync + 'static,
{
    fn call(&self, ctx: PipelineCtx) -> BoxFuture<'static, CallbackResult<Value>> {
        let PipelineCtx {
            value, arguments, ..
        } = ctx;
        future::ready((self.0)(value, &arguments)).boxed()
    }
}

/// 把同步函数适配为管线项。
pub fn transform<F>(callback: F) -> Transform<F>
where
    F: Fn(Value, &Arguments) -> CallbackResult<Value> + Send + Sync + 'static,
{
    Transform(callback)
}

/// 校验适配器，见 [`validator`]。
pub struct Validator<F> {
    predicate: F,
    message: String,
}

impl<F> PipelineItem for Validator<F>
where
    F: Fn(&Value, &Arguments) -> bool + Send + Sync + 'static,
{
    fn call(&self, ctx: PipelineCtx) -> BoxFuture<'static, CallbackResult<Value>> {
        let PipelineCtx {
            value, arguments, ..
        } = ctx;
        let outcome = if (self.predicate)(&value, &arguments) {
            Ok(value)
        } else {
            Err(self.message.clone().into())
        };
        future::ready(outcome).boxed()
    }
}

/// 校验通过时原样返回输入，否则以 `message` 失败。
pub fn validator<F>(predicate: F, message: impl Into<String>) -> Validator<F>
where
    F: Fn(&Value, &Arguments) -> bool + Send + Sync + 'static,
{
    Validator {
        predicate,
        message: message.into(),
    }
}

/// 共享的管线项句柄。
pub type SharedPipelineItem = Arc<dyn PipelineItem>;

/// 管线中的一步：管线项引用与参数。
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineItemRef {
    reference: Vec<String>,
    arguments: Arguments,
}

impl PipelineItemRef {
    /// `reference` 以 `.` 分隔命名空间与名字，如 `std.trim`。
    pub fn new(reference: &str, arguments: Arguments) -> Self {
        Self {
            reference: reference.split('.').map(str::to_owned).collect(),
            arguments,
        }
    }

    pub fn reference(&self) -> &[String] {
        &self.reference
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// 适合日志的点分名称。
    pub fn display_name(&self) -> String {
        self.reference.join(".")
    }
}

/// 有序的管线项引用列表。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pipeline {
    items: Vec<PipelineItemRef>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加无参数的步骤。
    pub fn item(self, reference: &str) -> Self {
        self.item_with(reference, Arguments::new())
    }

    /// 追加带参数的步骤。
    pub fn item_with(mut self, reference: &str, arguments: Arguments) -> Self {
        self.items.push(PipelineItemRef::new(reference, arguments));
        self
    }

    pub fn items(&self) -> &[PipelineItemRef] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.items.iter().map(PipelineItemRef::display_name).collect();
        f.write_str(&names.join(" -> "))
    }
}
