//! 内建 `std` 命名空间。
//!
//! 提供常用的字符串管线项与请求日志中间件，由宿主显式安装；安装后可通过 `std.trim`、
//! `["std", "logRequest"]` 等引用使用。

use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use sable_core::{Arguments, CallbackResult, RequestCtx, Response, Result, Value};
use tracing::info;

use crate::middleware::{Middleware, Next};
use crate::namespace::Namespace;
use crate::pipeline::{transform, validator};

/// 内建命名空间的名字。
pub const STD_NAMESPACE: &str = "std";

/// 在 `root` 下创建（或复用）`std` 命名空间并定义内建扩展点。
///
/// 中间件 `logRequest` 只定义工厂，不自动登记；需要的命名空间以
/// `use_middleware(&["std", "logRequest"], ..)` 显式启用。
pub fn install_std(root: &mut Namespace) -> Result<()> {
    let builtin = root.std_namespace_or_create(STD_NAMESPACE);
    builtin.define_pipeline_item("trim", transform(|value, _| map_string(value, |text| text.trim().to_owned())))?;
    builtin.define_pipeline_item(
        "toLowerCase",
        transform(|value, _| map_string(value, str::to_lowercase)),
    )?;
    builtin.define_pipeline_item(
        "toUpperCase",
        transform(|value, _| map_string(value, str::to_uppercase)),
    )?;
    builtin.define_pipeline_item("isNotEmpty", validator(|value, _| is_not_empty(value), "value is empty"))?;
    builtin.define_middleware_factory("logRequest", log_request)?;
    Ok(())
}

/// 字符串转换；空值原样透传，其他类型报错。
fn map_string(value: Value, map: impl Fn(&str) -> String) -> CallbackResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(text) => Ok(Value::String(map(&text))),
        other => Err(format!("expected a string, found {}", other.type_name()).into()),
    }
}

fn is_not_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Array(values) => !values.is_empty(),
        Value::Dictionary(entries) => !entries.is_empty(),
        _ => true,
    }
}

/// 请求日志中间件，`label` 参数作为日志字段，默认 `request`。
struct LogRequest {
    label: String,
}

fn log_request(arguments: &Arguments) -> CallbackResult<LogRequest> {
    let label = arguments.get_str("label").unwrap_or("request").to_owned();
    Ok(LogRequest { label })
}

impl Middleware for LogRequest {
    fn call(&self, ctx: RequestCtx, next: Next) -> BoxFuture<'static, CallbackResult<Response>> {
        let label = self.label.clone();
        async move {
            let started = Instant::now();
            let method = ctx.request().method();
            let path = ctx.request().path().to_owned();
            let response = next.run(ctx).await?;
            info!(
                label = %label,
                method = %method,
                path = %path,
                code = response.code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request served"
            );
            Ok(response)
        }
        .boxed()
    }
}
