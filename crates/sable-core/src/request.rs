//! 请求快照、匹配结果与请求上下文。
//!
//! # 教案级说明
//! - **意图 (Why)**：传输层把入站请求固化为不可变快照交给核心，核心在匹配后把快照、请求体、
//!   运行时句柄与匹配结果打包为 [`RequestCtx`]，沿中间件链向下传递；
//! - **契约 (What)**：
//!   - [`Request`] 构造后不可变，通过 `Arc` 在上下文克隆之间共享；
//!   - [`RequestCtx`] 按值在链上移动，请求体的修改必须显式调用 `set_body`/`body_mut`，
//!     下游中间件与处理器看到的就是修改后的值；
//!   - 头部名称大小写不敏感，统一以小写存储。

use std::any::Any;
use std::collections::{BTreeMap, btree_map};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::cancellation::Cancellation;
use crate::error::SableError;
use crate::value::Value;

/// 请求方法。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = SableError;

    fn from_str(literal: &str) -> Result<Self, Self::Err> {
        let method = match literal.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            _ => {
                return Err(SableError::InvalidValue {
                    kind: "method",
                    literal: literal.to_owned(),
                    reason: "unsupported request method".into(),
                });
            }
        };
        Ok(method)
    }
}

/// 大小写不敏感的头部表。
///
/// 请求上的实例只以只读方式暴露；响应上的实例可写。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap(BTreeMap<String, String>);

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以小写形式返回全部头部名称。
    pub fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_ascii_lowercase())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// 写入或覆盖头部，返回旧值。
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(&key.to_ascii_lowercase())
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (key, value) in iter {
            headers.set(key, value);
        }
        headers
    }
}

/// 入站请求的不可变快照。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    query_string: String,
    content_type: String,
    headers: HeaderMap,
}

impl Request {
    /// 以方法与路径构造；路径中的 `?` 之后部分被拆为查询串。
    pub fn new(method: Method, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Self {
            method,
            path: path.to_owned(),
            query_string: query_string.to_owned(),
            content_type: String::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(target: impl AsRef<str>) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: impl AsRef<str>) -> Self {
        Self::new(Method::Post, target)
    }

    /// 追加请求头；`content-type` 同步到 `content_type`。
    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        let value = value.into();
        if key.as_ref().eq_ignore_ascii_case("content-type") {
            self.content_type.clone_from(&value);
        }
        self.headers.set(key, value);
        self
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.with_header("content-type", content_type)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// 以 `/` 切分路径，丢弃空段。
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|segment| !segment.is_empty())
    }
}

/// 路径匹配结果。
///
/// # 契约（What）
/// - `path` 为命中命名空间的路径，命中分组时追加分组名或模型名；
/// - `handler_name` 为处理器在其注册表内的名字；
/// - `captures` 保存路由参数名到原始片段的映射。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandlerMatch {
    path: Vec<String>,
    handler_name: String,
    captures: BTreeMap<String, String>,
}

impl HandlerMatch {
    pub fn new(
        path: Vec<String>,
        handler_name: impl Into<String>,
        captures: BTreeMap<String, String>,
    ) -> Self {
        Self {
            path,
            handler_name: handler_name.into(),
            captures,
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn captures(&self) -> &BTreeMap<String, String> {
        &self.captures
    }

    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }
}

/// 宿主注入的运行时句柄，框架只负责搬运。
pub type RuntimeHandle = Arc<dyn Any + Send + Sync>;

/// 单个请求的处理上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：中间件与处理器需要同时访问请求快照、请求体、匹配结果与取消信号；
/// - **契约 (What)**：
///   - 上下文按值在链上移动，中间件对请求体的修改对下游可见；
///   - 克隆得到的是独立副本，`request` 与运行时句柄通过 `Arc` 共享；
///   - 取消令牌与调用方持有的令牌共享同一原子位。
#[derive(Clone)]
pub struct RequestCtx {
    request: Arc<Request>,
    body: Value,
    runtime: Option<RuntimeHandle>,
    handler_match: HandlerMatch,
    cancellation: Cancellation,
}

impl RequestCtx {
    pub fn new(request: impl Into<Arc<Request>>, body: Value, handler_match: HandlerMatch) -> Self {
        Self {
            request: request.into(),
            body,
            runtime: None,
            handler_match,
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_runtime(mut self, runtime: RuntimeHandle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn shared_request(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    /// 替换请求体并返回旧值。
    pub fn set_body(&mut self, body: impl Into<Value>) -> Value {
        std::mem::replace(&mut self.body, body.into())
    }

    /// 取出运行时句柄并向下转型。
    pub fn runtime<T: Any>(&self) -> Option<&T> {
        self.runtime.as_deref().and_then(|runtime| runtime.downcast_ref::<T>())
    }

    pub fn runtime_handle(&self) -> Option<&RuntimeHandle> {
        self.runtime.as_ref()
    }

    pub fn handler_match(&self) -> &HandlerMatch {
        &self.handler_match
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }
}

impl fmt::Debug for RequestCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCtx")
            .field("request", &self.request)
            .field("body", &self.body)
            .field("runtime", &self.runtime.is_some())
            .field("handler_match", &self.handler_match)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let request = Request::get("/users?page=2")
            .with_header("Authorization", "Bearer t")
            .with_content_type("application/json");
        assert_eq!(request.path(), "/users");
        assert_eq!(request.query_string(), "page=2");
        assert_eq!(request.headers().get("authorization"), Some("Bearer t"));
        assert!(request.headers().contains_key("CONTENT-TYPE"));
        assert_eq!(request.content_type(), "application/json");
        assert_eq!(request.headers().keys(), vec!["authorization", "content-type"]);
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("patch".parse::<Method>().expect("合法方法"), Method::Patch);
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn body_mutation_is_explicit() {
        let mut ctx = RequestCtx::new(Request::post("/echo"), Value::from("a"), HandlerMatch::default());
        let previous = ctx.set_body("b");
        assert_eq!(previous, Value::from("a"));
        assert_eq!(ctx.body(), &Value::from("b"));
        let ctx = ctx.with_runtime(Arc::new(7_u8));
        assert_eq!(ctx.runtime::<u8>(), Some(&7));
    }
}
