//! 响应值类型。
//!
//! # 教案级说明
//! - **意图 (Why)**：处理器与中间件通过具名工厂构造响应，传输层再按 [`Body`] 变体决定如何写回；
//! - **契约 (What)**：
//!   - 状态码默认 200，头部可读写；
//!   - `file` 只记录路径引用，不做任何磁盘 I/O；
//!   - 响应从链上返回后按约定视为不可变。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::SableError;
use crate::request::HeaderMap;
use crate::value::Value;

/// 响应体。
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// 文本内容，内容类型记录在头部。
    Text(String),
    /// 结构化值，由传输层序列化为 JSON。
    Json(Value),
    /// 文件路径引用。
    File(PathBuf),
}

/// 响应。
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    code: u16,
    headers: HeaderMap,
    body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::empty()
    }
}

impl Response {
    fn with_body(body: Body) -> Self {
        Self {
            code: 200,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// 空响应。
    pub fn empty() -> Self {
        Self::with_body(Body::Empty)
    }

    /// 文本响应，附带 `content-type`。
    pub fn string(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        let mut response = Self::with_body(Body::Text(content.into()));
        response.headers.set("content-type", content_type);
        response
    }

    /// 结构化值响应。
    pub fn json(value: impl Into<Value>) -> Self {
        let mut response = Self::with_body(Body::Json(value.into()));
        response.headers.set("content-type", "application/json");
        response
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self::string(content, "text/html")
    }

    /// `{"data": value}` 信封。
    pub fn data(value: impl Into<Value>) -> Self {
        Self::json(envelope([("data", value.into())]))
    }

    /// `{"data": data, "meta": meta}` 信封。
    pub fn data_meta(data: impl Into<Value>, meta: impl Into<Value>) -> Self {
        Self::json(envelope([("data", data.into()), ("meta", meta.into())]))
    }

    /// 文件响应，仅记录路径。
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_body(Body::File(path.into()))
    }

    /// 302 重定向。
    pub fn redirect(location: impl Into<String>) -> Self {
        let mut response = Self::empty();
        response.code = 302;
        response.headers.set("location", location);
        response
    }

    /// `{"error": {"type": .., "message": ..}}` 错误信封，`type` 由状态码推导。
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::error_with_type(code, error_type(code), message)
    }

    /// 指定错误类型的错误信封。
    pub fn error_with_type(code: u16, kind: impl Into<String>, message: impl Into<String>) -> Self {
        let detail = envelope([
            ("type", Value::String(kind.into())),
            ("message", Value::String(message.into())),
        ]);
        let mut response = Self::json(envelope([("error", detail)]));
        response.code = code;
        response
    }

    /// 404 未找到。
    pub fn not_found() -> Self {
        Self::error(404, "not found")
    }

    /// 外层边界把核心错误转换为响应时使用。
    ///
    /// 状态码映射：`NotFound` → 404，`InvalidValue` → 400，`Cancelled` → 499，其余 → 500；
    /// 错误类型取稳定错误码。
    pub fn from_error(error: &SableError) -> Self {
        let code = match error {
            SableError::NotFound { .. } => 404,
            SableError::InvalidValue { .. } => 400,
            SableError::Cancelled { .. } => 499,
            _ => 500,
        };
        Self::error_with_type(code, error.code(), error.to_string())
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }

    /// 链式设置状态码。
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.body, Body::Empty)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, Body::Text(_))
    }

    pub fn is_json(&self) -> bool {
        matches!(self.body, Body::Json(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.body, Body::File(_))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(content) => Some(content),
            _ => None,
        }
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.body {
            Body::File(path) => Some(path),
            _ => None,
        }
    }
}

fn envelope<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Dictionary(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn error_type(code: u16) -> &'static str {
    match code {
        400 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        405 => "MethodNotAllowed",
        409 => "Conflict",
        499 => "Cancelled",
        500..=599 => "InternalServerError",
        _ => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryKind;

    #[test]
    fn string_response_defaults_to_success() {
        let response = Response::string("pong", "text/plain");
        assert_eq!(response.code(), 200);
        assert_eq!(response.text(), Some("pong"));
        assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));
        assert!(response.is_text());
    }

    #[test]
    fn envelopes_wrap_payloads() {
        let response = Response::data_meta(vec![1, 2], [("count", 2)].into_iter().collect::<Value>());
        let body = response
            .json_body()
            .expect("信封响应必须是结构化值")
            .to_json()
            .expect("信封必须可序列化");
        assert_eq!(body, serde_json::json!({"data": [1, 2], "meta": {"count": 2}}));
    }

    #[test]
    fn redirect_sets_location() {
        let response = Response::redirect("/login");
        assert_eq!(response.code(), 302);
        assert_eq!(response.headers().get("location"), Some("/login"));
        assert!(response.is_empty());
    }

    #[test]
    fn file_response_keeps_path_only() {
        let response = Response::file("/srv/a.txt");
        assert!(response.is_file());
        assert_eq!(response.file_path(), Some(Path::new("/srv/a.txt")));
    }

    #[test]
    fn errors_map_to_status_codes() {
        let missing = Response::from_error(&SableError::not_found(RegistryKind::Handler, "x"));
        assert_eq!(missing.code(), 404);
        let failed = Response::from_error(&SableError::callback_message(
            RegistryKind::Handler,
            "x",
            "boom",
        ));
        assert_eq!(failed.code(), 500);
        let kind = failed
            .json_body()
            .and_then(|body| body.get("error"))
            .and_then(|error| error.get("type"))
            .and_then(Value::as_str);
        assert_eq!(kind, Some("callback.failure"));
    }
}
