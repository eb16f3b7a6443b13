//! 自定义路由模式。
//!
//! 处理器默认以名字作为唯一路径段；通过 `define_handler_with_route` 注册的处理器改用
//! [`RoutePattern`]，支持字面量、`:param` 参数与 `*rest` 通配段。

use std::collections::BTreeMap;
use std::fmt;

use sable_core::{Method, SableError};

/// 路由段的组成单元。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteSegment {
    /// 字面量段，要求目标完全一致。
    Literal(String),
    /// 参数占位符，匹配任意单段并以参数名捕获。
    Parameter(String),
    /// 通配符，匹配剩余所有段（可为空），以 `/` 连接后捕获。
    Wildcard(String),
}

/// 路由模式。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<RouteSegment>,
}

impl RoutePattern {
    /// 解析形如 `/users/:id/*rest` 的模式文本。
    ///
    /// # 契约（What）
    /// - 空段被忽略，`/` 与空串都表示空模式；
    /// - 参数名与通配名不能为空，通配段只能位于末尾。
    pub fn parse(pattern: &str) -> Result<Self, SableError> {
        let invalid = |reason: &'static str| SableError::InvalidValue {
            kind: "route pattern",
            literal: pattern.to_owned(),
            reason: reason.into(),
        };
        let raw: Vec<&str> = pattern.split('/').filter(|segment| !segment.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (position, segment) in raw.iter().enumerate() {
            let parsed = if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter name is empty"));
                }
                RouteSegment::Parameter(name.to_owned())
            } else if let Some(name) = segment.strip_prefix('*') {
                if position + 1 != raw.len() {
                    return Err(invalid("wildcard must be the last segment"));
                }
                let name = if name.is_empty() { "*" } else { name };
                RouteSegment::Wildcard(name.to_owned())
            } else {
                RouteSegment::Literal((*segment).to_owned())
            };
            segments.push(parsed);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    /// 将模式与目标段逐段比较，命中时返回捕获表。
    ///
    /// # 说明（Why/How）
    /// - 字面量要求完全一致，参数捕获单段，通配捕获剩余段并立即返回；
    /// - 目标段多于模式段且无通配时匹配失败。
    pub fn matches(&self, target: &[&str]) -> Option<BTreeMap<String, String>> {
        let mut captures = BTreeMap::new();
        let mut target_iter = target.iter();

        for segment in &self.segments {
            match segment {
                RouteSegment::Literal(expected) => {
                    let actual = target_iter.next()?;
                    if actual != expected {
                        return None;
                    }
                }
                RouteSegment::Parameter(name) => {
                    let actual = target_iter.next()?;
                    captures.insert(name.clone(), (*actual).to_owned());
                }
                RouteSegment::Wildcard(name) => {
                    let rest: Vec<&str> = target_iter.copied().collect();
                    captures.insert(name.clone(), rest.join("/"));
                    return Some(captures);
                }
            }
        }

        if target_iter.next().is_some() {
            return None;
        }
        Some(captures)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                RouteSegment::Literal(value) => write!(f, "/{value}")?,
                RouteSegment::Parameter(name) => write!(f, "/:{name}")?,
                RouteSegment::Wildcard(name) if name == "*" => f.write_str("/*")?,
                RouteSegment::Wildcard(name) => write!(f, "/*{name}")?,
            }
        }
        Ok(())
    }
}

/// 处理器的方法过滤与可选自定义路由。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandlerRoute {
    method: Option<Method>,
    pattern: Option<RoutePattern>,
}

impl HandlerRoute {
    /// 任意方法、以名字为路径。
    pub fn any() -> Self {
        Self::default()
    }

    pub fn method(method: Method) -> Self {
        Self {
            method: Some(method),
            pattern: None,
        }
    }

    pub fn custom(method: Method, pattern: RoutePattern) -> Self {
        Self {
            method: Some(method),
            pattern: Some(pattern),
        }
    }

    pub fn allowed_method(&self) -> Option<Method> {
        self.method
    }

    pub fn pattern(&self) -> Option<&RoutePattern> {
        self.pattern.as_ref()
    }

    /// `None` 方法表示不限制。
    pub fn accepts(&self, method: Method) -> bool {
        self.method.is_none_or(|allowed| allowed == method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_and_wildcards_are_captured() {
        let pattern = RoutePattern::parse("/files/:bucket/*key").expect("合法模式");
        let captures = pattern
            .matches(&["files", "avatars", "2025", "a.png"])
            .expect("应命中");
        assert_eq!(captures.get("bucket").map(String::as_str), Some("avatars"));
        assert_eq!(captures.get("key").map(String::as_str), Some("2025/a.png"));
        assert_eq!(pattern.to_string(), "/files/:bucket/*key");
    }

    #[test]
    fn extra_segments_do_not_match_without_wildcard() {
        let pattern = RoutePattern::parse("users/:id").expect("合法模式");
        assert!(pattern.matches(&["users", "7", "posts"]).is_none());
        assert!(pattern.matches(&["users"]).is_none());
        assert!(pattern.matches(&["accounts", "7"]).is_none());
    }

    #[test]
    fn wildcard_must_be_last() {
        assert!(RoutePattern::parse("/*rest/tail").is_err());
        assert!(RoutePattern::parse("/users/:").is_err());
    }
}
