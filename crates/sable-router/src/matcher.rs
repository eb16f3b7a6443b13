//! 请求路径到处理器的结构化匹配。
//!
//! # 教案级说明
//! - **意图 (Why)**：把请求路径解析为“命名空间路径 + 处理器名 + 捕获参数”，作为分发的第一步；
//! - **契约 (What)**：
//!   - 路径按 `/` 切分并丢弃空段；
//!   - 从根沿子命名空间尽量向下走，得到候选命名空间序列，按从深到浅依次尝试；
//!   - 在候选命名空间内，以剩余段 `rest` 依次尝试：自定义路由处理器、普通处理器 `[name]`、
//!     处理器分组 `[group, name]`、模型处理器分组 `[model, action]`；同类内按注册顺序，先命中者胜出；
//!   - 方法过滤对每一类都生效；
//!   - 对同一棵未变更的树，同一方法与路径总是得到同一结果。

use std::collections::BTreeMap;

use sable_core::{HandlerMatch, Method, Request};

use crate::handler::{HandlerEntry, HandlerGroup};
use crate::namespace::Namespace;

/// 匹配结果及其命中的命名空间与处理器条目。
pub(crate) struct Resolution<'a> {
    pub(crate) namespace: &'a Namespace,
    pub(crate) entry: &'a HandlerEntry,
    pub(crate) handler_match: HandlerMatch,
}

pub(crate) fn resolve<'a>(root: &'a Namespace, request: &Request) -> Option<Resolution<'a>> {
    let segments: Vec<&str> = request.segments().collect();

    let mut candidates = vec![root];
    let mut current = root;
    for segment in &segments {
        match current.child_at(segment) {
            Some(child) => {
                candidates.push(child);
                current = child;
            }
            None => break,
        }
    }

    candidates
        .into_iter()
        .enumerate()
        .rev()
        .find_map(|(depth, namespace)| match_in(namespace, &segments[depth..], request.method()))
}

fn match_in<'a>(namespace: &'a Namespace, rest: &[&str], method: Method) -> Option<Resolution<'a>> {
    for (name, entry) in namespace.handlers().iter() {
        let Some(pattern) = entry.route().pattern() else {
            continue;
        };
        if !entry.route().accepts(method) {
            continue;
        }
        if let Some(captures) = pattern.matches(rest) {
            return Some(resolution(namespace, entry, namespace.path().to_vec(), name, captures));
        }
    }

    match rest {
        [name] => {
            let entry = namespace.handler(name)?;
            if entry.route().pattern().is_none() && entry.route().accepts(method) {
                return Some(resolution(
                    namespace,
                    entry,
                    namespace.path().to_vec(),
                    name,
                    BTreeMap::new(),
                ));
            }
            None
        }
        [group, name] => namespace
            .handler_groups()
            .get(group)
            .and_then(|group| match_group(namespace, group, name, method))
            .or_else(|| {
                namespace
                    .model_handler_groups()
                    .get(group)
                    .and_then(|group| match_group(namespace, group, name, method))
            }),
        _ => None,
    }
}

fn match_group<'a>(
    namespace: &'a Namespace,
    group: &'a HandlerGroup,
    name: &str,
    method: Method,
) -> Option<Resolution<'a>> {
    let entry = group.handler(name)?;
    if !entry.route().accepts(method) {
        return None;
    }
    let mut path = namespace.path().to_vec();
    path.push(group.name().to_owned());
    Some(resolution(namespace, entry, path, name, BTreeMap::new()))
}

fn resolution<'a>(
    namespace: &'a Namespace,
    entry: &'a HandlerEntry,
    path: Vec<String>,
    name: &str,
    captures: BTreeMap<String, String>,
) -> Resolution<'a> {
    Resolution {
        namespace,
        entry,
        handler_match: HandlerMatch::new(path, name, captures),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::{CallbackResult, RequestCtx, Response};

    async fn ok(_ctx: RequestCtx) -> CallbackResult<Response> {
        Ok(Response::empty())
    }

    fn tree() -> Namespace {
        let mut main = Namespace::main();
        main.define_handler("ping", ok).expect("注册不应失败");
        let shop = main.namespace_or_create("shop");
        shop.define_handler("ping", ok).expect("注册不应失败");
        shop.define_handler_with_route("order", Method::Get, "/orders/:id", ok)
            .expect("注册不应失败");
        shop.define_handler_group("admin", |group| group.define_handler_with_method("stats", Method::Get, ok))
            .expect("注册不应失败");
        shop.define_model_handler_group("Product", |group| group.define_handler("restock", ok))
            .expect("注册不应失败");
        main
    }

    fn matched(root: &Namespace, request: Request) -> Option<HandlerMatch> {
        resolve(root, &request).map(|resolution| resolution.handler_match)
    }

    #[test]
    fn deepest_namespace_wins() {
        let root = tree();
        let hit = matched(&root, Request::get("/shop/ping")).expect("应命中子命名空间");
        assert_eq!(hit.path(), ["shop".to_owned()]);
        let hit = matched(&root, Request::get("/ping")).expect("应命中根命名空间");
        assert!(hit.path().is_empty());
    }

    #[test]
    fn custom_routes_capture_parameters() {
        let root = tree();
        let hit = matched(&root, Request::get("/shop/orders/42")).expect("应命中自定义路由");
        assert_eq!(hit.handler_name(), "order");
        assert_eq!(hit.capture("id"), Some("42"));
        assert!(matched(&root, Request::post("/shop/orders/42")).is_none(), "方法不符不应命中");
    }

    #[test]
    fn groups_and_model_groups_expose_two_segment_routes() {
        let root = tree();
        let hit = matched(&root, Request::get("/shop/admin/stats")).expect("应命中分组");
        assert_eq!(hit.path(), ["shop".to_owned(), "admin".to_owned()]);
        let hit = matched(&root, Request::post("/shop/Product/restock")).expect("应命中模型分组");
        assert_eq!(hit.path(), ["shop".to_owned(), "Product".to_owned()]);
        assert_eq!(hit.handler_name(), "restock");
        assert!(matched(&root, Request::get("/shop/Product/delete")).is_none());
    }

    #[test]
    fn matching_is_idempotent() {
        let root = tree();
        let first = matched(&root, Request::get("/shop/orders/7"));
        let second = matched(&root, Request::get("/shop/orders/7"));
        assert_eq!(first, second);
    }
}
