//! 分发引擎端到端测试
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：验证“匹配 → 装配中间件链 → 洋葱式执行”的完整契约：
//!   进出顺序、短路、失败传播、取消与未命中结果。
//! - **设计手法 (How)**：以 `Journal` 记录每个回调的进出事件，再断言事件序列；
//!   全部测试只依赖公开 API，与宿主的使用方式一致。
//! - **合同与边界 (What)**：不涉及传输层，请求直接以 [`Request`] 快照构造。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use sable_router::prelude::*;
use sable_router::{DispatchOptions, Handler, MiddlewareFactory};
use tracing_test::traced_test;

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().expect("日志锁不应中毒").push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().expect("日志锁不应中毒").clone()
    }
}

/// 构造一个记录进出事件的中间件工厂。
fn recording(journal: Journal, label: &'static str) -> impl MiddlewareFactory {
    factory_fn(move |_arguments| {
        let journal = journal.clone();
        Ok(middleware_fn(move |ctx, next| {
            let journal = journal.clone();
            async move {
                journal.push(format!("{label}:in"));
                let response = next.run(ctx).await?;
                journal.push(format!("{label}:out"));
                Ok::<_, ErrorCause>(response)
            }
        }))
    })
}

fn pong_handler(journal: Journal) -> impl Handler {
    sync_handler(move |_ctx| {
        journal.push("handler");
        Ok(Response::string("pong", "text/plain"))
    })
}

/// 测试目标：根命名空间的 `ping` 处理器在无中间件时返回 `pong` 与默认成功码。
#[tokio::test]
async fn ping_without_middleware_returns_pong() {
    let mut main = Namespace::main();
    main.define_handler("ping", |_ctx: RequestCtx| async {
        Ok::<_, ErrorCause>(Response::string("pong", "text/plain"))
    })
    .expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    let outcome = dispatcher
        .dispatch(Request::get("/ping"), Value::Null, Cancellation::new())
        .await
        .expect("分发不应失败");
    let response = outcome.response().expect("应命中处理器");
    assert_eq!(response.text(), Some("pong"));
    assert_eq!(response.code(), 200);
}

/// 测试目标：缺少 `Authorization` 头时鉴权中间件以 401 短路，处理器从未执行。
#[tokio::test]
async fn auth_middleware_short_circuits_with_401() {
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_middleware("auth", factory_fn(|_arguments| {
        Ok(middleware_fn(|ctx, next| async move {
            if !ctx.request().headers().contains_key("Authorization") {
                let mut response = Response::string("unauthorized", "text/plain");
                response.set_code(401);
                return Ok::<_, ErrorCause>(response);
            }
            Ok(next.run(ctx).await?)
        }))
    }))
    .expect("注册不应失败");
    main.define_handler("ping", pong_handler(journal.clone())).expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    let denied = dispatcher
        .serve(Request::get("/ping"), Value::Null, Cancellation::new())
        .await;
    assert_eq!(denied.code(), 401);
    assert_eq!(denied.text(), Some("unauthorized"));
    assert!(journal.events().is_empty(), "短路后处理器不应执行");

    let allowed = dispatcher
        .serve(
            Request::get("/ping").with_header("authorization", "Bearer t"),
            Value::Null,
            Cancellation::new(),
        )
        .await;
    assert_eq!(allowed.code(), 200);
    assert_eq!(journal.events(), vec!["handler"]);
}

/// 测试目标：根上的 M1 先于子命名空间的 M2 进入，M2 的后处理先于 M1。
#[tokio::test]
async fn middleware_runs_root_to_leaf_and_unwinds_in_reverse() {
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_middleware("m1", recording(journal.clone(), "m1")).expect("注册不应失败");
    let child = main.namespace_or_create("child");
    child.define_middleware("m2", recording(journal.clone(), "m2")).expect("注册不应失败");
    child.define_middleware("m3", recording(journal.clone(), "m3")).expect("注册不应失败");
    child.define_handler("ping", pong_handler(journal.clone())).expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    let response = dispatcher
        .serve(Request::get("/child/ping"), Value::Null, Cancellation::new())
        .await;
    assert_eq!(response.text(), Some("pong"));
    assert_eq!(
        journal.events(),
        vec!["m1:in", "m2:in", "m3:in", "handler", "m3:out", "m2:out", "m1:out"]
    );
}

/// 测试目标：关闭继承后，只有命中命名空间自身登记的中间件参与。
#[tokio::test]
async fn inheritance_can_be_disabled() {
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_middleware("m1", recording(journal.clone(), "m1")).expect("注册不应失败");
    let child = main.namespace_or_create("child");
    child.define_middleware("m2", recording(journal.clone(), "m2")).expect("注册不应失败");
    child.define_handler("ping", pong_handler(journal.clone())).expect("注册不应失败");
    let dispatcher = Dispatcher::with_options(
        main,
        DispatchOptions {
            inherit_middleware: false,
        },
    );

    dispatcher
        .dispatch(Request::get("/child/ping"), Value::Null, Cancellation::new())
        .await
        .expect("分发不应失败");
    assert_eq!(journal.events(), vec!["m2:in", "handler", "m2:out"]);
}

/// 测试目标：处理器失败时结果为 `CallbackFailure`，外层中间件的后处理代码不再执行。
#[tokio::test]
async fn handler_failure_aborts_the_unwind() {
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_middleware("m1", recording(journal.clone(), "m1")).expect("注册不应失败");
    main.define_handler("explode", |_ctx: RequestCtx| async {
        Err::<Response, ErrorCause>("database unavailable".into())
    })
    .expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    let err = dispatcher
        .dispatch(Request::get("/explode"), Value::Null, Cancellation::new())
        .await
        .expect_err("处理器失败必须传播");
    match &err {
        SableError::CallbackFailure { stage, name, .. } => {
            assert_eq!(*stage, RegistryKind::Handler);
            assert_eq!(name, "explode");
        }
        other => panic!("应为 CallbackFailure，实际为 {other:?}"),
    }
    assert_eq!(journal.events(), vec!["m1:in"], "失败后不应出现任何 out 事件");
    let response = Response::from_error(&err);
    assert_eq!(response.code(), 500);
}

/// 测试目标：中间件把下游失败吞掉并返回 `Ok` 时，分发结果仍是处理器的原始失败。
#[tokio::test]
async fn swallowed_failures_still_fail_the_dispatch() {
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_middleware("outer", recording(journal.clone(), "outer")).expect("注册不应失败");
    main.define_middleware("swallow", factory_fn(|_arguments| {
        Ok(middleware_fn(|ctx, next| async move {
            match next.run(ctx).await {
                Ok(response) => Ok::<_, ErrorCause>(response),
                Err(_) => Ok(Response::string("fine", "text/plain")),
            }
        }))
    }))
    .expect("注册不应失败");
    main.define_handler("explode", sync_handler(|_ctx| Err("boom".into())))
        .expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    let err = dispatcher
        .dispatch(Request::get("/explode"), Value::Null, Cancellation::new())
        .await
        .expect_err("被吞掉的失败必须仍然上报");
    match &err {
        SableError::CallbackFailure { stage, name, source } => {
            assert_eq!(*stage, RegistryKind::Handler);
            assert_eq!(name, "explode");
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("应为 CallbackFailure，实际为 {other:?}"),
    }
    let response = dispatcher
        .serve(Request::get("/explode"), Value::Null, Cancellation::new())
        .await;
    assert_eq!(response.code(), 500);
}

/// 测试目标：每次分发中处理器恰好执行一次，每个中间件各进出一次。
#[tokio::test]
async fn handler_runs_exactly_once_per_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_middleware("m1", recording(journal.clone(), "m1")).expect("注册不应失败");
    main.define_middleware("m2", recording(journal.clone(), "m2")).expect("注册不应失败");
    let counter = Arc::clone(&calls);
    main.define_handler("ping", sync_handler(move |_ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Response::empty())
    }))
    .expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    for round in 1..=3 {
        dispatcher
            .dispatch(Request::get("/ping"), Value::Null, Cancellation::new())
            .await
            .expect("分发不应失败");
        assert_eq!(calls.load(Ordering::SeqCst), round, "每次分发处理器只执行一次");
    }
    assert_eq!(journal.events().len(), 3 * 4);
}

/// 测试目标：工厂失败在装配期上报为中间件的 `CallbackFailure`，且失败的链不被缓存。
#[tokio::test]
async fn factory_failure_is_reported() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut main = Namespace::main();
    let counter = Arc::clone(&attempts);
    main.define_middleware("broken", move |_arguments: &Arguments| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err::<fn(RequestCtx, Next) -> BoxFuture<'static, CallbackResult<Response>>, _>(
            ErrorCause::from("missing secret"),
        )
    })
    .expect("注册不应失败");
    main.define_handler("ping", sync_handler(|_ctx| Ok(Response::empty())))
        .expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    for _ in 0..2 {
        let err = dispatcher
            .dispatch(Request::get("/ping"), Value::Null, Cancellation::new())
            .await
            .expect_err("工厂失败必须上报");
        assert!(err.is_callback_failure());
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2, "失败的装配不应被缓存");
    assert_eq!(dispatcher.cached_chains(), 0);
}

/// 测试目标：分发前已取消时处理器从不执行，结果为 `Cancelled`。
#[tokio::test]
async fn cancelled_before_dispatch_never_runs_handler() {
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_handler("ping", pong_handler(journal.clone())).expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    let cancellation = Cancellation::new();
    cancellation.cancel();
    let err = dispatcher
        .dispatch(Request::get("/ping"), Value::Null, cancellation)
        .await
        .expect_err("已取消的请求必须失败");
    assert!(err.is_cancelled());
    assert!(journal.events().is_empty());
}

/// 测试目标：中间件执行期间观测到取消后，下游中间件与处理器都不再执行。
#[tokio::test]
async fn cancellation_between_steps_stops_the_chain() {
    let journal = Journal::default();
    let mut main = Namespace::main();
    main.define_middleware("disconnect", factory_fn(|_arguments| {
        Ok(middleware_fn(|ctx, next| async move {
            ctx.cancellation().cancel();
            Ok::<_, ErrorCause>(next.run(ctx).await?)
        }))
    }))
    .expect("注册不应失败");
    main.define_middleware("inner", recording(journal.clone(), "inner")).expect("注册不应失败");
    main.define_handler("ping", pong_handler(journal.clone())).expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);

    let err = dispatcher
        .dispatch(Request::get("/ping"), Value::Null, Cancellation::new())
        .await
        .expect_err("取消必须中止分发");
    assert!(err.is_cancelled());
    assert!(journal.events().is_empty(), "取消后不应再进入任何步骤");
}

/// 测试目标：未命中是正常结果，并可映射为 404。
#[tokio::test]
async fn unmatched_request_is_not_found() {
    let dispatcher = Dispatcher::new(Namespace::main());
    let outcome = dispatcher
        .dispatch(Request::get("/missing"), Value::Null, Cancellation::new())
        .await
        .expect("未命中不是错误");
    assert!(outcome.is_not_found());
    assert_eq!(outcome.into_response().code(), 404);
}

/// 测试目标：中间件对请求体的修改对处理器可见，处理器可读取路由捕获与运行时句柄。
#[tokio::test]
async fn context_changes_flow_downstream() {
    let mut main = Namespace::main();
    main.define_middleware("stamp", factory_fn(|_arguments| {
        Ok(middleware_fn(|mut ctx, next| async move {
            ctx.set_body("stamped");
            Ok::<_, ErrorCause>(next.run(ctx).await?)
        }))
    }))
    .expect("注册不应失败");
    main.define_handler_with_route("show", Method::Get, "/users/:id", |ctx: RequestCtx| async move {
        let body = ctx.body().as_str().unwrap_or_default().to_owned();
        let id = ctx.handler_match().capture("id").unwrap_or_default().to_owned();
        let region = ctx.runtime::<&'static str>().copied().unwrap_or("none");
        Ok::<_, ErrorCause>(Response::data(format!("{body}:{id}:{region}")))
    })
    .expect("注册不应失败");
    let dispatcher = Dispatcher::new(main).with_runtime(Arc::new("eu-west"));

    let response = dispatcher
        .serve(Request::get("/users/42"), Value::Null, Cancellation::new())
        .await;
    let body = response
        .json_body()
        .expect("信封响应必须是结构化值")
        .to_json()
        .expect("信封必须可序列化");
    assert_eq!(body, serde_json::json!({ "data": "stamped:42:eu-west" }));
}

/// 测试目标：同一命名空间的并发首个请求只装配一次链，工厂只调用一次；并发请求互不干扰。
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chains_are_cached_and_shared_across_concurrent_requests() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut main = Namespace::main();
    let counter = Arc::clone(&created);
    main.define_middleware("count", factory_fn(move |_arguments| {
        counter.fetch_add(1, Ordering::SeqCst);
        // 拉长装配窗口，让并发的首个请求在缓存写入前相遇。
        std::thread::sleep(Duration::from_millis(20));
        Ok(middleware_fn(|ctx, next| async move { Ok::<_, ErrorCause>(next.run(ctx).await?) }))
    }))
    .expect("注册不应失败");
    main.define_handler("echo", |ctx: RequestCtx| async move {
        Ok::<_, ErrorCause>(Response::json(ctx.body().clone()))
    })
    .expect("注册不应失败");
    let dispatcher = Arc::new(Dispatcher::new(main));

    let mut tasks = Vec::new();
    for index in 0..16_i64 {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.push(tokio::spawn(async move {
            let response = dispatcher
                .serve(Request::post("/echo"), Value::Int(index), Cancellation::new())
                .await;
            (index, response)
        }));
    }
    for task in tasks {
        let (index, response) = task.await.expect("任务不应 panic");
        assert_eq!(response.json_body(), Some(&Value::Int(index)), "每个请求拥有独立上下文");
    }
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.cached_chains(), 1);
}

/// 测试目标：分发过程输出状态迁移日志。
#[tokio::test]
#[traced_test]
async fn dispatch_logs_state_transitions() {
    let mut main = Namespace::main();
    main.define_handler("ping", sync_handler(|_ctx| Ok(Response::empty())))
        .expect("注册不应失败");
    let dispatcher = Dispatcher::new(main);
    dispatcher
        .dispatch(Request::get("/ping"), Value::Null, Cancellation::new())
        .await
        .expect("分发不应失败");
    dispatcher
        .dispatch(Request::get("/pong"), Value::Null, Cancellation::new())
        .await
        .expect("未命中不是错误");
    assert!(logs_contain("request matched"));
    assert!(logs_contain("request completed"));
    assert!(logs_contain("no handler matched"));
}

/// 测试目标：被拒绝的重复注册不会留下“已定义”的日志。
#[test]
#[traced_test]
fn rejected_registration_is_not_logged_as_defined() {
    let mut main = Namespace::main();
    main.define_handler("ping", sync_handler(|_ctx| Ok(Response::empty())))
        .expect("首次注册不应失败");
    assert!(main.define_handler("ping", sync_handler(|_ctx| Ok(Response::empty()))).is_err());
    main.define_handler_group("admin", |group| {
        group.define_handler("stats", sync_handler(|_ctx| Ok(Response::empty())))?;
        assert!(group.define_handler("stats", sync_handler(|_ctx| Ok(Response::empty()))).is_err());
        Ok(())
    })
    .expect("分组注册不应失败");

    logs_assert(|lines: &[&str]| {
        let count = |needle: &str| lines.iter().filter(|line| line.contains(needle)).count();
        match (count("handler defined in group"), count("handler defined")) {
            (1, 2) => Ok(()),
            (group, total) => Err(format!("期望各记录一次，实际分组 {group} 次、合计 {total} 次")),
        }
    });
}
