//! 命名空间树。
//!
//! # 教案级说明
//! - **意图 (Why)**：命名空间是全部扩展点的组合根：每个节点拥有装饰器、管线项、处理器、
//!   处理器分组、中间件工厂各一张注册表，以及按名字索引的子命名空间；
//! - **契约 (What)**：
//!   - 节点身份由根相对路径唯一确定，同一路径的两次查找返回同一实例（`std::ptr::eq`）；
//!   - 整棵树中只有 [`Namespace::main`] 构造的根节点报告 `is_main() == true`；
//!   - 节点在正常运行中从不删除；
//!   - 注册方法需要 `&mut self`，注册阶段因此在类型上就是单写者；进入服务阶段后树被移入
//!     `Arc<Namespace>`，只读共享，无需任何锁。
//! - **设计 (How)**：子节点由父节点以 `BTreeMap` 直接拥有，“获取或创建”借助 `entry` API 一步完成。
//! - **权衡 (Trade-offs)**：不支持服务期增量注册；如需热更新，应整体重建树再替换分发器。

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::Arc;

use sable_core::{
    Arguments, CallbackResult, DecoratorTarget, Enum, EnumMember, Field, Method, Model,
    Property, RegistryKind, Relation, RequestCtx, Result, SableError, Value,
};
use tracing::{debug, trace};

use crate::decorator::{Decoratable, Decorator, DecoratorRegistry};
use crate::handler::{GroupKind, Handler, HandlerEntry, HandlerGroup};
use crate::middleware::{MiddlewareFactory, MiddlewareUse};
use crate::pipeline::{Pipeline, PipelineCtx, PipelineItem, SharedPipelineItem};
use crate::registry::{RegistrationPolicy, Registry};
use crate::route::{HandlerRoute, RoutePattern};

/// 命名空间节点。
pub struct Namespace {
    path: Vec<String>,
    is_main: bool,
    is_std: bool,
    policy: RegistrationPolicy,
    children: BTreeMap<String, Namespace>,
    decorators: DecoratorRegistry,
    pipeline_items: Registry<SharedPipelineItem>,
    handlers: Registry<HandlerEntry>,
    handler_groups: Registry<HandlerGroup>,
    model_handler_groups: Registry<HandlerGroup>,
    middleware: Registry<Arc<dyn MiddlewareFactory>>,
    middleware_uses: Vec<MiddlewareUse>,
}

impl Namespace {
    fn with_path(path: Vec<String>, is_main: bool, is_std: bool, policy: RegistrationPolicy) -> Self {
        Self {
            path,
            is_main,
            is_std,
            policy,
            children: BTreeMap::new(),
            decorators: DecoratorRegistry::default(),
            pipeline_items: Registry::new(RegistryKind::PipelineItem),
            handlers: Registry::new(RegistryKind::Handler),
            handler_groups: Registry::new(RegistryKind::HandlerGroup),
            model_handler_groups: Registry::new(RegistryKind::ModelHandlerGroup),
            middleware: Registry::new(RegistryKind::Middleware),
            middleware_uses: Vec::new(),
        }
    }

    /// 构造主命名空间（树根），重复注册策略为默认的 `Reject`。
    pub fn main() -> Self {
        Self::main_with_policy(RegistrationPolicy::default())
    }

    /// 以指定重复注册策略构造主命名空间；子节点在创建时继承该策略。
    pub fn main_with_policy(policy: RegistrationPolicy) -> Self {
        Self::with_path(Vec::new(), true, false, policy)
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    pub fn is_std(&self) -> bool {
        self.is_std
    }

    /// 根相对路径。
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// 点分路径，根节点为空串。
    pub fn display_path(&self) -> String {
        self.path.join(".")
    }

    pub fn registration_policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// 修改本节点的重复注册策略；已存在的子节点不受影响。
    pub fn set_registration_policy(&mut self, policy: RegistrationPolicy) {
        self.policy = policy;
    }

    // ---------------------------------------------------------------------
    // 树操作
    // ---------------------------------------------------------------------

    /// 查找直接子节点，不存在时返回 `None`，从不创建。
    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.children.get(name)
    }

    pub fn namespace_mut(&mut self, name: &str) -> Option<&mut Namespace> {
        self.children.get_mut(name)
    }

    /// 获取或创建直接子节点，幂等。
    pub fn namespace_or_create(&mut self, name: &str) -> &mut Namespace {
        self.child_or_create(name, false)
    }

    /// 获取或创建标记为内建的子节点；已存在的节点原样返回。
    pub fn std_namespace_or_create(&mut self, name: &str) -> &mut Namespace {
        self.child_or_create(name, true)
    }

    fn child_or_create(&mut self, name: &str, is_std: bool) -> &mut Namespace {
        let policy = self.policy;
        let parent_path = &self.path;
        match self.children.entry(name.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut path = parent_path.clone();
                path.push(name.to_owned());
                debug!(namespace = %path.join("."), is_std, "namespace created");
                entry.insert(Namespace::with_path(path, false, is_std, policy))
            }
        }
    }

    /// 逐段查找；空路径返回自身，任一中间段缺失返回 `None`。
    pub fn namespace_at_path(&self, path: &[&str]) -> Option<&Namespace> {
        path.iter()
            .try_fold(self, |current, segment| current.children.get(*segment))
    }

    pub fn namespace_mut_at_path(&mut self, path: &[&str]) -> Option<&mut Namespace> {
        let mut current = self;
        for segment in path {
            current = current.children.get_mut(*segment)?;
        }
        Some(current)
    }

    /// 逐段获取或创建；空路径返回自身。
    pub fn namespace_or_create_at_path(&mut self, path: &[&str]) -> &mut Namespace {
        let mut current = self;
        for segment in path {
            current = current.namespace_or_create(segment);
        }
        current
    }

    /// 按名字顺序遍历直接子节点。
    pub fn children(&self) -> impl Iterator<Item = &Namespace> {
        self.children.values()
    }

    pub(crate) fn child_at(&self, name: &str) -> Option<&Namespace> {
        self.children.get(name)
    }

    /// 沿 `path` 收集从自身到目标节点的全部节点，任一段缺失返回 `None`。
    pub(crate) fn lineage(&self, path: &[String]) -> Option<Vec<&Namespace>> {
        let mut lineage = Vec::with_capacity(path.len() + 1);
        let mut current = self;
        lineage.push(current);
        for segment in path {
            current = current.children.get(segment)?;
            lineage.push(current);
        }
        Some(lineage)
    }

    fn resolve<'a, 'r>(&'a self, reference: &'r [&'r str]) -> Option<(&'a Namespace, &'r str)> {
        let (name, namespace_path) = reference.split_last()?;
        let namespace = self.namespace_at_path(namespace_path)?;
        Some((namespace, *name))
    }

    // ---------------------------------------------------------------------
    // 装饰器
    // ---------------------------------------------------------------------

    /// 以泛型方式定义装饰器，实体类型决定写入哪一张表。
    pub fn define_decorator<E, F>(&mut self, name: impl Into<String>, callback: F) -> Result<()>
    where
        E: Decoratable,
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, E>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let scope = self.display_path();
        let registry = self.decorators.of_mut::<E>();
        let kind = registry.kind();
        registry.insert(name.clone(), Decorator::new(callback), self.policy, &scope)?;
        debug!(namespace = %scope, name = %name, kind = %kind, "decorator defined");
        Ok(())
    }

    pub fn define_model_decorator<F>(&mut self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, Model>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.define_decorator::<Model, F>(name, callback)
    }

    pub fn define_model_field_decorator<F>(&mut self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, Field>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.define_decorator::<Field, F>(name, callback)
    }

    pub fn define_model_relation_decorator<F>(
        &mut self,
        name: impl Into<String>,
        callback: F,
    ) -> Result<()>
    where
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, Relation>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.define_decorator::<Relation, F>(name, callback)
    }

    pub fn define_model_property_decorator<F>(
        &mut self,
        name: impl Into<String>,
        callback: F,
    ) -> Result<()>
    where
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, Property>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.define_decorator::<Property, F>(name, callback)
    }

    pub fn define_enum_decorator<F>(&mut self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, Enum>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.define_decorator::<Enum, F>(name, callback)
    }

    pub fn define_enum_member_decorator<F>(&mut self, name: impl Into<String>, callback: F) -> Result<()>
    where
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, EnumMember>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.define_decorator::<EnumMember, F>(name, callback)
    }

    /// 相对本节点解析装饰器引用。
    pub fn decorator<E: Decoratable>(&self, reference: &[&str]) -> Option<&Decorator<E>> {
        let (namespace, name) = self.resolve(reference)?;
        namespace.decorators.of::<E>().get(name)
    }

    /// 对实体应用装饰器。
    ///
    /// # 契约（What）
    /// - 引用形如 `["std", "map"]`，最后一段为名字，前缀为相对本节点的命名空间路径；
    /// - 未找到返回 `NotFound`；回调失败返回 `CallbackFailure`，实体上已写入的元数据保留。
    pub fn apply_decorator<E: Decoratable>(
        &self,
        reference: &[&str],
        arguments: &Arguments,
        entity: &mut E,
    ) -> Result<()> {
        let kind = E::KIND.decorator_kind();
        let display_ref = reference.join(".");
        let decorator = self
            .decorator::<E>(reference)
            .ok_or_else(|| SableError::not_found(kind, display_ref.clone()))?;
        trace!(decorator = %display_ref, target = %entity.name(), "applying decorator");
        decorator
            .apply(arguments, entity)
            .map_err(|cause| SableError::callback(kind, display_ref, cause))
    }

    // ---------------------------------------------------------------------
    // 管线项
    // ---------------------------------------------------------------------

    pub fn define_pipeline_item<P: PipelineItem>(&mut self, name: impl Into<String>, item: P) -> Result<()> {
        let name = name.into();
        let scope = self.display_path();
        self.pipeline_items
            .insert(name.clone(), Arc::new(item) as SharedPipelineItem, self.policy, &scope)?;
        debug!(namespace = %scope, name = %name, "pipeline item defined");
        Ok(())
    }

    /// 相对本节点解析管线项引用。
    pub fn pipeline_item(&self, reference: &[&str]) -> Option<&SharedPipelineItem> {
        let (namespace, name) = self.resolve(reference)?;
        namespace.pipeline_items.get(name)
    }

    /// 依次执行管线。
    ///
    /// # 执行逻辑（How）
    /// 1. 先解析全部引用，任一缺失即返回 `NotFound`，此时没有任何步骤执行；
    /// 2. 逐步调用，每一步的输出作为下一步的 `value`，`object` 与 `request` 原样传给每一步；
    /// 3. 第一处失败立即返回 `CallbackFailure`，其后的步骤不再执行。
    pub async fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        value: Value,
        object: Option<Value>,
        request: Option<RequestCtx>,
    ) -> Result<Value> {
        let mut steps = Vec::with_capacity(pipeline.len());
        for item_ref in pipeline.items() {
            let reference: Vec<&str> = item_ref.reference().iter().map(String::as_str).collect();
            let item = self.pipeline_item(&reference).ok_or_else(|| {
                SableError::not_found(RegistryKind::PipelineItem, item_ref.display_name())
            })?;
            steps.push((item_ref, Arc::clone(item)));
        }

        let mut current = value;
        for (item_ref, item) in steps {
            let name = item_ref.display_name();
            trace!(item = %name, "running pipeline item");
            let ctx = PipelineCtx::new(current)
                .with_arguments(item_ref.arguments().clone())
                .with_object(object.clone())
                .with_request(request.clone());
            current = item.call(ctx).await.map_err(|cause| {
                debug!(item = %name, "pipeline aborted");
                SableError::callback(RegistryKind::PipelineItem, name.clone(), cause)
            })?;
        }
        Ok(current)
    }

    // ---------------------------------------------------------------------
    // 处理器
    // ---------------------------------------------------------------------

    /// 定义接受任意方法、以名字为路径段的处理器。
    pub fn define_handler<H: Handler>(&mut self, name: impl Into<String>, handler: H) -> Result<()> {
        self.insert_handler(name.into(), HandlerEntry::new(handler, HandlerRoute::any()))
    }

    /// 定义带方法与自定义路由模式的处理器，模式相对本命名空间。
    pub fn define_handler_with_route<H: Handler>(
        &mut self,
        name: impl Into<String>,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<()> {
        let pattern = RoutePattern::parse(pattern)?;
        self.insert_handler(name.into(), HandlerEntry::new(handler, HandlerRoute::custom(method, pattern)))
    }

    fn insert_handler(&mut self, name: String, entry: HandlerEntry) -> Result<()> {
        let scope = self.display_path();
        let route = format!("{:?}", entry.route());
        self.handlers.insert(name.clone(), entry, self.policy, &scope)?;
        debug!(namespace = %scope, name = %name, route = %route, "handler defined");
        Ok(())
    }

    /// 定义处理器分组：`build` 在注册期立即收到新分组并在其中定义处理器。
    pub fn define_handler_group<F>(&mut self, name: impl Into<String>, build: F) -> Result<()>
    where
        F: FnOnce(&mut HandlerGroup) -> Result<()>,
    {
        self.insert_group(name.into(), GroupKind::Plain, build)
    }

    /// 定义模型处理器分组：分组名即模型名，路由形状为 `/<model>/<action>`。
    pub fn define_model_handler_group<F>(&mut self, model: impl Into<String>, build: F) -> Result<()>
    where
        F: FnOnce(&mut HandlerGroup) -> Result<()>,
    {
        self.insert_group(model.into(), GroupKind::Model, build)
    }

    fn insert_group<F>(&mut self, name: String, kind: GroupKind, build: F) -> Result<()>
    where
        F: FnOnce(&mut HandlerGroup) -> Result<()>,
    {
        let scope = self.display_path();
        let mut group = HandlerGroup::new(name.clone(), kind, scope.clone(), self.policy);
        build(&mut group)?;
        let registry = match kind {
            GroupKind::Plain => &mut self.handler_groups,
            GroupKind::Model => &mut self.model_handler_groups,
        };
        registry.insert(name.clone(), group, self.policy, &scope)?;
        debug!(namespace = %scope, name = %name, kind = ?kind, "handler group defined");
        Ok(())
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerEntry> {
        self.handlers.get(name)
    }

    pub fn handler_group(&self, name: &str) -> Option<&HandlerGroup> {
        self.handler_groups.get(name)
    }

    pub fn model_handler_group(&self, model: &str) -> Option<&HandlerGroup> {
        self.model_handler_groups.get(model)
    }

    pub(crate) fn handlers(&self) -> &Registry<HandlerEntry> {
        &self.handlers
    }

    pub(crate) fn handler_groups(&self) -> &Registry<HandlerGroup> {
        &self.handler_groups
    }

    pub(crate) fn model_handler_groups(&self) -> &Registry<HandlerGroup> {
        &self.model_handler_groups
    }

    // ---------------------------------------------------------------------
    // 中间件
    // ---------------------------------------------------------------------

    /// 定义中间件工厂，并以空参数把它登记到本节点的中间件链。
    pub fn define_middleware<F: MiddlewareFactory>(&mut self, name: impl Into<String>, factory: F) -> Result<()> {
        self.define_middleware_with_arguments(name, Arguments::new(), factory)
    }

    /// 定义中间件工厂，并以给定参数登记。
    ///
    /// `Overwrite` 策略下重复定义只替换工厂，不会再次登记。
    pub fn define_middleware_with_arguments<F: MiddlewareFactory>(
        &mut self,
        name: impl Into<String>,
        arguments: Arguments,
        factory: F,
    ) -> Result<()> {
        let name = name.into();
        let scope = self.display_path();
        let replaced = self.middleware.insert(
            name.clone(),
            Arc::new(factory) as Arc<dyn MiddlewareFactory>,
            self.policy,
            &scope,
        )?;
        if replaced.is_none() {
            self.middleware_uses.push(MiddlewareUse::new(vec![name.clone()], arguments));
        }
        debug!(namespace = %scope, name = %name, "middleware defined");
        Ok(())
    }

    /// 只定义工厂，不登记到链上，供其他命名空间通过 [`Self::use_middleware`] 引用。
    pub fn define_middleware_factory<F: MiddlewareFactory>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<()> {
        let name = name.into();
        let scope = self.display_path();
        self.middleware.insert(
            name.clone(),
            Arc::new(factory) as Arc<dyn MiddlewareFactory>,
            self.policy,
            &scope,
        )?;
        debug!(namespace = %scope, name = %name, "middleware factory defined");
        Ok(())
    }

    /// 以参数登记一个工厂引用，引用相对本节点解析。
    pub fn use_middleware(&mut self, reference: &[&str], arguments: Arguments) {
        let reference: Vec<String> = reference.iter().map(|segment| (*segment).to_owned()).collect();
        debug!(namespace = %self.display_path(), middleware = %reference.join("."), "middleware enrolled");
        self.middleware_uses.push(MiddlewareUse::new(reference, arguments));
    }

    /// 相对本节点解析中间件工厂引用。
    pub fn middleware_factory(&self, reference: &[&str]) -> Option<&Arc<dyn MiddlewareFactory>> {
        let (namespace, name) = self.resolve(reference)?;
        namespace.middleware.get(name)
    }

    /// 本节点按登记顺序的中间件使用列表。
    pub fn middleware_uses(&self) -> &[MiddlewareUse] {
        &self.middleware_uses
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("path", &self.path)
            .field("is_main", &self.is_main)
            .field("is_std", &self.is_std)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers)
            .field("middleware_uses", &self.middleware_uses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut main = Namespace::main();
        let first: *const Namespace = main.namespace_or_create_at_path(&["shop", "admin"]);
        let second: *const Namespace = main.namespace_or_create_at_path(&["shop", "admin"]);
        assert!(std::ptr::eq(first, second), "同一路径必须返回同一实例");
        let found = main.namespace_at_path(&["shop", "admin"]).expect("路径已创建");
        assert!(std::ptr::eq(found, first));
        assert_eq!(found.path(), ["shop".to_owned(), "admin".to_owned()]);
        assert!(!found.is_main());
        assert!(main.is_main());
    }

    #[test]
    fn lookups_never_create() {
        let mut main = Namespace::main();
        assert!(main.namespace("ghost").is_none());
        assert!(main.namespace_at_path(&["a", "b"]).is_none());
        main.namespace_or_create("a");
        assert!(main.namespace_at_path(&["a", "b"]).is_none(), "缺失的中间段不应被创建");
        assert!(std::ptr::eq(main.namespace_at_path(&[]).expect("空路径返回自身"), &main));
    }

    #[test]
    fn std_flag_is_set_on_creation() {
        let mut main = Namespace::main();
        assert!(main.std_namespace_or_create("std").is_std());
        assert!(!main.namespace_or_create("app").is_std());
    }

    #[test]
    fn decorator_failure_is_propagated() {
        let mut main = Namespace::main();
        main.define_model_field_decorator("strict", |_, target| {
            target.set_data("strict", true);
            Err("strict mode unsupported".into())
        })
        .expect("注册不应失败");
        let mut field = Field::new("name");
        let err = main
            .apply_decorator(&["strict"], &Arguments::new(), &mut field)
            .expect_err("回调失败必须上报");
        assert!(err.is_callback_failure());
        assert_eq!(field.data("strict"), Some(&Value::Bool(true)));
    }

    #[test]
    fn missing_decorator_is_not_found() {
        let main = Namespace::main();
        let err = main
            .apply_decorator(&["std", "id"], &Arguments::new(), &mut Model::new("User"))
            .expect_err("未注册的装饰器必须报错");
        assert_eq!(err.code(), sable_core::codes::NOT_FOUND);
    }
}
