//! 装饰器注册表。
//!
//! # 教案级说明
//! - **意图 (Why)**：六类模式实体各有一张装饰器表，回调签名按实体类型强类型化，
//!   把“参数个数/目标类型不匹配”挡在编译期而不是调用期；
//! - **契约 (What)**：回调接收引用处的具名参数与一次性句柄 [`DecoratorTarget`]，
//!   只能读写实体的数据袋，不返回值；失败通过 `Err` 上报并由命名空间包装为 `CallbackFailure`；
//! - **设计 (How)**：[`Decoratable`] 把实体类型映射到 [`DecoratorRegistry`] 中对应的字段，
//!   命名空间因此只需要一组泛型方法。

use std::fmt;
use std::sync::Arc;

use sable_core::{
    Arguments, CallbackResult, DecoratorTarget, Entity, Enum, EnumMember, Field, Model, Property,
    Relation, RegistryKind,
};

use crate::registry::Registry;

type DecoratorFn<E> =
    dyn for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, E>) -> CallbackResult<()> + Send + Sync;

/// 单个装饰器回调。
pub struct Decorator<E: Entity> {
    callback: Arc<DecoratorFn<E>>,
}

impl<E: Entity> Decorator<E> {
    pub fn new<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&Arguments, &mut DecoratorTarget<'a, E>) -> CallbackResult<()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// 以新鲜句柄调用回调。
    pub fn apply(&self, arguments: &Arguments, entity: &mut E) -> CallbackResult<()> {
        let mut target = DecoratorTarget::new(entity);
        (self.callback)(arguments, &mut target)
    }
}

impl<E: Entity> Clone for Decorator<E> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<E: Entity> fmt::Debug for Decorator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decorator").field("kind", &E::KIND).finish()
    }
}

/// 一个命名空间拥有的全部装饰器表。
#[derive(Debug)]
pub struct DecoratorRegistry {
    models: Registry<Decorator<Model>>,
    fields: Registry<Decorator<Field>>,
    relations: Registry<Decorator<Relation>>,
    properties: Registry<Decorator<Property>>,
    enums: Registry<Decorator<Enum>>,
    enum_members: Registry<Decorator<EnumMember>>,
}

impl Default for DecoratorRegistry {
    fn default() -> Self {
        Self {
            models: Registry::new(RegistryKind::ModelDecorator),
            fields: Registry::new(RegistryKind::FieldDecorator),
            relations: Registry::new(RegistryKind::RelationDecorator),
            properties: Registry::new(RegistryKind::PropertyDecorator),
            enums: Registry::new(RegistryKind::EnumDecorator),
            enum_members: Registry::new(RegistryKind::EnumMemberDecorator),
        }
    }
}

impl DecoratorRegistry {
    /// 读取某类实体的装饰器表。
    pub fn of<E: Decoratable>(&self) -> &Registry<Decorator<E>> {
        E::select(self)
    }

    pub fn of_mut<E: Decoratable>(&mut self) -> &mut Registry<Decorator<E>> {
        E::select_mut(self)
    }
}

/// 拥有装饰器表的实体类型。
pub trait Decoratable: Entity + Sized {
    fn select(registry: &DecoratorRegistry) -> &Registry<Decorator<Self>>;

    fn select_mut(registry: &mut DecoratorRegistry) -> &mut Registry<Decorator<Self>>;
}

macro_rules! impl_decoratable {
    ($($entity:ty => $field:ident),* $(,)?) => {
        $(
            impl Decoratable for $entity {
                fn select(registry: &DecoratorRegistry) -> &Registry<Decorator<Self>> {
                    &registry.$field
                }

                fn select_mut(registry: &mut DecoratorRegistry) -> &mut Registry<Decorator<Self>> {
                    &mut registry.$field
                }
            }
        )*
    };
}

impl_decoratable! {
    Model => models,
    Field => fields,
    Relation => relations,
    Property => properties,
    Enum => enums,
    EnumMember => enum_members,
}
