//! 模式实体与装饰器句柄。
//!
//! # 教案级说明
//! - **意图 (Why)**：模式系统拥有模型、字段、关系、属性、枚举与枚举成员的权威定义，
//!   核心只需要它们的名字与内嵌 [`DataBag`]，以便装饰器写入元数据；
//! - **契约 (What)**：
//!   - 每个实体实现 [`Entity`]，通过关联常量 [`Entity::KIND`] 声明自己属于哪一类装饰器注册表；
//!   - 装饰器回调只拿到 [`DecoratorTarget`]，它借用实体且生命周期不超过一次调用，
//!     只暴露 `name`、`set_data` 与 `data`；
//! - **权衡 (Trade-offs)**：实体结构刻意保持最小，外部模式系统可以把它们嵌入自己的结构中再借出可变引用。

use std::fmt;

use crate::data::DataBag;
use crate::error::RegistryKind;
use crate::value::Value;

/// 实体类别，一一对应一种装饰器注册表。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Model,
    Field,
    Relation,
    Property,
    Enum,
    EnumMember,
}

impl EntityKind {
    /// 对应的装饰器注册表类别，用于错误上下文。
    pub fn decorator_kind(self) -> RegistryKind {
        match self {
            EntityKind::Model => RegistryKind::ModelDecorator,
            EntityKind::Field => RegistryKind::FieldDecorator,
            EntityKind::Relation => RegistryKind::RelationDecorator,
            EntityKind::Property => RegistryKind::PropertyDecorator,
            EntityKind::Enum => RegistryKind::EnumDecorator,
            EntityKind::EnumMember => RegistryKind::EnumMemberDecorator,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Model => "model",
            EntityKind::Field => "field",
            EntityKind::Relation => "relation",
            EntityKind::Property => "property",
            EntityKind::Enum => "enum",
            EntityKind::EnumMember => "enum member",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可被装饰的模式实体。
pub trait Entity: Send + Sync + 'static {
    /// 实体类别。
    const KIND: EntityKind;

    fn name(&self) -> &str;

    fn data_bag(&self) -> &DataBag;

    fn data_bag_mut(&mut self) -> &mut DataBag;
}

macro_rules! declare_member_entity {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct $name {
            name: String,
            data: DataBag,
        }

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    data: DataBag::new(),
                }
            }

            pub fn data(&self, key: &str) -> Option<&Value> {
                self.data.data(key)
            }
        }

        impl Entity for $name {
            const KIND: EntityKind = EntityKind::$kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn data_bag(&self) -> &DataBag {
                &self.data
            }

            fn data_bag_mut(&mut self) -> &mut DataBag {
                &mut self.data
            }
        }
    };
}

macro_rules! declare_top_level_entity {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct $name {
            name: String,
            namespace_path: Vec<String>,
            data: DataBag,
        }

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self::in_namespace(Vec::<String>::new(), name)
            }

            /// 以所属命名空间路径构造，路径用于日志与路由形状。
            pub fn in_namespace<P, S>(namespace_path: P, name: impl Into<String>) -> Self
            where
                P: IntoIterator<Item = S>,
                S: Into<String>,
            {
                Self {
                    name: name.into(),
                    namespace_path: namespace_path.into_iter().map(Into::into).collect(),
                    data: DataBag::new(),
                }
            }

            pub fn namespace_path(&self) -> &[String] {
                &self.namespace_path
            }

            pub fn data(&self, key: &str) -> Option<&Value> {
                self.data.data(key)
            }
        }

        impl Entity for $name {
            const KIND: EntityKind = EntityKind::$kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn data_bag(&self) -> &DataBag {
                &self.data
            }

            fn data_bag_mut(&mut self) -> &mut DataBag {
                &mut self.data
            }
        }
    };
}

declare_top_level_entity!(
    /// 模型。
    Model => Model
);
declare_top_level_entity!(
    /// 枚举。
    Enum => Enum
);
declare_member_entity!(
    /// 模型字段。
    Field => Field
);
declare_member_entity!(
    /// 模型关系。
    Relation => Relation
);
declare_member_entity!(
    /// 模型计算属性。
    Property => Property
);
declare_member_entity!(
    /// 枚举成员。
    EnumMember => EnumMember
);

/// 装饰器回调拿到的临时句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：实体的所有权属于模式系统，回调只应在一次调用内读写元数据；
///   借用生命周期 `'a` 保证句柄无法被回调保存到调用之外；
/// - **契约 (What)**：只暴露数据袋契约与名称，结构性访问器由模式系统自行提供。
pub struct DecoratorTarget<'a, E: Entity> {
    entity: &'a mut E,
}

impl<'a, E: Entity> DecoratorTarget<'a, E> {
    pub fn new(entity: &'a mut E) -> Self {
        Self { entity }
    }

    pub fn kind(&self) -> EntityKind {
        E::KIND
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    /// 写入或覆盖元数据。
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entity.data_bag_mut().set_data(key, value);
    }

    /// 读取元数据；缺失时返回 `None`。
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.entity.data_bag().data(key)
    }
}

impl<E: Entity> fmt::Debug for DecoratorTarget<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorTarget")
            .field("kind", &E::KIND)
            .field("name", &self.entity.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_writes_through_to_entity() {
        let mut field = Field::new("email");
        {
            let mut target = DecoratorTarget::new(&mut field);
            assert_eq!(target.kind(), EntityKind::Field);
            assert_eq!(target.data("unique"), None);
            target.set_data("unique", true);
            assert_eq!(target.data("unique"), Some(&Value::Bool(true)));
        }
        assert_eq!(field.data("unique"), Some(&Value::Bool(true)), "写入必须落在实体本身");
    }

    #[test]
    fn top_level_entities_remember_namespace() {
        let model = Model::in_namespace(["shop"], "Order");
        assert_eq!(model.namespace_path(), ["shop".to_owned()]);
        assert_eq!(Model::KIND.decorator_kind(), RegistryKind::ModelDecorator);
    }
}
