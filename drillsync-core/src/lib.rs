pub mod slots;
pub mod text;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl Default for Point2 {
        fn default() -> Self {
            Self::new(0.0, 0.0)
        }
    }

    /// 二维向量，用作块参照缩放比例。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl Default for Vector2 {
        fn default() -> Self {
            Self::new(1.0, 1.0)
        }
    }
}

/// 进程内的图纸模型。宿主 CAD 的对象图在测试与 CLI 中都以它为载体。
pub mod document {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
        #[serde(default)]
        pub is_locked: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
                is_locked: false,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Text(Text),
        MText(MText),
        BlockReference(BlockReference),
        Table(Table),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Text(text) => &text.layer,
                Entity::MText(mtext) => &mtext.layer,
                Entity::BlockReference(reference) => &reference.layer,
                Entity::Table(table) => &table.layer,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub layer: String,
    }

    /// 多行文字，`content` 可能夹带 `{\f...;}` 一类格式码。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub reference_width: Option<f64>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Attribute {
        pub tag: String,
        pub text: String,
        pub insert: Point2,
        pub height: f64,
        #[serde(default)]
        pub is_invisible: bool,
        pub layer: String,
    }

    impl Attribute {
        /// 以默认几何参数构造属性，常用于测试夹具。
        pub fn new(tag: impl Into<String>, text: impl Into<String>, layer: impl Into<String>) -> Self {
            Self {
                tag: tag.into(),
                text: text.into(),
                insert: Point2::default(),
                height: 2.5,
                is_invisible: false,
                layer: layer.into(),
            }
        }
    }

    /// 块参照。属性值按实例保存，块定义内的其余图元由所有实例共享。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub scale: Vector2,
        pub rotation: f64,
        pub attributes: Vec<Attribute>,
        pub layer: String,
    }

    impl BlockReference {
        pub fn attribute(&self, tag: &str) -> Option<&Attribute> {
            self.attributes
                .iter()
                .find(|attribute| attribute.tag.eq_ignore_ascii_case(tag))
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point2,
        pub entities: Vec<Entity>,
        pub attributes: Vec<AttributeDefinition>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AttributeDefinition {
        pub tag: String,
        pub prompt: Option<String>,
        pub default_text: String,
        pub insert: Point2,
        pub height: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct TableCell {
        pub text: String,
        #[serde(default)]
        pub highlighted: bool,
    }

    impl TableCell {
        pub fn new(text: impl Into<String>) -> Self {
            Self {
                text: text.into(),
                highlighted: false,
            }
        }
    }

    /// 表格按行存储单元格，行内按列顺序排列。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Table {
        pub name: String,
        pub insert: Point2,
        pub rows: Vec<Vec<TableCell>>,
        pub layer: String,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        blocks: HashMap<String, BlockDefinition>,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        /// 设置图层锁定状态，图层不存在时返回 `false`。
        pub fn set_layer_locked(&mut self, name: &str, locked: bool) -> bool {
            match self.layers.get_mut(name) {
                Some(layer) => {
                    layer.is_locked = locked;
                    true
                }
                None => false,
            }
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            self.push(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                rotation,
                layer,
            }))
        }

        pub fn add_mtext(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            reference_width: Option<f64>,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            self.push(Entity::MText(MText {
                insert,
                content: content.into(),
                height,
                reference_width,
                layer,
            }))
        }

        /// 插入块参照。`attributes` 为空时按块定义的属性定义生成实例属性。
        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            attributes: Vec<Attribute>,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let name = name.into();
            let resolved_attributes = if attributes.is_empty() {
                self.block(&name)
                    .map(|definition| {
                        definition
                            .attributes
                            .iter()
                            .map(|def| Attribute {
                                tag: def.tag.clone(),
                                text: def.default_text.clone(),
                                insert: def.insert,
                                height: def.height,
                                is_invisible: false,
                                layer: def.layer.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            } else {
                attributes
            };

            for attribute in &resolved_attributes {
                self.ensure_layer(&attribute.layer);
            }
            self.push(Entity::BlockReference(BlockReference {
                name,
                insert,
                scale,
                rotation,
                attributes: resolved_attributes,
                layer,
            }))
        }

        pub fn add_table(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            rows: Vec<Vec<TableCell>>,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            self.push(Entity::Table(Table {
                name: name.into(),
                insert,
                rows,
                layer,
            }))
        }

        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            for entity in &definition.entities {
                self.ensure_layer(entity.layer_name());
            }
            for attr in &definition.attributes {
                self.ensure_layer(&attr.layer);
            }
            self.blocks.insert(definition.name.clone(), definition);
        }

        /// 删除实体，返回被删除的实体。
        pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
            let position = self
                .entities
                .iter()
                .position(|(entity_id, _)| *entity_id == id)?;
            Some(self.entities.remove(position).1)
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        #[inline]
        pub fn block_mut(&mut self, name: &str) -> Option<&mut BlockDefinition> {
            self.blocks.get_mut(name)
        }

        #[inline]
        pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
            self.blocks.values()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        #[inline]
        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            self.entities
                .iter_mut()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 按名称查找表格实体。
        pub fn table_by_name(&self, name: &str) -> Option<(EntityId, &Table)> {
            self.entities.iter().find_map(|(id, entity)| match entity {
                Entity::Table(table) if table.name.eq_ignore_ascii_case(name) => Some((*id, table)),
                _ => None,
            })
        }

        fn push(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        fn next_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

}
