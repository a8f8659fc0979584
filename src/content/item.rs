//! Items
//!
//! A plain item gets a generated single-layer model and the automatic English
//! name. Block items (see `EntryHandle<Block>::item`) carry the block they
//! place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::artifact::{Artifact, EntryContext, Producer};
use crate::builder::{Builder, Entry, HasDefaultArtifacts, ItemLike};
use crate::kind::ArtifactKind;

use super::block::Block;

pub const MAX_STACK_SIZE: u32 = 99;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemProperties {
    pub stack_size: u32,
    pub fire_resistant: bool,
}

impl Default for ItemProperties {
    fn default() -> Self {
        Self {
            stack_size: 64,
            fire_resistant: false,
        }
    }
}

#[derive(Debug)]
pub struct Item {
    properties: ItemProperties,
    block: Option<Arc<Block>>,
}

impl Item {
    pub fn new(properties: ItemProperties) -> anyhow::Result<Self> {
        Self::build(properties, None)
    }

    pub fn for_block(properties: ItemProperties, block: Arc<Block>) -> anyhow::Result<Self> {
        Self::build(properties, Some(block))
    }

    fn build(properties: ItemProperties, block: Option<Arc<Block>>) -> anyhow::Result<Self> {
        if properties.stack_size == 0 || properties.stack_size > MAX_STACK_SIZE {
            anyhow::bail!(
                "stack size {} is outside 1..={MAX_STACK_SIZE}",
                properties.stack_size
            );
        }
        Ok(Self { properties, block })
    }

    pub fn properties(&self) -> &ItemProperties {
        &self.properties
    }

    /// The block this item places, for block items
    pub fn block(&self) -> Option<&Block> {
        self.block.as_deref()
    }
}

impl Entry for Item {
    type Properties = ItemProperties;
    const KIND: &'static str = "item";

    fn initial_properties() -> ItemProperties {
        ItemProperties::default()
    }
}

impl ItemLike for Item {}

impl HasDefaultArtifacts for Item {
    fn install_defaults<P>(builder: &mut Builder<Self, P>) {
        builder.default_model();
    }
}

pub fn item_model_path(namespace: &str, name: &str) -> String {
    format!("assets/{namespace}/models/item/{name}.json")
}

/// Item-specific builder calls
pub trait ItemBuilderExt: Sized {
    /// Generated model with one texture layer
    fn default_model(&mut self) -> &mut Self;
    fn model(&mut self, producer: Producer<Item>) -> &mut Self;
    fn stack_size(&mut self, size: u32) -> &mut Self;
    fn fire_resistant(&mut self) -> &mut Self;
}

impl<P> ItemBuilderExt for Builder<Item, P> {
    fn default_model(&mut self) -> &mut Self {
        self.model(Producer::from_fn(|ctx: &EntryContext<Item>| {
            Ok(vec![Artifact::json(
                item_model_path(ctx.namespace(), ctx.name()),
                json!({
                    "parent": "minecraft:item/generated",
                    "textures": { "layer0": ctx.location("item") },
                }),
            )])
        }))
    }

    fn model(&mut self, producer: Producer<Item>) -> &mut Self {
        self.set_artifact(ArtifactKind::ITEM_MODEL, producer)
    }

    fn stack_size(&mut self, size: u32) -> &mut Self {
        self.properties(move |p| ItemProperties {
            stack_size: size,
            ..p
        })
    }

    fn fire_resistant(&mut self) -> &mut Self {
        self.properties(|p| ItemProperties {
            fire_resistant: true,
            ..p
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistrarError;
    use crate::kind::Sides;
    use crate::registrar::Registrar;
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn default_item_emits_generated_model() {
        let owner = Registrar::new("demo").unwrap();
        owner.item("ruby").register().unwrap();

        let sink = Arc::new(MemorySink::new());
        owner.generate(sink.clone(), &Sides::all()).await.unwrap();

        let model = sink.get("assets/demo/models/item/ruby.json").unwrap();
        assert_eq!(model["parent"], "minecraft:item/generated");
        assert_eq!(model["textures"]["layer0"], "demo:item/ruby");
        let lang = sink.get("assets/demo/lang/en_us.json").unwrap();
        assert_eq!(lang["item.demo.ruby"], "Ruby");
    }

    #[tokio::test]
    async fn recipe_names_the_result() {
        let owner = Registrar::new("demo").unwrap();
        owner
            .item("ruby_block")
            .recipe(|_, result| {
                Ok(json!({
                    "type": "minecraft:crafting_shapeless",
                    "ingredients": [{ "item": "demo:ruby" }],
                    "result": { "id": result, "count": 1 },
                }))
            })
            .register()
            .unwrap();

        let sink = Arc::new(MemorySink::new());
        owner.generate(sink.clone(), &Sides::server_only()).await.unwrap();
        let recipe = sink.get("data/demo/recipe/ruby_block.json").unwrap();
        assert_eq!(recipe["result"]["id"], "demo:ruby_block");
    }

    #[test]
    fn stack_size_is_checked_at_construction() {
        let owner = Registrar::new("demo").unwrap();
        let ok = owner.item("pearl").stack_size(16).register().unwrap();
        assert_eq!(ok.resolve().unwrap().properties().stack_size, 16);

        let bad = owner.item("anvil").stack_size(0).register().unwrap();
        assert!(matches!(
            bad.resolve(),
            Err(RegistrarError::ConstructionFailed { .. })
        ));
        assert!(matches!(
            bad.resolve(),
            Err(RegistrarError::ConstructionPoisoned { .. })
        ));
    }
}
