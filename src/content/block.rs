//! Blocks
//!
//! Default artifacts of a block builder:
//! - a blockstate mapping every state to one `cube_all` model, plus that model
//! - a self-drop loot table, skipped when the block has no loot table
//! - the automatic English name

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::artifact::{Artifact, EntryContext, Producer};
use crate::builder::{Builder, Entry, EntryHandle, HasDefaultArtifacts, ItemLike};
use crate::host::RenderLayer;
use crate::key::EntryKey;
use crate::kind::ArtifactKind;

use super::item::Item;

/// Construction-time settings of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockProperties {
    pub strength: f32,
    pub light_level: u8,
    pub requires_tool: bool,
    /// The block never drops anything; loot producers are skipped
    pub no_loot_table: bool,
}

impl Default for BlockProperties {
    fn default() -> Self {
        Self {
            strength: 1.0,
            light_level: 0,
            requires_tool: false,
            no_loot_table: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    properties: BlockProperties,
}

impl Block {
    pub fn new(properties: BlockProperties) -> anyhow::Result<Self> {
        if properties.light_level > 15 {
            anyhow::bail!("light level {} is above 15", properties.light_level);
        }
        if properties.strength < 0.0 {
            anyhow::bail!("strength must not be negative");
        }
        Ok(Self { properties })
    }

    pub fn properties(&self) -> &BlockProperties {
        &self.properties
    }

    pub fn has_loot_table(&self) -> bool {
        !self.properties.no_loot_table
    }
}

impl Entry for Block {
    type Properties = BlockProperties;
    const KIND: &'static str = "block";

    fn initial_properties() -> BlockProperties {
        BlockProperties::default()
    }
}

impl ItemLike for Block {}

impl HasDefaultArtifacts for Block {
    fn install_defaults<P>(builder: &mut Builder<Self, P>) {
        builder.default_blockstate().default_loot();
    }
}

pub fn blockstate_path(namespace: &str, name: &str) -> String {
    format!("assets/{namespace}/blockstates/{name}.json")
}

pub fn block_model_path(namespace: &str, name: &str) -> String {
    format!("assets/{namespace}/models/block/{name}.json")
}

pub fn block_loot_path(namespace: &str, name: &str) -> String {
    format!("data/{namespace}/loot_table/blocks/{name}.json")
}

/// Block model referenced by a blockstate's first variant
pub fn blockstate_model(artifacts: &[Artifact]) -> Option<String> {
    artifacts
        .iter()
        .filter(|a| a.id.contains("/blockstates/"))
        .find_map(|a| {
            a.body["variants"]
                .as_object()?
                .values()
                .next()?
                .get("model")?
                .as_str()
                .map(str::to_string)
        })
}

fn simple_block(ctx: &EntryContext<Block>) -> Vec<Artifact> {
    let model = ctx.location("block");
    vec![
        Artifact::json(
            blockstate_path(ctx.namespace(), ctx.name()),
            json!({ "variants": { "": { "model": model } } }),
        ),
        Artifact::json(
            block_model_path(ctx.namespace(), ctx.name()),
            json!({
                "parent": "minecraft:block/cube_all",
                "textures": { "all": model },
            }),
        ),
    ]
}

fn drop_self(ctx: &EntryContext<Block>) -> Value {
    json!({
        "type": "minecraft:block",
        "pools": [{
            "rolls": 1.0,
            "bonus_rolls": 0.0,
            "entries": [{
                "type": "minecraft:item",
                "name": format!("{}:{}", ctx.namespace(), ctx.name()),
            }],
            "conditions": [{ "condition": "minecraft:survives_explosion" }],
        }],
    })
}

/// Block-specific builder calls
pub trait BlockBuilderExt: Sized {
    fn default_blockstate(&mut self) -> &mut Self;
    fn blockstate(&mut self, producer: Producer<Block>) -> &mut Self;
    fn default_loot(&mut self) -> &mut Self;
    /// Loot table body; not emitted when the block has no loot table
    fn loot<F>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&EntryContext<Block>) -> anyhow::Result<Value> + Send + Sync + 'static;
    fn strength(&mut self, strength: f32) -> &mut Self;
    fn light_level(&mut self, level: u8) -> &mut Self;
    fn requires_tool(&mut self) -> &mut Self;
    fn no_loot_table(&mut self) -> &mut Self;
    /// Seed properties with a copy of another block's
    fn copy_properties(&mut self, block: &EntryHandle<Block>) -> &mut Self;
    fn color(&mut self, rgb: u32) -> &mut Self;
    fn render_layer(&mut self, layer: RenderLayer) -> &mut Self;
    /// Register a plain block item right after the block
    fn simple_item(&mut self) -> &mut Self;
}

impl<P> BlockBuilderExt for Builder<Block, P> {
    fn default_blockstate(&mut self) -> &mut Self {
        self.blockstate(Producer::from_fn(|ctx: &EntryContext<Block>| Ok(simple_block(ctx))))
    }

    fn blockstate(&mut self, producer: Producer<Block>) -> &mut Self {
        self.set_artifact(ArtifactKind::BLOCKSTATE, producer)
    }

    fn default_loot(&mut self) -> &mut Self {
        self.loot(|ctx| Ok(drop_self(ctx)))
    }

    fn loot<F>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&EntryContext<Block>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.set_artifact(
            ArtifactKind::LOOT,
            Producer::from_fn(move |ctx: &EntryContext<Block>| {
                if !ctx.entry().has_loot_table() {
                    return Ok(Vec::new());
                }
                Ok(vec![Artifact::json(
                    block_loot_path(ctx.namespace(), ctx.name()),
                    body(ctx)?,
                )])
            }),
        )
    }

    fn strength(&mut self, strength: f32) -> &mut Self {
        self.properties(move |p| BlockProperties { strength, ..p })
    }

    fn light_level(&mut self, level: u8) -> &mut Self {
        self.properties(move |p| BlockProperties {
            light_level: level,
            ..p
        })
    }

    fn requires_tool(&mut self) -> &mut Self {
        self.properties(|p| BlockProperties {
            requires_tool: true,
            ..p
        })
    }

    fn no_loot_table(&mut self) -> &mut Self {
        self.properties(|p| BlockProperties {
            no_loot_table: true,
            ..p
        })
    }

    fn copy_properties(&mut self, block: &EntryHandle<Block>) -> &mut Self {
        let block = block.clone();
        self.try_initial_properties(move || Ok(block.resolve()?.properties().clone()))
    }

    fn color(&mut self, rgb: u32) -> &mut Self {
        self.set_color(rgb)
    }

    fn render_layer(&mut self, layer: RenderLayer) -> &mut Self {
        self.add_render_layer(layer)
    }

    fn simple_item(&mut self) -> &mut Self {
        let item = EntryKey::new(Item::KIND, self.name());
        self.reserve(item)
            .after_register(|block| block.item().register().map(|_| ()))
    }
}

impl EntryHandle<Block> {
    /// Builder for this block's item. The item resolves the block first,
    /// has no translation of its own and models itself after the block's
    /// blockstate output.
    pub fn item(&self) -> Builder<Item, EntryHandle<Block>> {
        let block = self.clone();
        let upstream = self.key().clone();
        let mut builder: Builder<Item, EntryHandle<Block>> = Builder::new(
            self.owner().clone(),
            self.clone(),
            self.key().name(),
            move |properties| Item::for_block(properties, block.resolve()?),
        );

        builder.no_lang().set_dependent_artifact(
            ArtifactKind::ITEM_MODEL,
            ArtifactKind::BLOCKSTATE,
            Some(upstream),
            Producer::from_fn(|ctx: &EntryContext<Item>| {
                let parent = ctx
                    .dependency()
                    .and_then(blockstate_model)
                    .unwrap_or_else(|| ctx.location("block"));
                Ok(vec![Artifact::json(
                    super::item::item_model_path(ctx.namespace(), ctx.name()),
                    json!({ "parent": parent }),
                )])
            }),
        );
        builder
    }
}
