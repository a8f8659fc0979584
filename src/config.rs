//! Generation config
//!
//! YAML file describing one namespace: where to write, which sides and kinds
//! run, and the content manifest (blocks and items) to register.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags
//! 2. Environment variables (`REGISTRAR_OUTPUT`, `REGISTRAR_NAMESPACE`)
//! 3. Config file
//! 4. Defaults

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::builder::EntryHandle;
use crate::content::{Block, BlockBuilderExt, ItemBuilderExt};
use crate::error::{RegistrarError, Result};
use crate::host::RenderLayer;
use crate::key::{validate_name, validate_namespace};
use crate::kind::{ActiveKinds, Sides};
use crate::registrar::Registrar;

pub const OUTPUT_ENV: &str = "REGISTRAR_OUTPUT";
pub const NAMESPACE_ENV: &str = "REGISTRAR_NAMESPACE";

fn default_output() -> PathBuf {
    PathBuf::from("generated")
}

/// Top-level generation config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenConfig {
    pub namespace: String,

    /// Output root directory
    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default)]
    pub sides: Sides,

    /// Kind ids never run
    #[serde(default)]
    pub disabled_kinds: Vec<String>,

    #[serde(default)]
    pub blocks: Vec<BlockSpec>,

    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

/// Advancement attached to an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancementSpec {
    pub path: String,
    pub title: String,
    pub description: String,
    /// Advancement this one follows, e.g. `demo:story/root`
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub no_lang: bool,
    #[serde(default)]
    pub strength: Option<f32>,
    #[serde(default)]
    pub light_level: Option<u8>,
    #[serde(default)]
    pub requires_tool: bool,
    #[serde(default)]
    pub no_loot_table: bool,
    /// Seed properties from an earlier block of this manifest
    #[serde(default)]
    pub copy_from: Option<String>,
    /// Register a block item as well
    #[serde(default)]
    pub item: bool,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub render_layers: Vec<RenderLayer>,
    /// Block tags, `path` or `namespace:path`
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub advancement: Option<AdvancementSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub no_lang: bool,
    #[serde(default)]
    pub stack_size: Option<u32>,
    #[serde(default)]
    pub fire_resistant: bool,
    /// Shapeless recipe ingredients (item ids)
    #[serde(default)]
    pub recipe: Vec<String>,
    /// Item tags, `path` or `namespace:path`
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub advancement: Option<AdvancementSpec>,
}

impl GenConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistrarError::Config {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;
        let config = Self::from_yaml(&content)?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Merge environment overrides; environment wins over file values
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(output) = var(OUTPUT_ENV).filter(|v| !v.is_empty()) {
            self.output = PathBuf::from(output);
        }
        if let Some(namespace) = var(NAMESPACE_ENV).filter(|v| !v.is_empty()) {
            self.namespace = namespace;
        }
        self
    }

    /// Check names, duplicates and `copy_from` references
    pub fn validate(&self) -> Result<()> {
        validate_namespace(&self.namespace)?;

        let mut blocks = FxHashSet::default();
        for block in &self.blocks {
            validate_name(&block.name)?;
            if let Some(source) = &block.copy_from {
                if !blocks.contains(source.as_str()) {
                    return Err(RegistrarError::Config {
                        reason: format!(
                            "block '{}' copies '{}', which is not declared before it",
                            block.name, source
                        ),
                    });
                }
            }
            if !blocks.insert(block.name.as_str()) {
                return Err(duplicate("block", &block.name));
            }
        }

        // Block items share the block's name
        let mut items: FxHashSet<&str> = self
            .blocks
            .iter()
            .filter(|b| b.item)
            .map(|b| b.name.as_str())
            .collect();
        for item in &self.items {
            validate_name(&item.name)?;
            if !items.insert(item.name.as_str()) {
                return Err(duplicate("item", &item.name));
            }
        }

        Ok(())
    }

    pub fn filter(&self) -> ActiveKinds {
        ActiveKinds {
            sides: self.sides,
            disabled: self.disabled_kinds.iter().cloned().collect(),
        }
    }

    /// A registrar with every manifest entry registered
    pub fn registrar(&self) -> Result<Registrar> {
        self.validate()?;
        let registrar = Registrar::new(&self.namespace)?;
        let mut blocks: FxHashMap<&str, EntryHandle<Block>> = FxHashMap::default();

        for spec in &self.blocks {
            let mut builder = registrar.block(&spec.name);
            if let Some(label) = &spec.label {
                builder.lang(label.clone());
            }
            if spec.no_lang {
                builder.no_lang();
            }
            if let Some(source) = spec.copy_from.as_deref().and_then(|s| blocks.get(s)) {
                builder.copy_properties(source);
            }
            if let Some(strength) = spec.strength {
                builder.strength(strength);
            }
            if let Some(level) = spec.light_level {
                builder.light_level(level);
            }
            if spec.requires_tool {
                builder.requires_tool();
            }
            if spec.no_loot_table {
                builder.no_loot_table();
            }
            if let Some(rgb) = spec.color {
                builder.color(rgb);
            }
            for layer in &spec.render_layers {
                builder.render_layer(*layer);
            }
            builder.tag(&tag_refs(&spec.tags));
            if let Some(advancement) = &spec.advancement {
                add_advancement(&mut builder, advancement);
            }
            if spec.item {
                builder.simple_item();
            }
            let handle = builder.register()?;
            blocks.insert(spec.name.as_str(), handle);
        }

        for spec in &self.items {
            let mut builder = registrar.item(&spec.name);
            if let Some(label) = &spec.label {
                builder.lang(label.clone());
            }
            if spec.no_lang {
                builder.no_lang();
            }
            if let Some(size) = spec.stack_size {
                builder.stack_size(size);
            }
            if spec.fire_resistant {
                builder.fire_resistant();
            }
            builder.tag(&tag_refs(&spec.tags));
            if !spec.recipe.is_empty() {
                let ingredients: Vec<serde_json::Value> = spec
                    .recipe
                    .iter()
                    .map(|id| json!({ "item": id }))
                    .collect();
                builder.recipe(move |_, result| {
                    Ok(json!({
                        "type": "minecraft:crafting_shapeless",
                        "ingredients": ingredients,
                        "result": { "id": result, "count": 1 },
                    }))
                });
            }
            if let Some(advancement) = &spec.advancement {
                add_advancement(&mut builder, advancement);
            }
            builder.register()?;
        }

        Ok(registrar)
    }
}

fn tag_refs(tags: &[String]) -> Vec<&str> {
    tags.iter().map(String::as_str).collect()
}

fn duplicate(what: &str, name: &str) -> RegistrarError {
    RegistrarError::Config {
        reason: format!("{what} '{name}' is declared twice"),
    }
}

/// Advancement granted when the player obtains the entry's item
fn add_advancement<V: crate::builder::Entry, P>(
    builder: &mut crate::builder::Builder<V, P>,
    spec: &AdvancementSpec,
) {
    let parent = spec.parent.clone();
    builder.advancement(&spec.path, spec.title.clone(), spec.description.clone(), move |ctx| {
        let item = format!("{}:{}", ctx.namespace(), ctx.name());
        let mut body = json!({
            "criteria": {
                "has_item": {
                    "trigger": "minecraft:inventory_changed",
                    "conditions": { "items": [{ "items": item }] },
                }
            }
        });
        if let Some(parent) = &parent {
            body["parent"] = json!(parent);
        }
        Ok(body)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{ArtifactKind, KindFilter};

    const MANIFEST: &str = r#"
namespace: demo
sides:
  server: false
disabled_kinds: [recipe]
blocks:
  - name: granite
    strength: 3.0
    tags: [mineable/pickaxe]
  - name: polished_granite
    copy_from: granite
    item: true
items:
  - name: ruby
    stack_size: 16
    recipe: ["demo:granite"]
"#;

    #[test]
    fn parses_with_defaults() {
        let config = GenConfig::from_yaml(MANIFEST).unwrap();
        assert_eq!(config.output, PathBuf::from("generated"));
        assert!(config.sides.client);
        assert!(!config.sides.server);
        assert_eq!(config.blocks.len(), 2);
        assert!(config.blocks[1].item);
    }

    #[test]
    fn filter_combines_sides_and_deny_list() {
        let filter = GenConfig::from_yaml(MANIFEST).unwrap().filter();
        assert!(filter.is_active(&ArtifactKind::BLOCKSTATE));
        assert!(!filter.is_active(&ArtifactKind::LOOT));
        assert!(!filter.is_active(&ArtifactKind::RECIPE));
    }

    #[test]
    fn env_overrides_file() {
        let config = GenConfig::from_yaml(MANIFEST)
            .unwrap()
            .with_vars(|name| match name {
                OUTPUT_ENV => Some("/tmp/out".to_string()),
                NAMESPACE_ENV => Some(String::new()),
                _ => None,
            });
        assert_eq!(config.output, PathBuf::from("/tmp/out"));
        assert_eq!(config.namespace, "demo");
    }

    #[test]
    fn registrar_registers_manifest() {
        let registrar = GenConfig::from_yaml(MANIFEST).unwrap().registrar().unwrap();
        // two blocks, one block item, one item
        assert_eq!(registrar.registry().len(), 4);
        let polished = registrar
            .registry()
            .resolve::<Block>(&crate::key::EntryKey::new("block", "polished_granite"))
            .unwrap();
        assert_eq!(polished.properties().strength, 3.0);
        assert_eq!(
            registrar.tags().members("block", "demo:mineable/pickaxe"),
            vec!["demo:granite"]
        );
    }

    #[test]
    fn rejects_forward_copy_and_duplicates() {
        let forward = GenConfig::from_yaml(
            "namespace: demo\nblocks:\n  - name: a\n    copy_from: b\n  - name: b\n",
        )
        .unwrap();
        assert!(matches!(forward.validate(), Err(RegistrarError::Config { .. })));

        let clash = GenConfig::from_yaml(
            "namespace: demo\nblocks:\n  - name: a\n    item: true\nitems:\n  - name: a\n",
        )
        .unwrap();
        assert!(matches!(clash.validate(), Err(RegistrarError::Config { .. })));
    }

    #[test]
    fn bad_yaml_is_a_parse_error() {
        assert!(matches!(
            GenConfig::from_yaml("namespace: [unclosed"),
            Err(RegistrarError::YamlParse(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = GenConfig::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("REG-040"));
    }
}
