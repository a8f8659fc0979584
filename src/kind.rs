//! Artifact kinds
//!
//! A kind is the stable identifier of one category of artifact. Each kind is
//! bound to the logical `Side` that consumes it; the host picks which sides
//! (and which individual kinds) run in a generation via a `KindFilter`.
//!
//! `KindRegistry` is append-only: registering a known id again is a no-op when
//! the shape matches and a `KindConflict` otherwise.

use std::fmt;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{RegistrarError, Result};

/// Logical side consuming an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Client,
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Client => "client",
            Side::Server => "server",
        })
    }
}

/// Identifier of one category of artifact.
///
/// Equality and hashing use the id only; `KindRegistry` guarantees one shape
/// per id.
#[derive(Clone, Copy)]
pub struct ArtifactKind {
    id: &'static str,
    side: Side,
}

impl ArtifactKind {
    /// Blockstate definitions and their block models
    pub const BLOCKSTATE: ArtifactKind = ArtifactKind::new("blockstate", Side::Client);
    pub const ITEM_MODEL: ArtifactKind = ArtifactKind::new("item_model", Side::Client);
    /// The aggregated translation file
    pub const LANG: ArtifactKind = ArtifactKind::new("lang", Side::Client);
    pub const LOOT: ArtifactKind = ArtifactKind::new("loot", Side::Server);
    pub const RECIPE: ArtifactKind = ArtifactKind::new("recipe", Side::Server);
    pub const ADVANCEMENT: ArtifactKind = ArtifactKind::new("advancement", Side::Server);
    /// Tag files aggregated over every entry
    pub const TAGS: ArtifactKind = ArtifactKind::new("tags", Side::Server);

    pub const BUILTIN: [ArtifactKind; 7] = [
        Self::BLOCKSTATE,
        Self::ITEM_MODEL,
        Self::LANG,
        Self::LOOT,
        Self::RECIPE,
        Self::ADVANCEMENT,
        Self::TAGS,
    ];

    pub const fn new(id: &'static str, side: Side) -> Self {
        Self { id, side }
    }

    #[inline]
    pub fn id(&self) -> &'static str {
        self.id
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }
}

impl PartialEq for ArtifactKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ArtifactKind {}

impl Hash for ArtifactKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ArtifactKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArtifactKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(other.id)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

impl fmt::Debug for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.side)
    }
}

impl Serialize for ArtifactKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id)
    }
}

/// Append-only, shape-checked set of known kinds
pub struct KindRegistry {
    kinds: RwLock<FxHashMap<&'static str, ArtifactKind>>,
}

impl KindRegistry {
    pub fn empty() -> Self {
        Self {
            kinds: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn with_builtins() -> Self {
        let kinds = ArtifactKind::BUILTIN.iter().map(|k| (k.id, *k)).collect();
        Self {
            kinds: RwLock::new(kinds),
        }
    }

    pub fn register(&self, kind: ArtifactKind) -> Result<()> {
        let mut kinds = self.kinds.write();
        match kinds.get(kind.id) {
            Some(existing) if existing.side == kind.side => Ok(()),
            Some(existing) => Err(RegistrarError::KindConflict {
                kind: kind.id.to_string(),
                existing: format!("{existing:?}"),
                requested: format!("{kind:?}"),
            }),
            None => {
                kinds.insert(kind.id, kind);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<ArtifactKind> {
        self.kinds.read().get(id).copied()
    }

    /// All known kinds, sorted by id
    pub fn all(&self) -> Vec<ArtifactKind> {
        let mut kinds: Vec<ArtifactKind> = self.kinds.read().values().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Host predicate selecting which kinds run in a generation
pub trait KindFilter: Send + Sync {
    fn is_active(&self, kind: &ArtifactKind) -> bool;
}

impl<F> KindFilter for F
where
    F: Fn(&ArtifactKind) -> bool + Send + Sync,
{
    fn is_active(&self, kind: &ArtifactKind) -> bool {
        self(kind)
    }
}

/// Which sides a generation includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sides {
    #[serde(default = "enabled")]
    pub client: bool,
    #[serde(default = "enabled")]
    pub server: bool,
}

fn enabled() -> bool {
    true
}

impl Sides {
    pub fn all() -> Self {
        Self {
            client: true,
            server: true,
        }
    }

    pub fn client_only() -> Self {
        Self {
            client: true,
            server: false,
        }
    }

    pub fn server_only() -> Self {
        Self {
            client: false,
            server: true,
        }
    }

    pub fn includes(&self, side: Side) -> bool {
        match side {
            Side::Client => self.client,
            Side::Server => self.server,
        }
    }
}

impl Default for Sides {
    fn default() -> Self {
        Self::all()
    }
}

impl KindFilter for Sides {
    fn is_active(&self, kind: &ArtifactKind) -> bool {
        self.includes(kind.side())
    }
}

/// Side selection plus an explicit deny-list of kind ids
#[derive(Debug, Clone, Default)]
pub struct ActiveKinds {
    pub sides: Sides,
    pub disabled: FxHashSet<String>,
}

impl ActiveKinds {
    pub fn new(sides: Sides) -> Self {
        Self {
            sides,
            disabled: FxHashSet::default(),
        }
    }

    pub fn disable(mut self, id: impl Into<String>) -> Self {
        self.disabled.insert(id.into());
        self
    }
}

impl KindFilter for ActiveKinds {
    fn is_active(&self, kind: &ArtifactKind) -> bool {
        self.sides.is_active(kind) && !self.disabled.contains(kind.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reregistering_same_shape_is_idempotent() {
        let kinds = KindRegistry::with_builtins();
        assert!(kinds.register(ArtifactKind::LOOT).is_ok());
        assert_eq!(kinds.all().len(), ArtifactKind::BUILTIN.len());
    }

    #[test]
    fn reregistering_other_shape_conflicts() {
        let kinds = KindRegistry::with_builtins();
        let err = kinds
            .register(ArtifactKind::new("loot", Side::Client))
            .unwrap_err();
        assert!(matches!(err, RegistrarError::KindConflict { .. }));
        assert_eq!(kinds.get("loot").map(|k| k.side()), Some(Side::Server));
    }

    #[test]
    fn custom_kinds_are_appended() {
        let kinds = KindRegistry::empty();
        kinds.register(ArtifactKind::new("sound", Side::Client)).unwrap();
        assert_eq!(kinds.all().len(), 1);
    }

    #[test]
    fn sides_filter_by_side() {
        assert!(Sides::server_only().is_active(&ArtifactKind::LOOT));
        assert!(!Sides::server_only().is_active(&ArtifactKind::BLOCKSTATE));
        assert!(Sides::all().is_active(&ArtifactKind::LANG));
    }

    #[test]
    fn active_kinds_honors_deny_list() {
        let filter = ActiveKinds::new(Sides::all()).disable("recipe");
        assert!(!filter.is_active(&ArtifactKind::RECIPE));
        assert!(filter.is_active(&ArtifactKind::LOOT));
    }

    #[test]
    fn closures_are_filters() {
        let only_loot = |k: &ArtifactKind| *k == ArtifactKind::LOOT;
        assert!(only_loot.is_active(&ArtifactKind::LOOT));
        assert!(!only_loot.is_active(&ArtifactKind::RECIPE));
    }
}
