//! Registrar - owning handle for one namespace
//!
//! Ties together the entry registry, the provider set filled by builders, the
//! kind registry and the host collaborators. Cheap to clone; every clone
//! shares the same state.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::artifact::{Artifact, ArtifactSpec};
use crate::builder::{Builder, Entry, HasDefaultArtifacts};
use crate::content::{Block, Item};
use crate::error::Result;
use crate::host::{ClientRegistrations, HostEvents};
use crate::key::{validate_namespace, EntryKey};
use crate::kind::{ArtifactKind, KindFilter, KindRegistry, Side};
use crate::lang::LangTable;
use crate::pipeline::{Pipeline, RunReport};
use crate::registry::Registry;
use crate::tags::TagTable;
use crate::sink::OutputSink;

struct Inner {
    namespace: Arc<str>,
    dist: Side,
    registry: Registry,
    providers: RwLock<Vec<(EntryKey, ArtifactSpec)>>,
    kinds: KindRegistry,
    host: HostEvents,
    client: ClientRegistrations,
    lang: Arc<LangTable>,
    tags: Arc<TagTable>,
}

#[derive(Clone)]
pub struct Registrar {
    inner: Arc<Inner>,
}

impl Registrar {
    /// Registrar running on the client dist
    pub fn new(namespace: &str) -> Result<Self> {
        Self::with_dist(namespace, Side::Client)
    }

    /// Registrar for `dist`; client-only host hooks are not installed on a
    /// server dist
    pub fn with_dist(namespace: &str, dist: Side) -> Result<Self> {
        validate_namespace(namespace)?;
        Ok(Self {
            inner: Arc::new(Inner {
                namespace: Arc::from(namespace),
                dist,
                registry: Registry::new(),
                providers: RwLock::new(Vec::new()),
                kinds: KindRegistry::with_builtins(),
                host: HostEvents::new(),
                client: ClientRegistrations::default(),
                lang: Arc::new(LangTable::new()),
                tags: Arc::new(TagTable::new()),
            }),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn dist(&self) -> Side {
        self.inner.dist
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.inner.kinds
    }

    pub fn host(&self) -> &HostEvents {
        &self.inner.host
    }

    pub fn client(&self) -> &ClientRegistrations {
        &self.inner.client
    }

    pub fn lang(&self) -> &LangTable {
        &self.inner.lang
    }

    pub fn tags(&self) -> &TagTable {
        &self.inner.tags
    }

    // ═══════════════════════════════════════════
    // BUILDERS
    // ═══════════════════════════════════════════

    /// Bare builder for any entry type; no default producers
    pub fn entry<V, F>(&self, name: &str, factory: F) -> Builder<V, ()>
    where
        V: Entry,
        F: FnOnce(V::Properties) -> anyhow::Result<V> + Send + 'static,
    {
        Builder::new(self.clone(), (), name, factory)
    }

    /// Builder with the entry type's default producers installed
    pub fn object<V, F>(&self, name: &str, factory: F) -> Builder<V, ()>
    where
        V: HasDefaultArtifacts,
        F: FnOnce(V::Properties) -> anyhow::Result<V> + Send + 'static,
    {
        let mut builder = self.entry::<V, F>(name, factory);
        V::install_defaults(&mut builder);
        builder
    }

    pub fn block(&self, name: &str) -> Builder<Block, ()> {
        self.object(name, Block::new)
    }

    pub fn item(&self, name: &str) -> Builder<Item, ()> {
        self.object(name, Item::new)
    }

    // ═══════════════════════════════════════════
    // GENERATION
    // ═══════════════════════════════════════════

    pub(crate) fn add_spec(&self, key: EntryKey, spec: ArtifactSpec) {
        debug!(entry = %key, kind = %spec.kind(), "Producer recorded");
        self.inner.providers.write().push((key, spec));
    }

    /// Every recorded (entry, producer) pair, in registration order
    pub fn specs(&self) -> Vec<(EntryKey, ArtifactSpec)> {
        self.inner.providers.read().clone()
    }

    /// Pipeline over every recorded producer plus the translation and tag files
    pub fn pipeline(&self, filter: &dyn KindFilter) -> Result<Pipeline> {
        let mut specs = self.specs();
        specs.push((EntryKey::new(ArtifactKind::LANG.id(), "en_us"), self.lang_spec()));
        if !self.inner.tags.is_empty() {
            specs.push((EntryKey::new(ArtifactKind::TAGS.id(), "all"), self.tags_spec()));
        }
        Pipeline::new(specs, filter)
    }

    /// One full generation run
    #[instrument(skip_all, fields(namespace = %self.namespace()))]
    pub async fn generate(
        &self,
        sink: Arc<dyn OutputSink>,
        filter: &dyn KindFilter,
    ) -> Result<RunReport> {
        self.pipeline(filter)?.run(sink).await
    }

    /// Every tag file, each listing all entries that joined the tag
    fn tags_spec(&self) -> ArtifactSpec {
        let tags = Arc::clone(&self.inner.tags);
        ArtifactSpec::new(ArtifactKind::TAGS, move |_| {
            futures::future::ready(Ok(tags.to_artifacts()))
        })
    }

    /// `assets/<ns>/lang/en_us.json`, emitted only when the table has entries
    fn lang_spec(&self) -> ArtifactSpec {
        let lang = Arc::clone(&self.inner.lang);
        let path = format!("assets/{}/lang/en_us.json", self.namespace());
        ArtifactSpec::new(ArtifactKind::LANG, move |_| {
            let artifacts = if lang.is_empty() {
                Vec::new()
            } else {
                vec![Artifact::json(path.clone(), lang.to_json())]
            };
            futures::future::ready(Ok(artifacts))
        })
    }
}

impl fmt::Debug for Registrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrar")
            .field("namespace", &self.inner.namespace)
            .field("dist", &self.inner.dist)
            .field("entries", &self.inner.registry.len())
            .field("producers", &self.inner.providers.read().len())
            .finish()
    }
}
