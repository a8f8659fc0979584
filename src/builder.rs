//! Generic entry builder
//!
//! `Builder<V, P>` accumulates everything about one entry without
//! constructing it:
//! - a properties chain: a seed plus transforms applied in call order
//! - the factory turning the final properties into `V`
//! - post-materialization hooks
//! - one producer per artifact kind (last write wins)
//! - tags the entry joins, collected by the owner's `TagTable`
//!
//! `register()` is terminal. It wraps the chain as the entry factory, inserts
//! the entry into the registry, hands the producers to the owner and returns
//! an `EntryHandle`. Domain specializations (see `content`) pre-install
//! default producers through `HasDefaultArtifacts`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::artifact::{Artifact, ArtifactSpec, EntryContext, Producer};
use crate::entry::{DeferredEntry, Factory, Hook};
use crate::error::{RegistrarError, Result};
use crate::host::{HostEvent, RenderLayer};
use crate::key::{validate_name, EntryKey};
use crate::kind::{ArtifactKind, Side};
use crate::lang::{automatic_name, translation_key};
use crate::registrar::Registrar;
use crate::tags::tag_id;

/// A type that can be registered through a `Builder`
pub trait Entry: Send + Sync + Sized + 'static {
    /// Value the properties chain folds over before construction
    type Properties: Send + 'static;

    /// Registry kind tag used in keys and translation keys, e.g. `block`
    const KIND: &'static str;

    fn initial_properties() -> Self::Properties;
}

/// Entry types whose builders start with a standard set of producers
pub trait HasDefaultArtifacts: Entry {
    fn install_defaults<P>(builder: &mut Builder<Self, P>);
}

/// Entry types that have an item form, addressed as `<namespace>:<name>`
pub trait ItemLike: Entry {}

type Seed<T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send>;
type Transform<T> = Box<dyn FnOnce(T) -> T + Send>;
type Construct<V, T> = Box<dyn FnOnce(T) -> anyhow::Result<V> + Send>;
type AfterRegister<V> = Box<dyn FnOnce(&EntryHandle<V>) -> Result<()> + Send>;

struct ArtifactSlot<V> {
    producer: Producer<V>,
    depends_on: Option<ArtifactKind>,
    upstream: Option<EntryKey>,
}

enum Label {
    Automatic,
    Custom(String),
    Disabled,
}

/// Client-side values read by host listeners when they fire
#[derive(Default)]
struct ClientHooks {
    color: Arc<Mutex<Option<u32>>>,
    layers: Arc<Mutex<Vec<RenderLayer>>>,
    color_installed: bool,
    layers_installed: bool,
}

/// Chainable, deferred description of one entry
pub struct Builder<V: Entry, P> {
    owner: Registrar,
    parent: P,
    key: EntryKey,
    seed: Option<Seed<V::Properties>>,
    transforms: Vec<Transform<V::Properties>>,
    factory: Option<Construct<V, V::Properties>>,
    hooks: Vec<Hook<V>>,
    artifacts: BTreeMap<ArtifactKind, ArtifactSlot<V>>,
    label: Label,
    /// Title and description of the current advancement
    advancement_lang: Vec<(String, String)>,
    /// Full `namespace:path` ids, in first-added order
    tags: Vec<String>,
    client: ClientHooks,
    after_register: Vec<AfterRegister<V>>,
    /// Keys `after_register` actions will insert; checked before anything else
    reserved: Vec<EntryKey>,
    deferred_error: Option<RegistrarError>,
    registered: bool,
}

impl<V: Entry, P> Builder<V, P> {
    pub(crate) fn new<F>(owner: Registrar, parent: P, name: &str, factory: F) -> Self
    where
        F: FnOnce(V::Properties) -> anyhow::Result<V> + Send + 'static,
    {
        Self {
            owner,
            parent,
            key: EntryKey::new(V::KIND, name),
            seed: Some(Box::new(|| Ok(V::initial_properties()))),
            transforms: Vec::new(),
            factory: Some(Box::new(factory)),
            hooks: Vec::new(),
            artifacts: BTreeMap::new(),
            label: Label::Automatic,
            advancement_lang: Vec::new(),
            tags: Vec::new(),
            client: ClientHooks::default(),
            after_register: Vec::new(),
            reserved: Vec::new(),
            deferred_error: None,
            registered: false,
        }
    }

    #[inline]
    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn owner(&self) -> &Registrar {
        &self.owner
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    // ═══════════════════════════════════════════
    // PROPERTIES CHAIN
    // ═══════════════════════════════════════════

    /// Compose `transform` after every transform added so far
    pub fn properties(
        &mut self,
        transform: impl FnOnce(V::Properties) -> V::Properties + Send + 'static,
    ) -> &mut Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Replace the seed of the chain; composed transforms are kept
    pub fn initial_properties(
        &mut self,
        seed: impl FnOnce() -> V::Properties + Send + 'static,
    ) -> &mut Self {
        self.seed = Some(Box::new(move || Ok(seed())));
        self
    }

    /// Seed that can fail, e.g. one reading another entry
    pub(crate) fn try_initial_properties(
        &mut self,
        seed: impl FnOnce() -> anyhow::Result<V::Properties> + Send + 'static,
    ) -> &mut Self {
        self.seed = Some(Box::new(seed));
        self
    }

    // ═══════════════════════════════════════════
    // HOOKS
    // ═══════════════════════════════════════════

    /// Run `hook` once, right after the entry materializes. Hooks run in
    /// the order they were added.
    pub fn on_register(&mut self, hook: impl FnOnce(&V) + Send + 'static) -> &mut Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub(crate) fn after_register(
        &mut self,
        action: impl FnOnce(&EntryHandle<V>) -> Result<()> + Send + 'static,
    ) -> &mut Self {
        self.after_register.push(Box::new(action));
        self
    }

    /// Declare a key an `after_register` action registers, so a clash fails
    /// this `register()` before the entry is inserted
    pub(crate) fn reserve(&mut self, key: EntryKey) -> &mut Self {
        if !self.reserved.contains(&key) {
            self.reserved.push(key);
        }
        self
    }

    // ═══════════════════════════════════════════
    // ARTIFACTS
    // ═══════════════════════════════════════════

    /// Set the producer for `kind`, replacing any earlier one
    pub fn set_artifact(&mut self, kind: ArtifactKind, producer: Producer<V>) -> &mut Self {
        self.insert_slot(kind, producer, None, None)
    }

    /// Set the producer for `kind`, fed with the `depends_on` output of
    /// `upstream` (this entry when `None`)
    pub fn set_dependent_artifact(
        &mut self,
        kind: ArtifactKind,
        depends_on: ArtifactKind,
        upstream: Option<EntryKey>,
        producer: Producer<V>,
    ) -> &mut Self {
        self.insert_slot(kind, producer, Some(depends_on), upstream)
    }

    fn insert_slot(
        &mut self,
        kind: ArtifactKind,
        producer: Producer<V>,
        depends_on: Option<ArtifactKind>,
        upstream: Option<EntryKey>,
    ) -> &mut Self {
        let slot = ArtifactSlot {
            producer,
            depends_on,
            upstream,
        };
        if self.artifacts.insert(kind, slot).is_some() {
            debug!(entry = %self.key, kind = %kind, "Producer replaced");
        }
        if kind == ArtifactKind::ADVANCEMENT {
            self.advancement_lang.clear();
        }
        self
    }

    /// Drop the producer for `kind`; nothing is scheduled for this entry
    pub fn remove_artifact(&mut self, kind: ArtifactKind) -> &mut Self {
        self.artifacts.remove(&kind);
        if kind == ArtifactKind::ADVANCEMENT {
            self.advancement_lang.clear();
        }
        self
    }

    /// Explicit override that runs but emits nothing
    pub fn skip_artifact(&mut self, kind: ArtifactKind) -> &mut Self {
        self.set_artifact(kind, Producer::noop())
    }

    pub fn has_artifact(&self, kind: ArtifactKind) -> bool {
        self.artifacts.contains_key(&kind)
    }

    // ═══════════════════════════════════════════
    // TRANSLATIONS
    // ═══════════════════════════════════════════

    /// Use `label` instead of the automatic English name
    pub fn lang(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Label::Custom(label.into());
        self
    }

    pub fn no_lang(&mut self) -> &mut Self {
        self.label = Label::Disabled;
        self
    }

    /// Add the entry to `tags`. Bare paths live in the owner's namespace;
    /// repeated calls add more tags.
    pub fn tag(&mut self, tags: &[&str]) -> &mut Self {
        for tag in tags {
            match tag_id(self.owner.namespace(), tag) {
                Ok(id) => {
                    if !self.tags.contains(&id) {
                        self.tags.push(id);
                    }
                }
                Err(e) => {
                    if self.deferred_error.is_none() {
                        self.deferred_error = Some(e);
                    }
                }
            }
        }
        self
    }

    /// Advancement at `data/<ns>/advancement/<path>.json` with translated
    /// title and description. A `display` block is added to the body unless
    /// `body` provides one.
    pub fn advancement<F>(
        &mut self,
        path: &str,
        title: impl Into<String>,
        description: impl Into<String>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(&EntryContext<V>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        if let Err(e) = validate_name(path) {
            if self.deferred_error.is_none() {
                self.deferred_error = Some(e);
            }
            return self;
        }

        let namespace = self.owner.namespace().to_string();
        let base = format!("advancements.{namespace}.{}", path.replace('/', "."));
        let title_key = format!("{base}.title");
        let description_key = format!("{base}.description");
        let lang = vec![
            (title_key.clone(), title.into()),
            (description_key.clone(), description.into()),
        ];

        let path = path.to_string();
        self.set_artifact(
            ArtifactKind::ADVANCEMENT,
            Producer::from_fn(move |ctx: &EntryContext<V>| {
                let mut value = body(ctx)?;
                if let Some(object) = value.as_object_mut() {
                    object.entry("display").or_insert_with(|| {
                        json!({
                            "icon": { "id": format!("{}:{}", ctx.namespace(), ctx.name()) },
                            "title": { "translate": title_key },
                            "description": { "translate": description_key },
                        })
                    });
                }
                Ok(vec![Artifact::json(
                    format!("data/{}/advancement/{path}.json", ctx.namespace()),
                    value,
                )])
            }),
        );
        self.advancement_lang = lang;
        self
    }

    // ═══════════════════════════════════════════
    // CLIENT HOOKS
    // ═══════════════════════════════════════════

    /// Color handler; the host listener is installed on the first call and
    /// reads the latest color when `RegisterColors` fires
    pub(crate) fn set_color(&mut self, rgb: u32) -> &mut Self {
        *self.client.color.lock() = Some(rgb);
        if !self.client.color_installed && self.owner.dist() == Side::Client {
            self.client.color_installed = true;
            let owner = self.owner.clone();
            let key = self.key.clone();
            let color = Arc::clone(&self.client.color);
            self.owner.host().subscribe_once(
                HostEvent::RegisterColors,
                format!("color:{key}"),
                move || {
                    if let Some(rgb) = *color.lock() {
                        owner.client().register_color(key, rgb);
                    }
                },
            );
        }
        self
    }

    /// Render layer; the `ClientSetup` listener is installed once, after
    /// the entry registers
    pub(crate) fn add_render_layer(&mut self, layer: RenderLayer) -> &mut Self {
        self.client.layers.lock().push(layer);
        if !self.client.layers_installed && self.owner.dist() == Side::Client {
            self.client.layers_installed = true;
            let layers = Arc::clone(&self.client.layers);
            self.after_register(move |handle| {
                let owner = handle.owner().clone();
                let key = handle.key().clone();
                handle.owner().host().subscribe_once(
                    HostEvent::ClientSetup,
                    format!("layers:{key}"),
                    move || {
                        let layers = layers.lock().clone();
                        if !layers.is_empty() {
                            owner.client().set_render_layers(key, layers);
                        }
                    },
                );
                Ok(())
            });
        }
        self
    }

    // ═══════════════════════════════════════════
    // TERMINAL
    // ═══════════════════════════════════════════

    /// Insert the entry and its producers. Constructs nothing.
    #[instrument(skip(self), fields(entry = %self.key))]
    pub fn register(&mut self) -> Result<EntryHandle<V>> {
        if self.registered {
            return Err(RegistrarError::AlreadyRegistered {
                key: self.key.clone(),
            });
        }
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }
        self.key.validate()?;
        let registry = self.owner.registry();
        if let Some(taken) = self.reserved.iter().find(|k| registry.contains(k)) {
            return Err(RegistrarError::DuplicateKey { key: taken.clone() });
        }
        for kind in self.artifacts.keys() {
            self.owner.kinds().register(*kind)?;
        }

        let (Some(seed), Some(construct)) = (self.seed.take(), self.factory.take()) else {
            return Err(RegistrarError::AlreadyRegistered {
                key: self.key.clone(),
            });
        };
        let transforms = std::mem::take(&mut self.transforms);
        let factory: Factory<V> = Box::new(move || {
            let properties = transforms
                .into_iter()
                .fold(seed()?, |properties, transform| transform(properties));
            construct(properties)
        });

        let entry: DeferredEntry<V> = self
            .owner
            .registry()
            .register_boxed(self.key.clone(), factory)?;
        self.registered = true;

        for hook in self.hooks.drain(..) {
            entry.on_materialized(hook);
        }

        let namespace: Arc<str> = Arc::from(self.owner.namespace());
        for (kind, slot) in std::mem::take(&mut self.artifacts) {
            let spec = ArtifactSpec::bind(kind, entry.clone(), Arc::clone(&namespace), slot.producer)
                .depends_on(slot.depends_on)
                .upstream(slot.upstream);
            self.owner.add_spec(self.key.clone(), spec);
        }

        let lang = self.owner.lang();
        let label = match &self.label {
            Label::Automatic => Some(automatic_name(self.key.name())),
            Label::Custom(label) => Some(label.clone()),
            Label::Disabled => None,
        };
        if let Some(label) = label {
            lang.add(
                translation_key(V::KIND, &namespace, self.key.name()),
                label,
            );
        }
        for (key, label) in self.advancement_lang.drain(..) {
            lang.add(key, label);
        }
        let member = format!("{namespace}:{}", self.key.name());
        for tag in self.tags.drain(..) {
            self.owner.tags().add(V::KIND, &tag, member.clone());
        }

        let handle = EntryHandle {
            owner: self.owner.clone(),
            entry,
        };
        for action in std::mem::take(&mut self.after_register) {
            action(&handle)?;
        }

        debug!("Builder registered");
        Ok(handle)
    }

    /// Register and return the parent context
    pub fn build(&mut self) -> Result<P>
    where
        P: Clone,
    {
        self.register()?;
        Ok(self.parent.clone())
    }
}

impl<V: ItemLike, P> Builder<V, P> {
    /// Recipe at `data/<ns>/recipe/<name>.json`; `body` receives the
    /// context and the id of the item the recipe yields
    pub fn recipe<F>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&EntryContext<V>, &str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.set_artifact(
            ArtifactKind::RECIPE,
            Producer::from_fn(move |ctx: &EntryContext<V>| {
                let result = format!("{}:{}", ctx.namespace(), ctx.name());
                Ok(vec![Artifact::json(
                    format!("data/{}/recipe/{}.json", ctx.namespace(), ctx.name()),
                    body(ctx, &result)?,
                )])
            }),
        )
    }
}

impl<V: Entry, P> fmt::Debug for Builder<V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("key", &self.key)
            .field("artifacts", &self.artifacts.keys().collect::<Vec<_>>())
            .field("registered", &self.registered)
            .finish()
    }
}

/// What `register()` returns: the entry plus its owner
pub struct EntryHandle<V> {
    owner: Registrar,
    entry: DeferredEntry<V>,
}

impl<V> Clone for EntryHandle<V> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            entry: self.entry.clone(),
        }
    }
}

impl<V: Send + Sync + 'static> EntryHandle<V> {
    #[inline]
    pub fn key(&self) -> &EntryKey {
        self.entry.key()
    }

    pub fn owner(&self) -> &Registrar {
        &self.owner
    }

    pub fn entry(&self) -> &DeferredEntry<V> {
        &self.entry
    }

    /// Construct on first call
    pub fn resolve(&self) -> Result<Arc<V>> {
        self.entry.resolve()
    }

    /// Never constructs
    pub fn get(&self) -> Option<Arc<V>> {
        self.entry.get()
    }

    pub fn is_materialized(&self) -> bool {
        self.entry.is_materialized()
    }
}

impl<V: Send + Sync + 'static> fmt::Debug for EntryHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryHandle").field(&self.entry.key()).finish()
    }
}
