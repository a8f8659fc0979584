//! Artifacts, producers and artifact specs
//!
//! - `Artifact`: one emitted output (unique id + JSON body)
//! - `EntryContext<V>`: what a producer sees for one entry
//! - `Producer<V>`: typed async callback, stored per kind on a builder
//! - `ArtifactSpec`: a producer bound to its entry, as handed to the pipeline

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::entry::DeferredEntry;
use crate::key::EntryKey;
use crate::kind::ArtifactKind;

/// A single emitted output. `id` is unique per run (a relative output path).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub id: String,
    pub body: Value,
}

impl Artifact {
    pub fn json(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

pub type ProducerOutput = anyhow::Result<Vec<Artifact>>;
pub type ProducerFuture = BoxFuture<'static, ProducerOutput>;

/// Read-only view handed to a producer
pub struct EntryContext<V> {
    key: EntryKey,
    namespace: Arc<str>,
    entry: Arc<V>,
    dependency: Option<Arc<[Artifact]>>,
}

impl<V> EntryContext<V> {
    pub fn new(
        key: EntryKey,
        namespace: Arc<str>,
        entry: Arc<V>,
        dependency: Option<Arc<[Artifact]>>,
    ) -> Self {
        Self {
            key,
            namespace,
            entry,
            dependency,
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

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn entry(&self) -> &V {
        &self.entry
    }

    pub fn entry_arc(&self) -> Arc<V> {
        Arc::clone(&self.entry)
    }

    /// Output of the declared dependency kind for the upstream entry.
    /// `None` when no dependency is declared, the dependency kind is
    /// inactive, or its producer emitted nothing.
    pub fn dependency(&self) -> Option<&[Artifact]> {
        self.dependency.as_deref()
    }

    /// `namespace:prefix/name`
    pub fn location(&self, prefix: &str) -> String {
        format!("{}:{}/{}", self.namespace, prefix, self.key.name())
    }
}

/// Typed artifact producer for entries of type `V`
pub struct Producer<V>(Arc<dyn Fn(EntryContext<V>) -> ProducerFuture + Send + Sync>);

impl<V> Clone for Producer<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V: Send + Sync + 'static> Producer<V> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(EntryContext<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProducerOutput> + Send + 'static,
    {
        Self(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// Producer whose work is synchronous
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&EntryContext<V>) -> ProducerOutput + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx| futures::future::ready(f(&ctx)).boxed()))
    }

    /// Explicit override that emits nothing
    pub fn noop() -> Self {
        Self::from_fn(|_| Ok(Vec::new()))
    }

    pub fn call(&self, ctx: EntryContext<V>) -> ProducerFuture {
        (self.0)(ctx)
    }
}

impl<V> fmt::Debug for Producer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Producer")
    }
}

type BoundProducer = Arc<dyn Fn(Option<Arc<[Artifact]>>) -> ProducerFuture + Send + Sync>;

/// A producer bound to one entry, with its declared dependency
#[derive(Clone)]
pub struct ArtifactSpec {
    kind: ArtifactKind,
    depends_on: Option<ArtifactKind>,
    /// Entry whose dependency output is read; the producer's own entry when `None`
    upstream: Option<EntryKey>,
    producer: BoundProducer,
}

impl ArtifactSpec {
    /// Spec from an untyped callback receiving only the dependency output
    pub fn new<F, Fut>(kind: ArtifactKind, f: F) -> Self
    where
        F: Fn(Option<Arc<[Artifact]>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProducerOutput> + Send + 'static,
    {
        Self {
            kind,
            depends_on: None,
            upstream: None,
            producer: Arc::new(move |dep| f(dep).boxed()),
        }
    }

    /// Bind a typed producer to a deferred entry. The entry is resolved
    /// inside the returned future, on first invocation.
    pub fn bind<V: Send + Sync + 'static>(
        kind: ArtifactKind,
        entry: DeferredEntry<V>,
        namespace: Arc<str>,
        producer: Producer<V>,
    ) -> Self {
        Self::new(kind, move |dependency| {
            let entry = entry.clone();
            let namespace = Arc::clone(&namespace);
            let producer = producer.clone();
            async move {
                let value = entry.resolve()?;
                let ctx = EntryContext::new(entry.key().clone(), namespace, value, dependency);
                producer.call(ctx).await
            }
        })
    }

    pub fn depends_on(mut self, kind: Option<ArtifactKind>) -> Self {
        self.depends_on = kind;
        self
    }

    pub fn upstream(mut self, key: Option<EntryKey>) -> Self {
        self.upstream = key;
        self
    }

    #[inline]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    #[inline]
    pub fn dependency(&self) -> Option<ArtifactKind> {
        self.depends_on
    }

    pub fn upstream_key(&self) -> Option<&EntryKey> {
        self.upstream.as_ref()
    }

    pub(crate) fn invoke(&self, dependency: Option<Arc<[Artifact]>>) -> ProducerFuture {
        (self.producer)(dependency)
    }
}

impl fmt::Debug for ArtifactSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSpec")
            .field("kind", &self.kind)
            .field("depends_on", &self.depends_on)
            .field("upstream", &self.upstream)
            .finish()
    }
}
