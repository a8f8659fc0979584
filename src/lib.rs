//! Registrar - deferred entry registration and dependency-ordered artifact
//! generation
//!
//! Entries are declared through chainable builders and constructed lazily.
//! Each builder attaches producers per artifact kind; a generation run
//! executes them once each, in topological order of their kind dependencies.
//!
//! ```rust,ignore
//! let registrar = Registrar::new("demo")?;
//! registrar.block("polished_stone").strength(2.0).simple_item().register()?;
//! let report = registrar.generate(Arc::new(FsSink::new("out")), &Sides::all()).await?;
//! report.ensure_success()?;
//! ```

pub mod artifact;
pub mod builder;
pub mod config;
pub mod content;
pub mod entry;
pub mod error;
pub mod event_log;
pub mod host;
pub mod interner;
pub mod key;
pub mod kind;
pub mod lang;
pub mod pipeline;
pub mod registrar;
pub mod registry;
pub mod sink;
pub mod tags;

pub use artifact::{Artifact, ArtifactSpec, EntryContext, Producer};
pub use builder::{Builder, Entry, EntryHandle, HasDefaultArtifacts, ItemLike};
pub use config::GenConfig;
pub use content::{Block, BlockBuilderExt, BlockProperties, Item, ItemBuilderExt, ItemProperties};
pub use entry::{AnyEntry, DeferredEntry};
pub use error::{FixSuggestion, RegistrarError, Result};
pub use event_log::{Event, EventKind, EventLog};
pub use host::{ClientRegistrations, HostEvent, HostEvents, RenderLayer};
pub use key::EntryKey;
pub use kind::{ActiveKinds, ArtifactKind, KindFilter, KindRegistry, Side, Sides};
pub use lang::LangTable;
pub use pipeline::{DuplicateGuard, Pipeline, RunFailure, RunReport};
pub use registrar::Registrar;
pub use registry::Registry;
pub use sink::{FsSink, MemorySink, OutputSink};
pub use tags::TagTable;
