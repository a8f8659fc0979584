//! Host lifecycle collaborators
//!
//! `HostEvents` defers side effects to a host-chosen moment: a listener is
//! subscribed under an id and runs at most once, no matter how many times the
//! subscription call is repeated. `ClientRegistrations` is what client-side
//! listeners (colors, render layers) write into.

use std::fmt;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::key::EntryKey;

/// Lifecycle moments a host fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEvent {
    /// Client setup: render layers are applied here
    ClientSetup,
    /// Color handler registration
    RegisterColors,
}

type Listener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Subscriptions {
    /// Every (event, id) ever subscribed; a repeated subscription is ignored
    seen: FxHashSet<(HostEvent, String)>,
    pending: Vec<(HostEvent, String, Listener)>,
}

/// One-shot host event listeners
#[derive(Default)]
pub struct HostEvents {
    subscriptions: Mutex<Subscriptions>,
}

impl HostEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to the next `fire(event)`. Returns `false` when
    /// `id` was already subscribed to `event`; the new listener is dropped.
    pub fn subscribe_once(
        &self,
        event: HostEvent,
        id: impl Into<String>,
        listener: impl FnOnce() + Send + 'static,
    ) -> bool {
        let id = id.into();
        let mut subs = self.subscriptions.lock();
        if !subs.seen.insert((event, id.clone())) {
            return false;
        }
        subs.pending.push((event, id, Box::new(listener)));
        true
    }

    /// Run and drop every pending listener of `event`, in subscription order.
    /// Returns how many ran.
    pub fn fire(&self, event: HostEvent) -> usize {
        let ready: Vec<(String, Listener)> = {
            let mut subs = self.subscriptions.lock();
            let (ready, rest): (Vec<_>, Vec<_>) =
                std::mem::take(&mut subs.pending)
                    .into_iter()
                    .partition(|(e, _, _)| *e == event);
            subs.pending = rest;
            ready.into_iter().map(|(_, id, l)| (id, l)).collect()
        };

        let count = ready.len();
        for (id, listener) in ready {
            debug!(?event, listener = %id, "Host listener fired");
            listener();
        }
        count
    }

    pub fn pending(&self, event: HostEvent) -> usize {
        self.subscriptions
            .lock()
            .pending
            .iter()
            .filter(|(e, _, _)| *e == event)
            .count()
    }
}

impl fmt::Debug for HostEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEvents")
            .field("pending", &self.subscriptions.lock().pending.len())
            .finish()
    }
}

/// Block render layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderLayer {
    Solid,
    Cutout,
    CutoutMipped,
    Translucent,
}

/// Client-side registrations made by host listeners
#[derive(Debug, Default)]
pub struct ClientRegistrations {
    colors: DashMap<EntryKey, u32>,
    render_layers: DashMap<EntryKey, Vec<RenderLayer>>,
}

impl ClientRegistrations {
    pub fn register_color(&self, key: EntryKey, rgb: u32) {
        self.colors.insert(key, rgb);
    }

    pub fn set_render_layers(&self, key: EntryKey, layers: Vec<RenderLayer>) {
        self.render_layers.insert(key, layers);
    }

    pub fn color(&self, key: &EntryKey) -> Option<u32> {
        self.colors.get(key).map(|c| *c)
    }

    pub fn render_layers(&self, key: &EntryKey) -> Option<Vec<RenderLayer>> {
        self.render_layers.get(key).map(|l| l.clone())
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }
}
