//! Entry identity
//!
//! An `EntryKey` is the immutable (kind, name) pair used to address a
//! deferred entry. Both halves are interned `Arc<str>` so keys clone in O(1)
//! and can be shared freely between the registry, the provider set and
//! in-flight producers.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{RegistrarError, Result};
use crate::interner::intern;

static NAMESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_.-]+$").expect("valid namespace pattern"));

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_.-]+(/[a-z0-9_.-]+)*$").expect("valid name pattern"));

/// Identity of a deferred entry: `(kind, name)`
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    kind: Arc<str>,
    name: Arc<str>,
}

impl EntryKey {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: intern(kind),
            name: intern(name),
        }
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the name half against the allowed character set
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

impl fmt::Debug for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryKey({}/{})", self.kind, self.name)
    }
}

impl Serialize for EntryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn validate_namespace(namespace: &str) -> Result<()> {
    if NAMESPACE_PATTERN.is_match(namespace) {
        Ok(())
    } else {
        Err(RegistrarError::InvalidName {
            what: "namespace",
            value: namespace.to_string(),
        })
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(RegistrarError::InvalidName {
            what: "entry name",
            value: name.to_string(),
        })
    }
}
