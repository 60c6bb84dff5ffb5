// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use serde_json::Value;

/// Ambient key/value state shared between a template, its layout and its includes.
///
/// Clones share the same entries, so a value set by a template is visible to the layout
/// rendered around it.
///
/// ```
/// use stencil::ViewBag;
///
/// let bag = ViewBag::new();
/// let shared = bag.clone();
///
/// shared.insert("Title", "Home");
/// assert_eq!(bag.get("Title"), Some("Home".into()));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ViewBag {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl ViewBag {
    /// Creates an empty view bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, returning the previous one.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.write().insert(name.into(), value.into())
    }

    /// Reads a value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.read().get(name).cloned()
    }

    /// Removes a value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.entries.write().remove(name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ViewBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }
}
