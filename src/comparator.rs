//! Key comparators and the process-wide comparator registry.
//!
//! A file persists the identity of the comparator its keys were sorted under,
//! and the reader resolves that identity back to an instance at load time.
//! Identities are plain strings registered into a global registry; nothing is
//! derived from the type system.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// A total order over uninterpreted key bytes.
///
/// Implementations must be stateless: the same identity string must describe
/// the same ordering in every process that reads the file.
pub trait Comparator: Send + Sync {
    /// Stable textual identity persisted in the file's metadata.
    fn id(&self) -> &str;

    /// Compare two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

impl std::fmt::Debug for dyn Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparator").field("id", &self.id()).finish()
    }
}

/// Plain unsigned byte-wise ordering. The default, and the order meta-block
/// names are always compared under.
#[derive(Debug, Default)]
pub struct LexicographicComparator;

/// Registry identity of [`LexicographicComparator`].
pub const LEXICOGRAPHIC: &str = "lexicographic";

impl Comparator for LexicographicComparator {
    fn id(&self) -> &str {
        LEXICOGRAPHIC
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn Comparator>>>> = Lazy::new(|| {
    let mut map: HashMap<String, Arc<dyn Comparator>> = HashMap::new();
    map.insert(LEXICOGRAPHIC.to_string(), Arc::new(LexicographicComparator));
    RwLock::new(map)
});

/// Register a comparator under its own identity.
///
/// Later registrations under the same identity replace earlier ones.
pub fn register(comparator: Arc<dyn Comparator>) {
    let id = comparator.id().to_string();
    REGISTRY.write().insert(id, comparator);
}

/// Resolve a comparator identity read from a file.
pub fn resolve(id: &str) -> Result<Arc<dyn Comparator>> {
    REGISTRY
        .read()
        .get(id)
        .cloned()
        .ok_or_else(|| Error::UnknownComparator(id.to_string()))
}

/// The default byte-wise comparator.
pub fn lexicographic() -> Arc<dyn Comparator> {
    Arc::new(LexicographicComparator)
}
