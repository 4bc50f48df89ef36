//! # Captured variables attached to every unit.
//!
//! [`Bindings`] is a name → value map the host fills before the run starts (values
//! captured from the caller's scope, injected parameters). Attaching bindings to a
//! unit never runs code; bodies read them by name and type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-keyed, read-only variable map shared by all units of one run.
///
/// # Example
/// ```rust
/// use parapipe::Bindings;
///
/// let b = Bindings::new().with("prefix", String::from("item-")).with("factor", 3u32);
/// assert_eq!(b.get::<u32>("factor"), Some(&3));
/// assert_eq!(b.get::<String>("factor"), None); // wrong type
/// assert!(b.get::<u32>("missing").is_none());
/// ```
#[derive(Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a value.
    pub fn insert<V: Any + Send + Sync>(&mut self, name: impl Into<String>, value: V) {
        self.values.insert(name.into(), Arc::new(value));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<V: Any + Send + Sync>(mut self, name: impl Into<String>, value: V) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value if it exists and has type `V`.
    pub fn get<V: Any>(&self, name: &str) -> Option<&V> {
        self.values.get(name)?.downcast_ref::<V>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the bound names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings").field("names", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces() {
        let mut b = Bindings::new();
        b.insert("x", 1i64);
        b.insert("x", "now a str");
        assert_eq!(b.len(), 1);
        assert_eq!(b.get::<i64>("x"), None);
        assert_eq!(b.get::<&str>("x"), Some(&"now a str"));
    }

    #[test]
    fn test_names_sorted() {
        let b = Bindings::new().with("b", 1u8).with("a", 2u8);
        assert_eq!(b.names(), ["a", "b"]);
        assert_eq!(format!("{b:?}"), r#"Bindings { names: ["a", "b"] }"#);
    }
}
