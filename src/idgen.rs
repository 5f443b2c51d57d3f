//! Content-addressed identifier generation.
//!
//! An [`IdGenerator`] turns the canonical encoding of an entity into its id.
//! The only contract is determinism: the same bytes give the same id for the
//! generator's lifetime. [`HashIdGenerator`] scopes its hash by entity base, so
//! two runs with different bases never share ids.

use sha2::{Digest, Sha256};

/// Maps canonical entity encodings to identifiers.
pub trait IdGenerator: Send {
    /// Returns the identifier for `bytes`.
    fn generate(&mut self, bytes: &[u8]) -> String;
}

/// SHA-256 based generator producing 16 hex character ids.
#[derive(Debug, Clone, Default)]
pub struct HashIdGenerator {
    scope: Vec<u8>,
}

impl HashIdGenerator {
    /// Creates a generator scoped to an optional entity base.
    #[must_use]
    pub fn new(entity_base: Option<&str>) -> Self {
        Self {
            scope: entity_base.unwrap_or_default().as_bytes().to_vec(),
        }
    }
}

impl IdGenerator for HashIdGenerator {
    fn generate(&mut self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.scope);
        hasher.update([0u8]);
        hasher.update(bytes);
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }
}

impl<F> IdGenerator for F
where
    F: FnMut(&[u8]) -> String + Send,
{
    fn generate(&mut self, bytes: &[u8]) -> String {
        self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_bytes_same_id() {
        let mut ids = HashIdGenerator::new(None);
        let a = ids.generate(b"[[\"x\",\"y\"]]");
        let b = ids.generate(b"[[\"x\",\"y\"]]");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, ids.generate(b"[[\"x\",\"z\"]]"));
    }

    #[test]
    fn test_ids_are_lowercase_hex_digest_prefix() {
        let mut ids = HashIdGenerator::new(None);
        let id = ids.generate(b"data");

        let mut hasher = Sha256::new();
        hasher.update([0u8]);
        hasher.update(b"data");
        let digest = hasher.finalize();
        assert_eq!(id, hex::encode(&digest[..8]));
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_scope_changes_ids() {
        let mut plain = HashIdGenerator::new(None);
        let mut scoped = HashIdGenerator::new(Some("http://example.org/"));
        assert_ne!(plain.generate(b"data"), scoped.generate(b"data"));
    }

    #[test]
    fn test_closure_generator() {
        let mut counter = 0;
        let mut ids = move |_: &[u8]| {
            counter += 1;
            format!("e{counter}")
        };
        assert_eq!(IdGenerator::generate(&mut ids, b"a"), "e1");
    }
}
