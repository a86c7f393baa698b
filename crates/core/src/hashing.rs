//! SHA-256 digests used as cache keys.

use sha2::{Digest, Sha256};

/// Incremental digest over a sequence of fields.
///
/// Each field is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` hash
/// differently.
#[derive(Clone, Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new(domain: &str) -> Self {
        Self::default().field(domain)
    }

    pub fn field(mut self, value: impl AsRef<[u8]>) -> Self {
        let value = value.as_ref();
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value);
        self
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}
