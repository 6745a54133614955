// Stable hashing for deterministic selections.
//
// Indices depend only on the key and salt, never on process state, so the
// same league week always picks the same persona and fallback text.

use sha2::{Digest, Sha256};

/// First 8 bytes of `sha256(key + ":" + salt)` as a big-endian integer.
pub fn stable_hash(key: &str, salt: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(b":");
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Index into a pool of `len` items. Returns 0 for an empty pool.
pub fn stable_index(key: &str, salt: &str, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (stable_hash(key, salt) % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        assert_eq!(stable_hash("River Otters", "home"), stable_hash("River Otters", "home"));
    }

    #[test]
    fn salt_changes_hash() {
        assert_ne!(stable_hash("River Otters", "home"), stable_hash("River Otters", "away"));
    }

    #[test]
    fn index_stays_in_range() {
        for name in ["A", "Bench Mob", "Storm Hawks", "Waiver Wire Wizards"] {
            assert!(stable_index(name, "closer", 7) < 7);
        }
        assert_eq!(stable_index("anything", "x", 0), 0);
    }
}
