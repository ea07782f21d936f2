use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::firestore::constants::AUTO_ID_LENGTH;

/// Generates client-side document identifiers.
///
/// IDs are drawn uniformly from `[A-Za-z0-9]`; nothing checks them for
/// uniqueness, the 62^20 space makes collisions negligible in practice.
pub struct AutoId;

impl AutoId {
    pub const LENGTH: usize = AUTO_ID_LENGTH;

    pub fn generate() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .map(char::from)
            .take(Self::LENGTH)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_alphanumeric_ids() {
        let id = AutoId::generate();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_differ() {
        assert_ne!(AutoId::generate(), AutoId::generate());
    }
}
