//! Stable inventory-id generation.

use ulid::Ulid;

/// Generates a fresh inventory id: a ULID's Crockford base32 text form,
/// lexically sortable and timestamp-encoding, used as the
/// [`crate::resource_group::INVENTORY_ID_LABEL`] value.
pub fn generate_inventory_id() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_ulid_shaped() {
        let id = generate_inventory_id();
        assert_eq!(id.len(), 26);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn successive_ids_sort_lexically_with_time() {
        let a = generate_inventory_id();
        let b = generate_inventory_id();
        assert_ne!(a, b);
    }
}
