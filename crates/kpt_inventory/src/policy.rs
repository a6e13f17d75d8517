//! Adoption policy: whether this client may mutate an inventory it did not
//! create.

use std::collections::BTreeMap;

use crate::resource_group::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdoptionPolicy {
    /// The inventory already carries this tool's managed-by label: only
    /// this client may mutate it.
    StrictMatch,
    /// The inventory is unowned (no managed-by label, or a different
    /// value): adoption is permitted.
    Adoptable,
}

pub fn evaluate(labels: &BTreeMap<String, String>) -> AdoptionPolicy {
    match labels.get(MANAGED_BY_LABEL) {
        Some(value) if value == MANAGED_BY_VALUE => AdoptionPolicy::StrictMatch,
        _ => AdoptionPolicy::Adoptable,
    }
}

/// Labels to stamp on an inventory this client creates or adopts.
pub fn owned_labels(inventory_id: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_owned(), MANAGED_BY_VALUE.to_owned());
    labels.insert(crate::resource_group::INVENTORY_ID_LABEL.to_owned(), inventory_id.to_owned());
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unowned_inventory_is_adoptable() {
        assert_eq!(evaluate(&BTreeMap::new()), AdoptionPolicy::Adoptable);
    }

    #[test]
    fn inventory_owned_by_another_tool_is_adoptable() {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_owned(), "helm".to_owned());
        assert_eq!(evaluate(&labels), AdoptionPolicy::Adoptable);
    }

    #[test]
    fn inventory_owned_by_this_tool_is_strict_match() {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_owned(), MANAGED_BY_VALUE.to_owned());
        assert_eq!(evaluate(&labels), AdoptionPolicy::StrictMatch);
    }
}
