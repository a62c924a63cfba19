//! Inventory data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::id::{ItemId, OwnerId};

/// Validation failure for user-supplied item fields.
///
/// Local-only: a payload that fails validation never reaches the store.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidItem(pub String);

impl From<InvalidItem> for ErrorKind {
    fn from(err: InvalidItem) -> Self {
        ErrorKind::InvalidInput(err.0)
    }
}

/// A reconciled inventory item as delivered by the store.
///
/// Invariant: `quantity >= 1`. An item whose quantity would reach 0 is
/// deleted, never persisted at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub owner_id: OwnerId,
    pub name: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// Validated payload for creating an item.
///
/// The store assigns `id` and `created_at`; the caller supplies name and
/// quantity only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    name: String,
    quantity: i64,
}

impl NewItem {
    /// Validate and build a create payload.
    ///
    /// The name must be non-empty after trimming and the quantity at least 1.
    pub fn new(name: &str, quantity: i64) -> Result<Self, InvalidItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InvalidItem("item name cannot be empty".to_string()));
        }
        if quantity < 1 {
            return Err(InvalidItem(format!(
                "quantity must be at least 1, got {quantity}"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            quantity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }
}

/// Partial update payload (merge semantics).
///
/// Only quantity is mutable after creation; `id`, `owner_id`, `name` and
/// `created_at` are fixed at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

impl ItemPatch {
    pub fn quantity(quantity: i64) -> Self {
        Self {
            quantity: Some(quantity),
        }
    }

    /// Apply the patch to an existing item (server-side merge).
    pub fn apply(&self, item: &mut InventoryItem) {
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
    }
}

/// Display-only enrichment row from the per-owner `apiResults` collection.
///
/// Produced by an upstream classification batch process; joined to
/// `InventoryItem` by `id`. Never affects inventory invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult {
    pub id: ItemId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_trims_and_keeps_name() {
        let item = NewItem::new("  Apples ", 3).unwrap();
        assert_eq!(item.name(), "Apples");
        assert_eq!(item.quantity(), 3);
    }

    #[test]
    fn empty_name_is_invalid_input() {
        let err = NewItem::new("   ", 1).unwrap_err();
        assert!(err.0.contains("empty"));
        assert!(matches!(ErrorKind::from(err), ErrorKind::InvalidInput(_)));
    }

    #[test]
    fn zero_quantity_is_invalid_input() {
        let err = NewItem::new("Apples", 0).unwrap_err();
        assert!(err.0.contains("at least 1"));
    }

    #[test]
    fn patch_merges_quantity_only() {
        let mut item = InventoryItem {
            id: ItemId::new(),
            owner_id: OwnerId::new(),
            name: "Apples".to_string(),
            quantity: 3,
            created_at: Utc::now(),
        };
        ItemPatch::quantity(4).apply(&mut item);
        assert_eq!(item.quantity, 4);
        assert_eq!(item.name, "Apples");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any non-blank name with quantity >= 1 validates, and
            /// validation never changes the quantity.
            #[test]
            fn valid_inputs_always_construct(
                name in "[A-Za-z][A-Za-z0-9 ]{0,60}",
                quantity in 1i64..10_000
            ) {
                let item = NewItem::new(&name, quantity).unwrap();
                prop_assert_eq!(item.quantity(), quantity);
                prop_assert!(!item.name().is_empty());
            }

            /// Property: quantities below 1 never validate.
            #[test]
            fn non_positive_quantities_never_construct(quantity in i64::MIN..1) {
                prop_assert!(NewItem::new("Apples", quantity).is_err());
            }
        }
    }
}
