//! Collaborators the assessment flow reads from: allergy profiles, carts,
//! and the product catalog that supplies ingredient lists.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AllergyProfile;

pub use memory::{InMemoryCartStore, InMemoryCatalog, InMemoryProfileStore};

/// A product in a customer's cart, before ingredients are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Customer identity must not be empty")]
    MissingCustomer,

    #[error("Quantity for product {0} must be positive")]
    InvalidQuantity(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Lock acquisition failed")]
    LockFailed,
}

/// Read access to customers' allergy profiles.
pub trait ProfileStore: Send + Sync {
    /// A customer without a stored profile has an empty one.
    fn allergy_profile(&self, customer: &str) -> Result<AllergyProfile, StoreError>;
}

/// Read access to customers' carts.
pub trait CartStore: Send + Sync {
    /// A customer without a cart has no items.
    fn cart_items(&self, customer: &str) -> Result<Vec<CartItem>, StoreError>;
}

/// Ingredient lookup by product.
pub trait ProductCatalog: Send + Sync {
    /// `None` when the catalog has no ingredient data for the product.
    fn ingredients(&self, product_id: &str) -> Result<Option<Vec<String>>, StoreError>;
}
