use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::assessment::reference::AllergenKnowledgeBase;
use crate::models::AllergyProfile;

use super::{CartItem, CartStore, ProductCatalog, ProfileStore, StoreError};

fn customer_key(customer: &str) -> Result<String, StoreError> {
    let key = customer.trim().to_lowercase();
    if key.is_empty() {
        return Err(StoreError::MissingCustomer);
    }
    Ok(key)
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// In-memory allergy profiles backed by RwLock, keyed by customer identity
/// (case-insensitive).
pub struct InMemoryProfileStore {
    reference: Arc<AllergenKnowledgeBase>,
    profiles: RwLock<HashMap<String, AllergyProfile>>,
}

impl InMemoryProfileStore {
    pub fn new(reference: Arc<AllergenKnowledgeBase>) -> Self {
        Self {
            reference,
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// Add an allergy to a customer's profile, creating it if needed.
    /// Returns true if the profile changed.
    pub fn add_allergy(&self, customer: &str, allergy: &str) -> Result<bool, StoreError> {
        let key = customer_key(customer)?;
        let mut profiles = self.profiles.write().map_err(|_| StoreError::LockFailed)?;
        let added = profiles.entry(key).or_default().add(allergy, &self.reference);
        if added {
            tracing::debug!(customer, allergy, "Allergy added");
        }
        Ok(added)
    }

    /// Remove an allergy however it is phrased. Returns true if it was present.
    pub fn remove_allergy(&self, customer: &str, allergy: &str) -> Result<bool, StoreError> {
        let key = customer_key(customer)?;
        let mut profiles = self.profiles.write().map_err(|_| StoreError::LockFailed)?;
        let removed = profiles
            .get_mut(&key)
            .is_some_and(|profile| profile.remove(allergy, &self.reference));
        if removed {
            tracing::debug!(customer, allergy, "Allergy removed");
        }
        Ok(removed)
    }

    /// Replace a customer's profile outright.
    pub fn set_profile(&self, customer: &str, profile: AllergyProfile) -> Result<(), StoreError> {
        let key = customer_key(customer)?;
        let mut profiles = self.profiles.write().map_err(|_| StoreError::LockFailed)?;
        profiles.insert(key, profile.canonicalized(&self.reference));
        Ok(())
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn allergy_profile(&self, customer: &str) -> Result<AllergyProfile, StoreError> {
        let key = customer_key(customer)?;
        let profiles = self.profiles.read().map_err(|_| StoreError::LockFailed)?;
        Ok(profiles.get(&key).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Carts
// ---------------------------------------------------------------------------

/// In-memory carts backed by RwLock. Items keep insertion order.
#[derive(Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<String, Vec<CartItem>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product to a cart. Adding a product already in the cart
    /// increases its quantity.
    pub fn add_item(
        &self,
        customer: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<(), StoreError> {
        if quantity == 0 {
            return Err(StoreError::InvalidQuantity(product_id.to_string()));
        }
        let key = customer_key(customer)?;
        let mut carts = self.carts.write().map_err(|_| StoreError::LockFailed)?;
        let items = carts.entry(key).or_default();

        match items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => items.push(CartItem {
                product_id: product_id.to_string(),
                quantity,
            }),
        }
        Ok(())
    }

    /// Remove a product from a cart. Returns true if it was there.
    pub fn remove_item(&self, customer: &str, product_id: &str) -> Result<bool, StoreError> {
        let key = customer_key(customer)?;
        let mut carts = self.carts.write().map_err(|_| StoreError::LockFailed)?;
        let Some(items) = carts.get_mut(&key) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|item| item.product_id != product_id);
        Ok(items.len() != before)
    }

    pub fn clear(&self, customer: &str) -> Result<(), StoreError> {
        let key = customer_key(customer)?;
        let mut carts = self.carts.write().map_err(|_| StoreError::LockFailed)?;
        carts.remove(&key);
        Ok(())
    }
}

impl CartStore for InMemoryCartStore {
    fn cart_items(&self, customer: &str) -> Result<Vec<CartItem>, StoreError> {
        let key = customer_key(customer)?;
        let carts = self.carts.read().map_err(|_| StoreError::LockFailed)?;
        Ok(carts.get(&key).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// In-memory product catalog: product id to ingredient list.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(
        &self,
        product_id: &str,
        ingredients: Vec<String>,
    ) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(|_| StoreError::LockFailed)?;
        products.insert(product_id.to_string(), ingredients);
        Ok(())
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn ingredients(&self, product_id: &str) -> Result<Option<Vec<String>>, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::LockFailed)?;
        Ok(products.get(product_id).cloned())
    }
}
