//! Cart view with allergy information, assembled from the stores.

use std::sync::Arc;

use serde::Serialize;

use crate::advisory::AdvisoryAugmenter;
use crate::assessment::engine::DefaultAssessmentEngine;
use crate::assessment::types::{AllergyAssessment, AssessmentEngine, AssessmentOutcome};
use crate::models::{AllergyProfile, CartLine, CartSnapshot};
use crate::store::{CartStore, ProductCatalog, ProfileStore, StoreError};

/// A customer's cart as shown to them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Present only when the customer has declared allergies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergy_info: Option<AllergyAssessment>,
}

/// Joins carts with catalog ingredients and assesses them against the
/// customer's allergy profile.
pub struct CartAssessmentService {
    engine: Arc<DefaultAssessmentEngine>,
    profiles: Arc<dyn ProfileStore>,
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    advisory: Option<AdvisoryAugmenter>,
}

impl CartAssessmentService {
    pub fn new(
        engine: Arc<DefaultAssessmentEngine>,
        profiles: Arc<dyn ProfileStore>,
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            engine,
            profiles,
            carts,
            catalog,
            advisory: None,
        }
    }

    pub fn with_advisory(mut self, advisory: AdvisoryAugmenter) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Current cart with ingredients attached. Products the catalog has no
    /// data for, or fails to answer for, are kept with no ingredients.
    pub fn cart_snapshot(&self, customer: &str) -> Result<CartSnapshot, StoreError> {
        let items = self.carts.cart_items(customer)?;

        let lines = items
            .into_iter()
            .map(|item| {
                let ingredients = match self.catalog.ingredients(&item.product_id) {
                    Ok(Some(ingredients)) => ingredients,
                    Ok(None) => {
                        tracing::debug!(product_id = %item.product_id, "No ingredient data for product");
                        Vec::new()
                    }
                    Err(e) => {
                        tracing::warn!(
                            product_id = %item.product_id,
                            error = %e,
                            "Catalog lookup failed, treating product as missing ingredient data"
                        );
                        Vec::new()
                    }
                };
                CartLine::new(item.product_id, item.quantity, ingredients)
            })
            .collect();

        Ok(CartSnapshot::new(lines))
    }

    /// Assess a profile and cart, with the advisory model when configured.
    pub fn assess(&self, profile: &AllergyProfile, cart: &CartSnapshot) -> AssessmentOutcome {
        let outcome = self.engine.assess_cart_detailed(profile, cart);
        match &self.advisory {
            Some(advisory) => advisory.augment(&self.engine, profile, cart, outcome),
            None => outcome,
        }
    }

    /// The customer's cart, with allergy information when they have allergies.
    pub fn cart_view(&self, customer: &str) -> Result<CartView, StoreError> {
        let cart = self.cart_snapshot(customer)?;
        let profile = self.profiles.allergy_profile(customer)?;

        let allergy_info = if profile.is_empty() {
            None
        } else {
            Some(self.assess(&profile, &cart).assessment)
        };

        Ok(CartView {
            items: cart.lines,
            allergy_info,
        })
    }
}
