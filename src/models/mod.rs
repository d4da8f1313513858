pub mod allergy;
pub mod cart;

pub use allergy::AllergyProfile;
pub use cart::{CartLine, CartSnapshot};
