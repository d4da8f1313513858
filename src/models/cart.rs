use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::allergy::json_kind;

/// One product line of a cart, with the product's ingredient text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: u32, ingredients: Vec<String>) -> Self {
        Self {
            product_id: product_id.into(),
            quantity: quantity.max(1),
            ingredients,
        }
    }

    /// Whether any ingredient carries text. Lines without it are
    /// "insufficient data", never "no risk".
    pub fn has_ingredient_data(&self) -> bool {
        self.ingredients.iter().any(|i| !i.trim().is_empty())
    }
}

/// The cart as supplied for a single assessment call. Never mutated by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Lenient intake from loosely-typed input.
    ///
    /// Accepts a list of lines or an object with an `items` list. Lines that
    /// are not objects are dropped. A malformed `ingredients` field is
    /// dropped and the line kept as insufficient data; non-string
    /// ingredients are dropped individually.
    pub fn from_json_value(value: &Value) -> Self {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("items") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => return Self::default(),
                Some(other) => {
                    tracing::warn!(kind = json_kind(other), "Cart items is not a sequence, dropped");
                    return Self::default();
                }
            },
            Value::Null => return Self::default(),
            other => {
                tracing::warn!(kind = json_kind(other), "Cart is malformed, dropped");
                return Self::default();
            }
        };

        let lines = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Value::Object(map) => Some(line_from_map(index, map)),
                other => {
                    tracing::warn!(index, kind = json_kind(other), "Cart line is not an object, dropped");
                    None
                }
            })
            .collect();

        Self { lines }
    }
}

fn line_from_map(index: usize, map: &Map<String, Value>) -> CartLine {
    let product_id = match map.get("productId").or_else(|| map.get("product_id")) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        Some(other) => {
            tracing::warn!(index, kind = json_kind(other), "Cart line product id malformed, dropped");
            String::new()
        }
        None => String::new(),
    };

    let quantity = match map.get("quantity") {
        None | Some(Value::Null) => 1,
        Some(value) => match value.as_u64().filter(|q| *q > 0) {
            Some(q) => u32::try_from(q).unwrap_or(u32::MAX),
            None => {
                tracing::warn!(index, product_id = %product_id, "Cart line quantity malformed, using 1");
                1
            }
        },
    };

    let ingredients = match map.get("ingredients") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(text) => Some(text.clone()),
                other => {
                    tracing::warn!(
                        index,
                        product_id = %product_id,
                        kind = json_kind(other),
                        "Non-string ingredient dropped"
                    );
                    None
                }
            })
            .collect(),
        Some(other) => {
            tracing::warn!(
                index,
                product_id = %product_id,
                kind = json_kind(other),
                "Ingredients field is not a sequence, line kept without ingredient data"
            );
            Vec::new()
        }
    };

    CartLine {
        product_id,
        quantity,
        ingredients,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn line_quantity_is_at_least_one() {
        assert_eq!(CartLine::new("p1", 0, vec![]).quantity, 1);
        assert_eq!(CartLine::new("p1", 3, vec![]).quantity, 3);
    }

    #[test]
    fn ingredient_data_detection() {
        assert!(!CartLine::new("p", 1, vec![]).has_ingredient_data());
        assert!(!CartLine::new("p", 1, vec!["  ".into()]).has_ingredient_data());
        assert!(CartLine::new("p", 1, vec!["sugar".into()]).has_ingredient_data());
    }

    #[test]
    fn intake_well_formed_cart() {
        let cart = CartSnapshot::from_json_value(&json!([
            {"productId": "sq-1", "quantity": 2, "ingredients": ["milk", "sugar"]},
            {"productId": "sq-2", "quantity": 1, "ingredients": []}
        ]));
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.lines[0].product_id, "sq-1");
        assert_eq!(cart.lines[0].quantity, 2);
        assert_eq!(cart.lines[0].ingredients, vec!["milk", "sugar"]);
        assert!(cart.lines[1].ingredients.is_empty());
    }

    #[test]
    fn intake_accepts_stored_cart_document() {
        let cart = CartSnapshot::from_json_value(&json!({
            "user": "a@b.c",
            "items": [{"product_id": "sq-9", "quantity": 4}]
        }));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines[0].product_id, "sq-9");
        assert_eq!(cart.lines[0].quantity, 4);
    }

    #[test]
    fn intake_drops_non_object_lines() {
        let cart = CartSnapshot::from_json_value(&json!([
            "garbage",
            42,
            {"productId": "ok", "ingredients": ["egg"]}
        ]));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines[0].product_id, "ok");
        assert_eq!(cart.lines[0].quantity, 1);
    }

    #[test]
    fn intake_malformed_ingredients_keeps_line() {
        let cart = CartSnapshot::from_json_value(&json!([
            {"productId": "a", "ingredients": "milk, sugar"},
            {"productId": "b", "ingredients": ["milk", 7, null, "sugar"]}
        ]));
        assert_eq!(cart.len(), 2);
        assert!(cart.lines[0].ingredients.is_empty());
        assert_eq!(cart.lines[1].ingredients, vec!["milk", "sugar"]);
    }

    #[test]
    fn intake_bad_quantity_defaults_to_one() {
        let cart = CartSnapshot::from_json_value(&json!([
            {"productId": "a", "quantity": -3},
            {"productId": "b", "quantity": "two"},
            {"productId": 17, "quantity": 0}
        ]));
        assert!(cart.lines.iter().all(|l| l.quantity == 1));
        assert_eq!(cart.lines[2].product_id, "17");
    }

    #[test]
    fn intake_non_sequence_is_empty() {
        assert!(CartSnapshot::from_json_value(&json!("cart")).is_empty());
        assert!(CartSnapshot::from_json_value(&json!({"items": 3})).is_empty());
        assert!(CartSnapshot::from_json_value(&Value::Null).is_empty());
    }

    #[test]
    fn serde_uses_camel_case() {
        let line = CartLine::new("sq-1", 1, vec!["egg".into()]);
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["productId"], "sq-1");
        let back: CartLine = serde_json::from_value(json!({"productId": "x", "quantity": 1})).unwrap();
        assert!(back.ingredients.is_empty());
    }
}
