//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// Opaque reference to the customer who placed an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Creates a customer ID from any string. Emptiness is checked by
    /// [`Order::create`](super::Order::create).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the customer ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CustomerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CustomerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Human-facing shipment code, e.g. `TRK-0000002S`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingNumber(String);

impl TrackingNumber {
    const PREFIX: &'static str = "TRK-";
    const MIN_DIGITS: usize = 8;
    const ALPHABET: &'static [u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    /// Renders a sequence value as `TRK-` followed by its base-36 digits,
    /// zero-padded to eight.
    ///
    /// Values past `36^8 - 1` grow a ninth digit rather than wrapping, so
    /// distinct sequences always give distinct codes.
    pub fn from_sequence(sequence: u64) -> Self {
        let mut value = sequence;
        let mut digits = Vec::with_capacity(Self::MIN_DIGITS);
        while value > 0 || digits.len() < Self::MIN_DIGITS {
            digits.push(Self::ALPHABET[(value % 36) as usize]);
            value /= 36;
        }

        let mut code = String::with_capacity(Self::PREFIX.len() + digits.len());
        code.push_str(Self::PREFIX);
        code.extend(digits.iter().rev().map(|&b| b as char));
        Self(code)
    }

    /// Wraps an existing tracking number, e.g. one supplied by a caller for lookup.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the tracking number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A geographic point along the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Creates a new location.
    pub fn new(
        address: impl Into<String>,
        city: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            address: address.into(),
            city: city.into(),
            latitude,
            longitude,
        }
    }
}

/// A line item in an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Caller-supplied item identifier.
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub quantity: u32,

    /// Weight of a single unit, in kilograms.
    pub weight: f64,

    /// Price of a single unit.
    pub price: f64,
}

impl OrderItem {
    /// Creates a new order item with an empty description.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        weight: f64,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            quantity,
            weight,
            price,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Total weight of the line (weight x quantity).
    pub fn total_weight(&self) -> f64 {
        self.weight * f64::from(self.quantity)
    }

    /// Total price of the line (price x quantity).
    pub fn total_price(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_id_blank() {
        assert!(CustomerId::new("").is_blank());
        assert!(CustomerId::new("   ").is_blank());
        assert!(!CustomerId::new("C1").is_blank());
    }

    #[test]
    fn test_tracking_number_format() {
        assert_eq!(TrackingNumber::from_sequence(0).as_str(), "TRK-00000000");
        assert_eq!(TrackingNumber::from_sequence(1).as_str(), "TRK-00000001");
        assert_eq!(TrackingNumber::from_sequence(35).as_str(), "TRK-0000000Z");
        assert_eq!(TrackingNumber::from_sequence(36).as_str(), "TRK-00000010");
        assert_eq!(TrackingNumber::from_sequence(100).as_str(), "TRK-0000002S");
    }

    #[test]
    fn test_tracking_number_widens_past_eight_digits() {
        let max = 36u64.pow(8) - 1;
        assert_eq!(TrackingNumber::from_sequence(max).as_str(), "TRK-ZZZZZZZZ");
        assert_eq!(TrackingNumber::from_sequence(max + 1).as_str(), "TRK-100000000");
        assert_ne!(
            TrackingNumber::from_sequence(max + 1),
            TrackingNumber::from_sequence(0)
        );
        assert_eq!(TrackingNumber::from_sequence(u64::MAX).as_str(), "TRK-3W5E11264SGSF");
    }

    #[test]
    fn test_distinct_sequences_give_distinct_codes() {
        let codes: std::collections::HashSet<_> = (1..=1000)
            .map(|n| TrackingNumber::from_sequence(n).to_string())
            .collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_order_item_totals() {
        let item = OrderItem::new("SKU-1", "Box", 3, 1.5, 10.0).with_description("fragile");
        assert_eq!(item.total_weight(), 4.5);
        assert_eq!(item.total_price(), 30.0);
        assert_eq!(item.description, "fragile");
    }

    #[test]
    fn test_order_item_description_defaults_when_missing() {
        let item: OrderItem = serde_json::from_value(serde_json::json!({
            "id": "SKU-1",
            "name": "Box",
            "quantity": 2,
            "weight": 1.0,
            "price": 5.0
        }))
        .unwrap();
        assert_eq!(item.description, "");
        assert_eq!(item.quantity, 2);
    }
}
