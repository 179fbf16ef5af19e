//! Order and shop data, plus the embedded example invoice.
//!
//! Everything here is plain display data: amounts are supplied, never
//! derived, and nothing is validated beyond what deserialisation enforces.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InvoiceError;

/// A single customer order as it appears on the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_number: String,
    #[serde(default)]
    pub po_number: Option<String>,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    pub line_items: Vec<LineItem>,
    pub subtotal_price: f64,
    pub tax_price: f64,
    pub shipping_price: f64,
    pub total_price: f64,
    /// Amount actually paid. Usually equal to `total_price`, but supplied
    /// independently and never reconciled.
    pub net_payment: f64,
    #[serde(default)]
    pub discount_applications: Vec<DiscountApplication>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Postal address. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub name: String,
    pub address1: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: u32,
    pub title: String,
    pub original_price: f64,
    pub final_price: f64,
    #[serde(default)]
    pub discount_allocations: Vec<DiscountAllocation>,
}

/// Portion of a named discount applied to one line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountAllocation {
    pub title: String,
    pub amount: f64,
}

/// Order-level discount. Carried with the order but not printed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountApplication {
    pub title: String,
    pub value: f64,
}

/// Letterhead details of the selling shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Order {
    /// Parse an order from JSON using the same field names as [`Order`].
    pub fn from_json(json: &str) -> Result<Self, InvoiceError> {
        serde_json::from_str(json).map_err(|e| InvoiceError::InvalidInput(format!("order JSON: {e}")))
    }
}

impl LineItem {
    pub fn is_discounted(&self) -> bool {
        self.original_price != self.final_price
    }
}

impl Shop {
    pub fn from_json(json: &str) -> Result<Self, InvoiceError> {
        serde_json::from_str(json).map_err(|e| InvoiceError::InvalidInput(format!("shop JSON: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Embedded example
// ---------------------------------------------------------------------------

fn sydney_address(phone: Option<&str>) -> Address {
    Address {
        name: "John Doe".to_string(),
        address1: "123 Street Name".to_string(),
        city: "Sydney".to_string(),
        zip: "2000".to_string(),
        country: "Australia".to_string(),
        phone: phone.map(str::to_string),
    }
}

/// The example order `INV-1001`.
pub fn sample_order() -> Order {
    Order {
        order_number: "INV-1001".to_string(),
        po_number: Some("PO-7890".to_string()),
        created_at: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap_or_default(),
        billing_address: Some(sydney_address(None)),
        shipping_address: Some(sydney_address(Some("+61 400 123 456"))),
        line_items: vec![
            LineItem {
                quantity: 2,
                title: "Keyboard".to_string(),
                original_price: 50.0,
                final_price: 40.0,
                discount_allocations: vec![DiscountAllocation {
                    title: "10% Off".to_string(),
                    amount: 10.0,
                }],
            },
            LineItem {
                quantity: 1,
                title: "Mouse".to_string(),
                original_price: 30.0,
                final_price: 30.0,
                discount_allocations: Vec::new(),
            },
        ],
        subtotal_price: 110.0,
        tax_price: 5.0,
        shipping_price: 0.0,
        total_price: 115.0,
        net_payment: 115.0,
        discount_applications: Vec::new(),
        note: Some("Deliver ASAP.".to_string()),
    }
}

/// The example shop profile.
pub fn sample_shop() -> Shop {
    Shop {
        address: "BITSmart HQ, 456 Tech Park, Sydney, Australia".to_string(),
        phone: Some("+61 411 111 111".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_order_matches_example() {
        let order = sample_order();
        assert_eq!(order.order_number, "INV-1001");
        assert_eq!(order.line_items.len(), 2);
        assert_eq!(order.created_at.to_string(), "2025-07-01");
        assert!(order.line_items[0].is_discounted());
        assert!(!order.line_items[1].is_discounted());
    }

    #[test]
    fn order_from_json_with_missing_optionals() {
        let json = r#"{
            "order_number": "A-1",
            "created_at": "2024-01-31",
            "billing_address": { "name": "Jane" },
            "line_items": [
                { "quantity": 1, "title": "Cable", "original_price": 5, "final_price": 5 }
            ],
            "subtotal_price": 5,
            "tax_price": 0.5,
            "shipping_price": 0,
            "total_price": 5.5,
            "net_payment": 5.5
        }"#;
        let order = Order::from_json(json).unwrap();
        assert!(order.po_number.is_none());
        assert!(order.shipping_address.is_none());
        let billing = order.billing_address.unwrap();
        assert_eq!(billing.name, "Jane");
        assert_eq!(billing.city, "");
        assert!(order.line_items[0].discount_allocations.is_empty());
    }

    #[test]
    fn order_from_bad_json_is_invalid_input() {
        let err = Order::from_json("{ not json").unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidInput(_)));
    }

    #[test]
    fn shop_from_json() {
        let shop = Shop::from_json(r#"{ "address": "1 Main St" }"#).unwrap();
        assert_eq!(shop.address, "1 Main St");
        assert!(shop.phone.is_none());
    }
}
