//! Immutable snapshots embedded in an order.

use common::{CustomerId, Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::catalog::Customer;

/// A priced order line, copied from the product at commit time.
///
/// Later edits to the product never reach an existing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemSnapshot {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_category: String,
    pub product_barcode: String,
    pub quantity: u32,
    pub selling_price: Money,
    pub cost_price: Money,
    /// `quantity * selling_price`
    pub item_total: Money,
    /// `quantity * cost_price`
    pub item_cost: Money,
    /// `item_total - item_cost`
    pub item_profit: Money,
}

/// Denormalized customer details stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    /// Set only when the snapshot was taken from a stored customer.
    pub customer_id: Option<CustomerId>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub nic: String,
    #[serde(default)]
    pub is_vat: bool,
}

impl CustomerSnapshot {
    /// Copies a stored customer.
    pub fn from_customer(customer: &Customer) -> Self {
        Self {
            customer_id: Some(customer.id),
            name: customer.name.clone(),
            address: customer.address.clone().unwrap_or_default(),
            phone_number: customer.phone_number.clone().unwrap_or_default(),
            nic: customer.nic.clone().unwrap_or_default(),
            is_vat: customer.is_vat,
        }
    }

    /// Builds a snapshot from inline customer fields. Returns `None` when the
    /// trimmed name is empty.
    pub fn inline(
        name: &str,
        address: Option<&str>,
        phone_number: Option<&str>,
        nic: Option<&str>,
        is_vat: bool,
    ) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let clean = |v: Option<&str>| v.map(str::trim).unwrap_or_default().to_string();
        Some(Self {
            customer_id: None,
            name: name.to_string(),
            address: clean(address),
            phone_number: clean(phone_number),
            nic: clean(nic),
            is_vat,
        })
    }

    /// Builds a minimal snapshot from the legacy bare name/contact fields.
    pub fn legacy(name: &str, contact: Option<&str>) -> Option<Self> {
        Self::inline(name, None, contact, None, false)
    }
}
