//! Catalog records owned by the product catalog collaborator.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, ProductId};
use serde::{Deserialize, Serialize};

fn default_low_stock_threshold() -> i64 {
    5
}

fn default_true() -> bool {
    true
}

/// A sellable product. `stock` is the only field the order core writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub cost_price: Money,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product with the default low-stock threshold.
    pub fn new(
        name: impl Into<String>,
        price: Money,
        cost_price: Money,
        category: impl Into<String>,
        stock: i64,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            cost_price,
            category: category.into(),
            barcode: None,
            stock,
            low_stock_threshold: default_low_stock_threshold(),
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }
}

/// A stored customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub nic: Option<String>,
    #[serde(default)]
    pub is_vat: bool,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            name: name.into(),
            address: None,
            phone_number: None,
            nic: None,
            is_vat: false,
        }
    }
}
