//! Catalog seeding for the in-memory store.

use std::path::Path;

use domain::{Customer, Product};
use serde::Deserialize;
use store::InMemoryStore;
use thiserror::Error;

/// Errors raised while loading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Products and customers to load at start-up.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

impl SeedData {
    /// Reads a seed file.
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
            path: display,
            source,
        })
    }

    /// Inserts every record into the store.
    pub async fn apply(self, store: &InMemoryStore) {
        let (products, customers) = (self.products.len(), self.customers.len());
        for product in self.products {
            store.insert_product(product).await;
        }
        for customer in self.customers {
            store.insert_customer(customer).await;
        }
        tracing::info!(products, customers, "catalog seeded");
    }
}
