//! Commit and status-change error types.

use common::{CustomerId, IdParseError, OrderId, ProductId};
use domain::{OrderError, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by order commit, cancellation and recovery.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The request carries no user id.
    #[error("User not authenticated")]
    Unauthenticated,

    /// A cart line is unusable, e.g. a non-positive quantity.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Product is not available for sale: {name}")]
    ProductInactive { product_id: ProductId, name: String },

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// A reservation's conditional write matched nothing.
    #[error(
        "Insufficient stock for {product_name}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: i64,
    },

    /// Order number collisions outlasted the retry budget.
    #[error("Order number already exists: {0}")]
    DuplicateOrderNumber(String),

    #[error("{0}")]
    InvalidId(#[from] IdParseError),

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CommitError {
    /// Short label used for metrics and error codes.
    pub fn reason(&self) -> &'static str {
        match self {
            CommitError::Validation(_) => "validation",
            CommitError::Unauthenticated => "unauthenticated",
            CommitError::InvalidItem(_) => "invalid_item",
            CommitError::ProductNotFound(_) => "product_not_found",
            CommitError::ProductInactive { .. } => "product_inactive",
            CommitError::CustomerNotFound(_) => "customer_not_found",
            CommitError::InsufficientStock { .. } => "insufficient_stock",
            CommitError::DuplicateOrderNumber(_) => "duplicate_order_number",
            CommitError::InvalidId(_) => "invalid_id",
            CommitError::InvalidTransition { .. } => "invalid_transition",
            CommitError::OrderNotFound(_) => "order_not_found",
            CommitError::Store(_) => "store",
        }
    }
}

impl From<OrderError> for CommitError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidQuantity { .. } => CommitError::InvalidItem(err.to_string()),
            OrderError::NegativeAmount { .. }
            | OrderError::AmountOutOfRange { .. }
            | OrderError::NoItems => {
                CommitError::Validation(err.to_string())
            }
            OrderError::InvalidTransition { from, to } => {
                CommitError::InvalidTransition { from, to }
            }
        }
    }
}

/// Convenience type alias for commit results.
pub type Result<T> = std::result::Result<T, CommitError>;
