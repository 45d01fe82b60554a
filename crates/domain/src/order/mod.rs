//! Order record, snapshots and status machine.

mod record;
mod state;
mod value_objects;

pub use record::{Order, OrderDraft, StatusChange};
pub use state::{OrderStatus, PaymentMethod};
pub use value_objects::{CustomerSnapshot, OrderItemSnapshot};

use common::{Money, ProductId};
use thiserror::Error;

/// Errors raised by order arithmetic and status changes.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Quantity must be a positive integer.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A monetary input or result is negative.
    #[error("Invalid {field}: {amount} (must not be negative)")]
    NegativeAmount { field: &'static str, amount: Money },

    /// A line or order figure does not fit in the money range.
    #[error("Invalid {field}: amount out of range")]
    AmountOutOfRange { field: &'static str },

    /// Order has no items.
    #[error("No items provided")]
    NoItems,

    /// Status change not allowed by the state machine.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
