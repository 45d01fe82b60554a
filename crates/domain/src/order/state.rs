//! Order status machine and payment labels.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of a committed order.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed ──► Cancelled
///           └──────────────────► Cancelled
/// ```
///
/// Orders committed by this core start in `Completed`; `Pending` exists for
/// records produced elsewhere. Stock is returned only on entering `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,

    #[default]
    Completed,

    /// Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if moving from `self` to `to` is a legal state change.
    ///
    /// Requesting the current status is not a transition; callers treat it
    /// as a no-op before consulting this.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        matches!(
            (self, to),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Completed, OrderStatus::Cancelled)
        )
    }

    /// Returns true if entering `to` from `self` must return reserved stock.
    pub fn restocks_on(&self, to: OrderStatus) -> bool {
        to == OrderStatus::Cancelled && *self != OrderStatus::Cancelled
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other:?}")),
        }
    }
}

/// How the customer paid. A label only; no payment is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(format!("unknown payment method: {other:?}")),
        }
    }
}
