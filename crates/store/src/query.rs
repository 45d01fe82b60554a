use chrono::{DateTime, Utc};
use domain::{Order, OrderStatus, PaymentMethod};

/// Filter for listing orders.
///
/// Every criterion is optional; date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderQuery {
    /// Orders created at or after this instant.
    pub from: Option<DateTime<Utc>>,

    /// Orders created at or before this instant.
    pub to: Option<DateTime<Utc>>,

    pub status: Option<OrderStatus>,

    pub payment_method: Option<PaymentMethod>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,
}

impl OrderQuery {
    /// Creates a query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the order satisfies every filter (ignores `limit`).
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(from) = self.from
            && order.created_at() < from
        {
            return false;
        }
        if let Some(to) = self.to
            && order.created_at() > to
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status() != status
        {
            return false;
        }
        if let Some(method) = self.payment_method
            && order.payment_method() != method
        {
            return false;
        }
        true
    }
}
