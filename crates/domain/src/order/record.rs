//! The committed order record.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

use super::{CustomerSnapshot, OrderError, OrderItemSnapshot, OrderStatus, PaymentMethod};
use crate::pricing::OrderFinancials;

/// A priced, validated cart that has not been committed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub items: Vec<OrderItemSnapshot>,
    pub financials: OrderFinancials,
    pub payment_method: PaymentMethod,
    pub customer: Option<CustomerSnapshot>,
    pub created_by: String,
}

impl OrderDraft {
    /// `(product, quantity)` pairs in cart order.
    pub fn quantities(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.items.iter().map(|i| (i.product_id, i.quantity))
    }
}

/// Outcome of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The order already had the requested status.
    Unchanged,
    Changed {
        from: OrderStatus,
        to: OrderStatus,
    },
}

/// A committed order.
///
/// Items and financial figures are fixed at creation. Only `status` and
/// `updated_at` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    order_number: String,
    items: Vec<OrderItemSnapshot>,
    #[serde(flatten)]
    financials: OrderFinancials,
    payment_method: PaymentMethod,
    status: OrderStatus,
    customer: Option<CustomerSnapshot>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Freezes a draft into a completed order with the given id.
    pub fn from_draft(
        id: OrderId,
        draft: OrderDraft,
        order_number: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number: order_number.into(),
            items: draft.items,
            financials: draft.financials,
            payment_method: draft.payment_method,
            status: OrderStatus::Completed,
            customer: draft.customer,
            created_by: draft.created_by,
            created_at: at,
            updated_at: at,
        }
    }

    /// Applies a status change through the state machine.
    pub fn transition(
        &mut self,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, OrderError> {
        let from = self.status;
        if from == to {
            return Ok(StatusChange::Unchanged);
        }
        if !from.can_transition_to(to) {
            return Err(OrderError::InvalidTransition { from, to });
        }
        self.status = to;
        self.updated_at = at;
        Ok(StatusChange::Changed { from, to })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn items(&self) -> &[OrderItemSnapshot] {
        &self.items
    }

    /// `(product, quantity)` pairs in the order the lines were committed.
    pub fn quantities(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.items.iter().map(|i| (i.product_id, i.quantity))
    }

    pub fn financials(&self) -> &OrderFinancials {
        &self.financials
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn customer(&self) -> Option<&CustomerSnapshot> {
        self.customer.as_ref()
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
