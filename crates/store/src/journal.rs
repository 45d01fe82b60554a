//! Journal events for commit and cancellation intents.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// What an intent is doing to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Reserving stock for a new order.
    Commit,
    /// Returning stock for a cancelled order.
    Cancel,
}

/// How an intent finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentOutcome {
    /// The order was persisted; reservations stand.
    Committed,
    /// Every reservation was released.
    Compensated,
    /// Cancellation stock was returned.
    Released,
    /// Nothing was changed.
    Abandoned,
}

impl IntentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentOutcome::Committed => "committed",
            IntentOutcome::Compensated => "compensated",
            IntentOutcome::Released => "released",
            IntentOutcome::Abandoned => "abandoned",
        }
    }
}

/// One stock movement planned by an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A single journal entry. Line numbers index into `Opened::lines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEvent {
    Opened {
        kind: IntentKind,
        order_id: Option<OrderId>,
        lines: Vec<JournalLine>,
        opened_at: DateTime<Utc>,
    },
    /// The order the intent will persist under `order_number`.
    NumberAssigned {
        order_number: String,
        order_id: OrderId,
    },
    LineReserved {
        line: usize,
    },
    /// The conditional status write to `cancelled` succeeded.
    StatusCancelled,
    LineReleased {
        line: usize,
    },
    Closed {
        outcome: IntentOutcome,
        closed_at: DateTime<Utc>,
    },
}

impl JournalEvent {
    pub fn opened(kind: IntentKind, order_id: Option<OrderId>, lines: Vec<JournalLine>) -> Self {
        JournalEvent::Opened {
            kind,
            order_id,
            lines,
            opened_at: Utc::now(),
        }
    }

    pub fn closed(outcome: IntentOutcome) -> Self {
        JournalEvent::Closed {
            outcome,
            closed_at: Utc::now(),
        }
    }

    /// Stable type name, stored alongside the payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            JournalEvent::Opened { .. } => "opened",
            JournalEvent::NumberAssigned { .. } => "number_assigned",
            JournalEvent::LineReserved { .. } => "line_reserved",
            JournalEvent::StatusCancelled => "status_cancelled",
            JournalEvent::LineReleased { .. } => "line_released",
            JournalEvent::Closed { .. } => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, JournalEvent::Closed { .. })
    }
}
