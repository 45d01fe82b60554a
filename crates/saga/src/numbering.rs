//! Order number assignment.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use store::OrderStore;

/// Hands out `ORD-{unix_millis}-{sequence:06}` numbers.
///
/// The sequence is a process-wide atomic counter, so two commits in the same
/// process never share a number. Processes sharing one store can still
/// collide; the coordinator retries on `DuplicateOrderNumber`.
#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    sequence: AtomicU64,
}

impl OrderNumberGenerator {
    /// Creates a generator whose first number uses `last + 1`.
    pub fn starting_after(last: u64) -> Self {
        Self {
            sequence: AtomicU64::new(last),
        }
    }

    /// Seeds the sequence from the number of stored orders.
    pub async fn seeded_from<S: OrderStore>(store: &S) -> store::Result<Self> {
        let count = store.count_orders().await?;
        tracing::debug!(count, "seeded order number sequence");
        Ok(Self::starting_after(count))
    }

    /// Returns a fresh order number.
    pub fn next_number(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ORD-{}-{sequence:06}", Utc::now().timestamp_millis())
    }
}
