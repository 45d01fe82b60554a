//! Order status changes and cancellation restock.

use chrono::Utc;
use common::OrderId;
use domain::{Order, OrderStatus};
use store::{Backend, IntentKind, IntentOutcome, JournalEvent, JournalLine};

use crate::error::{CommitError, Result};
use crate::intent::{JournaledIntent, UnjournaledRelease};

/// Applies status changes to committed orders.
///
/// Every change is a conditional write on the current status, so of two
/// concurrent cancellations only one wins, and only the winner returns
/// stock. The loser re-reads the order and sees a no-op.
pub struct StatusTransition<S> {
    store: S,
}

impl<S: Backend> StatusTransition<S> {
    /// Creates a status transition service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cancels an order, returning its stock exactly once.
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order> {
        self.change_status(order_id, OrderStatus::Cancelled).await
    }

    /// Moves an order to `to`.
    ///
    /// Requesting the current status returns the order unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(&self, order_id: OrderId, to: OrderStatus) -> Result<Order> {
        loop {
            let order = self
                .store
                .get_order(order_id)
                .await?
                .ok_or(CommitError::OrderNotFound(order_id))?;

            let from = order.status();
            if from == to {
                tracing::debug!(status = %from, "status unchanged");
                return Ok(order);
            }
            if !from.can_transition_to(to) {
                return Err(CommitError::InvalidTransition { from, to });
            }

            let updated = if from.restocks_on(to) {
                self.cancel_and_restock(&order).await?
            } else {
                self.store
                    .transition_status(order_id, from, to, Utc::now())
                    .await?
            };

            match updated {
                Some(order) => {
                    tracing::info!(
                        order_number = order.order_number(),
                        from = %from,
                        to = %to,
                        "order status changed"
                    );
                    return Ok(order);
                }
                None => tracing::debug!(from = %from, "status changed concurrently, re-reading"),
            }
        }
    }

    async fn cancel_and_restock(&self, order: &Order) -> Result<Option<Order>> {
        let lines: Vec<JournalLine> = order
            .quantities()
            .map(|(product_id, quantity)| JournalLine {
                product_id,
                quantity,
            })
            .collect();
        let mut intent =
            JournaledIntent::open(&self.store, IntentKind::Cancel, Some(order.id()), lines)
                .await?;

        let updated = self
            .store
            .transition_status(order.id(), order.status(), OrderStatus::Cancelled, Utc::now())
            .await?;
        let Some(updated) = updated else {
            intent.close(IntentOutcome::Abandoned).await?;
            return Ok(None);
        };

        // The status write is already done, so the stock goes back even if
        // the journal is down. Without a journaled status write recovery
        // abandons this intent, so unjournaled releases cannot repeat.
        let policy = match intent.record(JournalEvent::StatusCancelled).await {
            Ok(()) => UnjournaledRelease::Stop,
            Err(e) => {
                tracing::warn!(
                    intent_id = %intent.state().id(),
                    order_number = updated.order_number(),
                    error = %e,
                    "could not journal cancellation, restocking anyway"
                );
                intent.note(JournalEvent::StatusCancelled);
                UnjournaledRelease::Continue
            }
        };
        if intent.release_pending(policy).await {
            if let Err(e) = intent.close(IntentOutcome::Released).await {
                tracing::warn!(intent_id = %intent.state().id(), error = %e, "could not close intent");
            }
        } else {
            tracing::error!(
                intent_id = %intent.state().id(),
                order_number = updated.order_number(),
                "restock incomplete, intent left open for recovery"
            );
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        Ok(Some(updated))
    }
}
