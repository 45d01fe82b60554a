//! Start-up replay of intents a crash left open.

use store::{Backend, IntentKind, IntentOutcome};

use crate::error::Result;
use crate::intent::{IntentRecord, JournaledIntent, UnjournaledRelease};

/// What a recovery pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub committed: usize,
    pub compensated: usize,
    pub released: usize,
    pub abandoned: usize,
    /// Intents that still could not be settled and stay open.
    pub unsettled: usize,
}

impl RecoveryReport {
    pub fn total(&self) -> usize {
        self.committed + self.compensated + self.released + self.abandoned + self.unsettled
    }

    fn count(&mut self, outcome: IntentOutcome) {
        match outcome {
            IntentOutcome::Committed => self.committed += 1,
            IntentOutcome::Compensated => self.compensated += 1,
            IntentOutcome::Released => self.released += 1,
            IntentOutcome::Abandoned => self.abandoned += 1,
        }
    }
}

/// Finishes or undoes every open intent in the journal.
///
/// Must run before the process accepts commits; an intent still in flight
/// elsewhere would be treated as abandoned.
pub struct IntentRecovery<S> {
    store: S,
}

impl<S: Backend> IntentRecovery<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Replays every open intent.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for intent_id in self.store.open_intents().await? {
            let events = self.store.load_intent(intent_id).await?;
            let record = IntentRecord::replay(intent_id, events);

            match self.settle(record).await? {
                Some(outcome) => {
                    report.count(outcome);
                    metrics::counter!("commit_intents_recovered_total", "outcome" => outcome.as_str())
                        .increment(1);
                    tracing::info!(%intent_id, outcome = outcome.as_str(), "intent recovered");
                }
                None => {
                    report.unsettled += 1;
                    tracing::error!(%intent_id, "intent could not be settled");
                }
            }
        }

        if report.total() > 0 {
            tracing::info!(?report, "commit journal recovery finished");
        }
        Ok(report)
    }

    /// Decides and applies the outcome of one intent. `None` means stock
    /// could not be returned and the intent stays open.
    async fn settle(&self, record: IntentRecord) -> Result<Option<IntentOutcome>> {
        let mut intent = JournaledIntent::resume(&self.store, record);

        let outcome = match intent.state().kind() {
            Some(IntentKind::Commit) => {
                if self.order_persisted(intent.state()).await? {
                    IntentOutcome::Committed
                } else if intent.release_pending(UnjournaledRelease::Stop).await {
                    IntentOutcome::Compensated
                } else {
                    return Ok(None);
                }
            }
            Some(IntentKind::Cancel) if intent.state().status_cancelled() => {
                if intent.release_pending(UnjournaledRelease::Stop).await {
                    IntentOutcome::Released
                } else {
                    return Ok(None);
                }
            }
            _ => IntentOutcome::Abandoned,
        };

        intent.close(outcome).await?;
        Ok(Some(outcome))
    }

    /// True when an order this intent assigned is stored. A number alone
    /// is not enough: after a duplicate-number retry the journaled number
    /// belongs to someone else's order.
    async fn order_persisted(&self, record: &IntentRecord) -> Result<bool> {
        for (number, order_id) in record.assigned_numbers() {
            if let Some(order) = self.store.find_order_by_number(number).await?
                && order.id() == *order_id
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use common::{IntentId, Money, OrderId};
    use domain::Product;
    use store::{CommitJournal, InMemoryStore, InventoryLedger, JournalEvent, JournalLine};

    use super::*;

    async fn product(store: &InMemoryStore, stock: i64) -> Product {
        let product = Product::new(
            "Detergent 1kg",
            Money::from_cents(1200),
            Money::from_cents(900),
            "Household",
            stock,
        );
        store.insert_product(product.clone()).await;
        product
    }

    #[tokio::test]
    async fn half_reserved_commit_is_compensated() {
        let store = InMemoryStore::new();
        let a = product(&store, 10).await;
        let b = product(&store, 10).await;
        let intent = IntentId::new();

        // Crash after reserving A, before B.
        store
            .append_journal(
                intent,
                JournalEvent::opened(
                    IntentKind::Commit,
                    None,
                    vec![
                        JournalLine { product_id: a.id, quantity: 3 },
                        JournalLine { product_id: b.id, quantity: 2 },
                    ],
                ),
            )
            .await
            .unwrap();
        store.reserve(a.id, 3).await.unwrap();
        store
            .append_journal(intent, JournalEvent::LineReserved { line: 0 })
            .await
            .unwrap();

        let report = IntentRecovery::new(store.clone()).recover().await.unwrap();

        assert_eq!(report.compensated, 1);
        assert_eq!(store.stock_of(a.id).await, Some(10));
        assert_eq!(store.stock_of(b.id).await, Some(10));
        assert!(store.open_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unstarted_cancel_is_abandoned() {
        let store = InMemoryStore::new();
        let p = product(&store, 4).await;
        let intent = IntentId::new();
        store
            .append_journal(
                intent,
                JournalEvent::opened(
                    IntentKind::Cancel,
                    Some(OrderId::new()),
                    vec![JournalLine { product_id: p.id, quantity: 1 }],
                ),
            )
            .await
            .unwrap();

        let report = IntentRecovery::new(store.clone()).recover().await.unwrap();

        assert_eq!(report.abandoned, 1);
        assert_eq!(store.stock_of(p.id).await, Some(4));
    }

    #[tokio::test]
    async fn nothing_to_do_on_clean_journal() {
        let store = InMemoryStore::new();
        let report = IntentRecovery::new(store).recover().await.unwrap();
        assert_eq!(report, RecoveryReport::default());
    }
}
