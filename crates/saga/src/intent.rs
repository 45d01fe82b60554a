//! Journaled intents: the replayable record of one commit or cancellation.

use std::collections::BTreeSet;

use common::{IntentId, OrderId};
use store::{
    CommitJournal, IntentKind, IntentOutcome, InventoryLedger, JournalEvent, JournalLine,
};

/// State of one intent, rebuilt by applying its journal events in order.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentRecord {
    id: IntentId,
    kind: Option<IntentKind>,
    order_id: Option<OrderId>,
    lines: Vec<JournalLine>,
    /// Every number tried with the order id it was tried for, oldest first.
    assigned: Vec<(String, OrderId)>,
    reserved: BTreeSet<usize>,
    released: BTreeSet<usize>,
    status_cancelled: bool,
    outcome: Option<IntentOutcome>,
}

impl IntentRecord {
    pub fn new(id: IntentId) -> Self {
        Self {
            id,
            kind: None,
            order_id: None,
            lines: Vec::new(),
            assigned: Vec::new(),
            reserved: BTreeSet::new(),
            released: BTreeSet::new(),
            status_cancelled: false,
            outcome: None,
        }
    }

    /// Rebuilds an intent from its stored events.
    pub fn replay(id: IntentId, events: impl IntoIterator<Item = JournalEvent>) -> Self {
        let mut record = Self::new(id);
        for event in events {
            record.apply(event);
        }
        record
    }

    pub fn apply(&mut self, event: JournalEvent) {
        match event {
            JournalEvent::Opened {
                kind,
                order_id,
                lines,
                ..
            } => {
                self.kind = Some(kind);
                self.order_id = order_id;
                self.lines = lines;
            }
            JournalEvent::NumberAssigned {
                order_number,
                order_id,
            } => {
                self.assigned.push((order_number, order_id));
            }
            JournalEvent::LineReserved { line } => {
                self.reserved.insert(line);
            }
            JournalEvent::StatusCancelled => {
                self.status_cancelled = true;
            }
            JournalEvent::LineReleased { line } => {
                self.released.insert(line);
            }
            JournalEvent::Closed { outcome, .. } => {
                self.outcome = Some(outcome);
            }
        }
    }

    /// Lines whose stock must still be returned, last line first.
    ///
    /// A commit owes back what it reserved. A cancellation owes every line,
    /// but only once its status write has succeeded.
    pub fn pending_releases(&self) -> Vec<usize> {
        let owed: Vec<usize> = match self.kind {
            Some(IntentKind::Commit) => self.reserved.iter().copied().collect(),
            Some(IntentKind::Cancel) if self.status_cancelled => (0..self.lines.len()).collect(),
            _ => Vec::new(),
        };
        owed.into_iter()
            .rev()
            .filter(|line| !self.released.contains(line))
            .collect()
    }
}

// Query methods
impl IntentRecord {
    pub fn id(&self) -> IntentId {
        self.id
    }

    pub fn kind(&self) -> Option<IntentKind> {
        self.kind
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    pub fn assigned_numbers(&self) -> &[(String, OrderId)] {
        &self.assigned
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }

    pub fn status_cancelled(&self) -> bool {
        self.status_cancelled
    }

    pub fn outcome(&self) -> Option<IntentOutcome> {
        self.outcome
    }

    pub fn is_closed(&self) -> bool {
        self.outcome.is_some()
    }
}

/// What [`JournaledIntent::release_pending`] does when a release cannot be
/// journaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnjournaledRelease {
    /// Stop and leave the remaining lines to recovery.
    Stop,
    /// Keep releasing. Only safe when recovery will not replay the lines.
    Continue,
}

/// An intent being written: every event is appended to the journal before
/// it is applied locally.
pub(crate) struct JournaledIntent<'a, S> {
    store: &'a S,
    record: IntentRecord,
}

impl<'a, S> JournaledIntent<'a, S>
where
    S: CommitJournal + InventoryLedger,
{
    /// Opens a new intent.
    pub(crate) async fn open(
        store: &'a S,
        kind: IntentKind,
        order_id: Option<OrderId>,
        lines: Vec<JournalLine>,
    ) -> store::Result<Self> {
        let mut intent = Self {
            store,
            record: IntentRecord::new(IntentId::new()),
        };
        intent
            .record(JournalEvent::opened(kind, order_id, lines))
            .await?;
        Ok(intent)
    }

    /// Resumes an intent loaded from the journal.
    pub(crate) fn resume(store: &'a S, record: IntentRecord) -> Self {
        Self { store, record }
    }

    pub(crate) fn state(&self) -> &IntentRecord {
        &self.record
    }

    pub(crate) async fn record(&mut self, event: JournalEvent) -> store::Result<()> {
        self.store
            .append_journal(self.record.id(), event.clone())
            .await?;
        self.record.apply(event);
        Ok(())
    }

    /// Applies an event that could not be journaled, so local bookkeeping
    /// still reflects what happened.
    pub(crate) fn note(&mut self, event: JournalEvent) {
        self.record.apply(event);
    }

    pub(crate) async fn close(&mut self, outcome: IntentOutcome) -> store::Result<()> {
        self.record(JournalEvent::closed(outcome)).await
    }

    /// Returns the stock of every pending line.
    ///
    /// Keeps going past failed releases. On a journal failure `policy`
    /// decides whether to stop. Returns true when nothing is left pending.
    pub(crate) async fn release_pending(&mut self, policy: UnjournaledRelease) -> bool {
        let mut settled = true;
        for line in self.record.pending_releases() {
            let Some(JournalLine {
                product_id,
                quantity,
            }) = self.record.lines().get(line).cloned()
            else {
                tracing::error!(intent_id = %self.record.id(), line, "journal names an unknown line");
                settled = false;
                continue;
            };

            match self.store.release(product_id, quantity).await {
                Ok(Some(stock)) => {
                    tracing::debug!(%product_id, quantity, stock, "stock released");
                }
                Ok(None) => {
                    tracing::warn!(%product_id, quantity, "released stock for a product that no longer exists");
                }
                Err(e) => {
                    tracing::error!(%product_id, quantity, error = %e, "stock release failed");
                    settled = false;
                    continue;
                }
            }

            if let Err(e) = self.record(JournalEvent::LineReleased { line }).await {
                tracing::error!(intent_id = %self.record.id(), line, error = %e, "could not journal release");
                if policy == UnjournaledRelease::Stop {
                    return false;
                }
                self.note(JournalEvent::LineReleased { line });
            }
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    fn lines(n: usize) -> Vec<JournalLine> {
        (0..n)
            .map(|_| JournalLine {
                product_id: ProductId::new(),
                quantity: 1,
            })
            .collect()
    }

    #[test]
    fn commit_owes_reserved_lines_not_yet_released() {
        let record = IntentRecord::replay(
            IntentId::new(),
            [
                JournalEvent::opened(IntentKind::Commit, None, lines(3)),
                JournalEvent::LineReserved { line: 0 },
                JournalEvent::LineReserved { line: 1 },
                JournalEvent::LineReleased { line: 1 },
            ],
        );
        assert_eq!(record.pending_releases(), vec![0]);
        assert_eq!(record.reserved_count(), 2);
        assert!(!record.is_closed());
    }

    #[test]
    fn cancel_owes_nothing_before_status_write() {
        let mut record = IntentRecord::replay(
            IntentId::new(),
            [JournalEvent::opened(
                IntentKind::Cancel,
                Some(OrderId::new()),
                lines(2),
            )],
        );
        assert!(record.pending_releases().is_empty());

        record.apply(JournalEvent::StatusCancelled);
        assert_eq!(record.pending_releases(), vec![1, 0]);

        record.apply(JournalEvent::LineReleased { line: 1 });
        assert_eq!(record.pending_releases(), vec![0]);
    }

    #[test]
    fn tracks_every_assigned_number() {
        let order_id = OrderId::new();
        let record = IntentRecord::replay(
            IntentId::new(),
            [
                JournalEvent::opened(IntentKind::Commit, Some(order_id), lines(1)),
                JournalEvent::NumberAssigned {
                    order_number: "ORD-1-000001".to_string(),
                    order_id,
                },
                JournalEvent::NumberAssigned {
                    order_number: "ORD-1-000002".to_string(),
                    order_id,
                },
                JournalEvent::closed(IntentOutcome::Committed),
            ],
        );
        assert_eq!(
            record.assigned_numbers(),
            [
                ("ORD-1-000001".to_string(), order_id),
                ("ORD-1-000002".to_string(), order_id),
            ]
        );
        assert_eq!(record.outcome(), Some(IntentOutcome::Committed));
    }
}
