//! Commit coordinator: reserves stock line by line, compensates on failure,
//! and persists the order.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, ProductId};
use domain::Order;
use serde::Serialize;
use store::{Backend, IntentKind, IntentOutcome, JournalEvent, JournalLine, StoreError};

use crate::assembler::{CartRequest, OrderAssembler, PricedCart};
use crate::error::{CommitError, Result};
use crate::intent::{JournaledIntent, UnjournaledRelease};
use crate::numbering::OrderNumberGenerator;

/// Default number of fresh order numbers tried after a duplicate key.
pub const DEFAULT_NUMBER_RETRIES: u32 = 3;

/// A product whose stock fell to or below its threshold during a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub product_name: String,
    pub stock: i64,
    pub threshold: i64,
}

/// A committed order and the low-stock alerts its reservations raised.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub order: Order,
    pub low_stock: Vec<LowStockAlert>,
}

/// Orchestrates the order commit saga.
///
/// Steps, each journaled before the next begins:
/// 1. reserve every cart line in submission order
/// 2. assign an order number
/// 3. persist the order
///
/// A failure at any step releases every reservation already made before
/// the error is returned. Unrelated commits never wait on each other; the
/// only shared state is each product's stock counter, guarded by the
/// store's conditional write.
pub struct CommitCoordinator<S> {
    store: S,
    assembler: OrderAssembler<S>,
    numbers: Arc<OrderNumberGenerator>,
    number_retries: u32,
}

impl<S: Backend> CommitCoordinator<S> {
    /// Creates a new commit coordinator.
    pub fn new(store: S, numbers: Arc<OrderNumberGenerator>) -> Self {
        Self {
            assembler: OrderAssembler::new(store.clone()),
            store,
            numbers,
            number_retries: DEFAULT_NUMBER_RETRIES,
        }
    }

    /// Sets how many fresh order numbers are tried after a duplicate
    /// number before the commit fails.
    pub fn with_number_retries(mut self, retries: u32) -> Self {
        self.number_retries = retries;
        self
    }

    /// The assembler used to validate and price carts, for callers that
    /// price a cart ahead of [`CommitCoordinator::commit_priced`].
    pub fn assembler(&self) -> &OrderAssembler<S> {
        &self.assembler
    }

    /// Validates, prices and commits a cart.
    #[tracing::instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn commit(&self, request: CartRequest) -> Result<CommitOutcome> {
        let started = std::time::Instant::now();
        let result = match self.assembler.assemble(request).await {
            Ok(cart) => self.reserve_and_persist(cart).await,
            Err(e) => Err(e),
        };
        observe(started, &result);
        result
    }

    /// Commits a cart priced earlier by [`OrderAssembler::assemble`].
    ///
    /// Stock may have moved since the cart was priced; the reservations
    /// decide.
    #[tracing::instrument(skip(self, cart), fields(lines = cart.draft.items.len()))]
    pub async fn commit_priced(&self, cart: PricedCart) -> Result<CommitOutcome> {
        let started = std::time::Instant::now();
        let result = self.reserve_and_persist(cart).await;
        observe(started, &result);
        result
    }

    async fn reserve_and_persist(&self, cart: PricedCart) -> Result<CommitOutcome> {
        let PricedCart { draft, thresholds } = cart;
        let lines: Vec<JournalLine> = draft
            .quantities()
            .map(|(product_id, quantity)| JournalLine {
                product_id,
                quantity,
            })
            .collect();

        // One id for every numbering attempt, so recovery can tell this
        // commit's order apart from another holding the same number.
        let order_id = OrderId::new();
        let mut intent =
            JournaledIntent::open(&self.store, IntentKind::Commit, Some(order_id), lines).await?;
        let mut low_stock = Vec::new();

        // Step 1: reserve in submission order
        for (line, item) in draft.items.iter().enumerate() {
            let stock = match self.store.reserve(item.product_id, item.quantity).await {
                Ok(stock) => stock,
                Err(e) => {
                    tracing::warn!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "reservation failed"
                    );
                    self.compensate(&mut intent).await;
                    return Err(match e {
                        StoreError::InsufficientStock {
                            product_id,
                            requested,
                            available,
                        } => CommitError::InsufficientStock {
                            product_id,
                            product_name: item.product_name.clone(),
                            requested,
                            available,
                        },
                        StoreError::ProductNotFound(product_id) => {
                            CommitError::ProductNotFound(product_id)
                        }
                        other => CommitError::Store(other),
                    });
                }
            };

            if let Err(e) = intent.record(JournalEvent::LineReserved { line }).await {
                intent.note(JournalEvent::LineReserved { line });
                self.compensate(&mut intent).await;
                return Err(e.into());
            }

            if let Some(&threshold) = thresholds.get(line)
                && stock <= threshold
            {
                metrics::counter!("inventory_low_stock_total").increment(1);
                tracing::warn!(
                    product_id = %item.product_id,
                    product = %item.product_name,
                    stock,
                    threshold,
                    "product stock is low"
                );
                low_stock.push(LowStockAlert {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    stock,
                    threshold,
                });
            }
        }

        // Steps 2 and 3: number and persist, retrying on number collisions
        let mut retries = 0;
        loop {
            let order_number = self.numbers.next_number();
            if let Err(e) = intent
                .record(JournalEvent::NumberAssigned {
                    order_number: order_number.clone(),
                    order_id,
                })
                .await
            {
                self.compensate(&mut intent).await;
                return Err(e.into());
            }

            let order = Order::from_draft(order_id, draft.clone(), order_number, Utc::now());
            match self.store.insert_order(&order).await {
                Ok(()) => {
                    if let Err(e) = intent.close(IntentOutcome::Committed).await {
                        tracing::warn!(
                            order_number = order.order_number(),
                            error = %e,
                            "order persisted but intent not closed"
                        );
                    }
                    return Ok(CommitOutcome { order, low_stock });
                }
                Err(StoreError::DuplicateOrderNumber(number)) if retries < self.number_retries => {
                    retries += 1;
                    tracing::warn!(order_number = %number, retries, "order number taken, retrying");
                }
                Err(StoreError::DuplicateOrderNumber(number)) => {
                    self.compensate(&mut intent).await;
                    return Err(CommitError::DuplicateOrderNumber(number));
                }
                Err(e) => {
                    tracing::error!(error = %e, "order persistence failed");
                    self.compensate(&mut intent).await;
                    return Err(e.into());
                }
            }
        }
    }

    /// Releases every reservation the intent holds and closes it.
    ///
    /// If anything could not be released the intent stays open and start-up
    /// recovery finishes the job.
    async fn compensate(&self, intent: &mut JournaledIntent<'_, S>) {
        let pending = intent.state().pending_releases().len();
        if pending > 0 {
            metrics::counter!("inventory_compensations_total").increment(1);
            tracing::info!(
                intent_id = %intent.state().id(),
                lines = pending,
                "compensating reservations"
            );
        }

        if !intent.release_pending(UnjournaledRelease::Stop).await {
            tracing::error!(
                intent_id = %intent.state().id(),
                "compensation incomplete, intent left open for recovery"
            );
            return;
        }
        if let Err(e) = intent.close(IntentOutcome::Compensated).await {
            tracing::warn!(intent_id = %intent.state().id(), error = %e, "could not close intent");
        }
    }
}

fn observe(started: std::time::Instant, result: &Result<CommitOutcome>) {
    metrics::histogram!("order_commit_duration_seconds").record(started.elapsed().as_secs_f64());
    match result {
        Ok(outcome) => {
            metrics::counter!("orders_committed_total").increment(1);
            tracing::info!(
                order_id = %outcome.order.id(),
                order_number = outcome.order.order_number(),
                total = %outcome.order.financials().total,
                "order committed"
            );
        }
        Err(e) => {
            metrics::counter!("order_commit_failures_total", "reason" => e.reason()).increment(1);
            tracing::info!(reason = e.reason(), error = %e, "order commit rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use domain::{OrderStatus, PaymentMethod, Product};
    use store::{CommitJournal, InMemoryStore, InsertFailure, InventoryLedger, OrderStore};

    use super::*;
    use crate::assembler::{CartLine, CustomerInput};

    async fn setup(stocks: &[i64]) -> (CommitCoordinator<InMemoryStore>, InMemoryStore, Vec<Product>) {
        let store = InMemoryStore::new();
        let mut products = Vec::new();
        for (i, stock) in stocks.iter().enumerate() {
            let product = Product::new(
                format!("Item {i}"),
                Money::from_cents(500),
                Money::from_cents(300),
                "General",
                *stock,
            )
            .with_low_stock_threshold(2);
            store.insert_product(product.clone()).await;
            products.push(product);
        }
        let coordinator =
            CommitCoordinator::new(store.clone(), Arc::new(OrderNumberGenerator::default()));
        (coordinator, store, products)
    }

    fn cart(lines: &[(&Product, i64)]) -> CartRequest {
        let subtotal: i64 = lines.iter().map(|(p, q)| p.price.cents() * q).sum();
        CartRequest {
            lines: lines.iter().map(|(p, q)| CartLine::new(p.id, *q)).collect(),
            subtotal: Money::from_cents(subtotal),
            tax: Money::zero(),
            discount: Money::zero(),
            total: Money::from_cents(subtotal),
            payment_method: PaymentMethod::Cash,
            customer: CustomerInput::default(),
            user_id: Some("cashier-1".to_string()),
        }
    }

    #[tokio::test]
    async fn happy_path_reserves_and_persists() {
        let (coordinator, store, products) = setup(&[10]).await;
        let p1 = &products[0];

        let outcome = coordinator.commit(cart(&[(p1, 3)])).await.unwrap();

        assert_eq!(store.stock_of(p1.id).await, Some(7));
        assert_eq!(outcome.order.status(), OrderStatus::Completed);
        assert_eq!(outcome.order.financials().total.cents(), 1500);
        assert_eq!(outcome.order.financials().total_profit.cents(), 600);
        assert!(outcome.low_stock.is_empty());
        assert!(store.get_order(outcome.order.id()).await.unwrap().is_some());
        assert!(store.open_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_line_rolls_back_earlier_lines() {
        let (coordinator, store, products) = setup(&[5, 1]).await;
        let (a, b) = (&products[0], &products[1]);

        // Priced while B still had stock; another sale takes it first.
        let priced = coordinator
            .assembler()
            .assemble(cart(&[(a, 2), (b, 1)]))
            .await
            .unwrap();
        store.reserve(b.id, 1).await.unwrap();
        let err = coordinator.commit_priced(priced).await.unwrap_err();

        assert!(matches!(
            err,
            CommitError::InsufficientStock { product_id, requested: 1, available: 0, .. }
                if product_id == b.id
        ));
        assert_eq!(store.stock_of(a.id).await, Some(5));
        assert_eq!(store.count_orders().await.unwrap(), 0);
        assert!(store.open_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn low_stock_is_reported() {
        let (coordinator, _, products) = setup(&[4]).await;
        let outcome = coordinator.commit(cart(&[(&products[0], 2)])).await.unwrap();

        assert_eq!(
            outcome.low_stock,
            vec![LowStockAlert {
                product_id: products[0].id,
                product_name: "Item 0".to_string(),
                stock: 2,
                threshold: 2,
            }]
        );
    }

    #[tokio::test]
    async fn duplicate_number_is_retried() {
        let (coordinator, store, products) = setup(&[10]).await;
        store.fail_next_inserts(2, InsertFailure::Duplicate);

        let outcome = coordinator.commit(cart(&[(&products[0], 1)])).await.unwrap();

        assert_eq!(store.count_orders().await.unwrap(), 1);
        assert!(outcome.order.order_number().ends_with("-000003"));
        assert_eq!(store.stock_of(products[0].id).await, Some(9));
    }

    #[tokio::test]
    async fn exhausted_retries_release_everything() {
        let (coordinator, store, products) = setup(&[10]).await;
        let coordinator = coordinator.with_number_retries(1);
        store.fail_next_inserts(2, InsertFailure::Duplicate);

        let err = coordinator.commit(cart(&[(&products[0], 4)])).await.unwrap_err();

        assert!(matches!(err, CommitError::DuplicateOrderNumber(_)));
        assert_eq!(store.stock_of(products[0].id).await, Some(10));
        assert!(store.open_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_releases_everything() {
        let (coordinator, store, products) = setup(&[10, 10]).await;
        store.fail_next_inserts(1, InsertFailure::Unavailable);

        let err = coordinator
            .commit(cart(&[(&products[0], 4), (&products[1], 6)]))
            .await
            .unwrap_err();

        assert!(matches!(err, CommitError::Store(StoreError::Unavailable(_))));
        assert_eq!(store.stock_of(products[0].id).await, Some(10));
        assert_eq!(store.stock_of(products[1].id).await, Some(10));
    }

    #[tokio::test]
    async fn unjournaled_reservation_is_released() {
        let (coordinator, store, products) = setup(&[10, 10]).await;
        store.fail_next_appends("line_reserved", 1);

        let err = coordinator
            .commit(cart(&[(&products[0], 4), (&products[1], 6)]))
            .await
            .unwrap_err();

        assert!(matches!(err, CommitError::Store(StoreError::Unavailable(_))));
        assert_eq!(store.stock_of(products[0].id).await, Some(10));
        assert_eq!(store.stock_of(products[1].id).await, Some(10));
        assert_eq!(store.count_orders().await.unwrap(), 0);
        assert!(store.open_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_keep_one_order_id() {
        let (coordinator, store, products) = setup(&[10]).await;
        store.fail_next_inserts(1, InsertFailure::Duplicate);

        let outcome = coordinator.commit(cart(&[(&products[0], 1)])).await.unwrap();

        let events = store.journal_events().await;
        let assigned: Vec<OrderId> = events
            .iter()
            .filter_map(|e| match e {
                JournalEvent::NumberAssigned { order_id, .. } => Some(*order_id),
                _ => None,
            })
            .collect();
        assert_eq!(assigned, vec![outcome.order.id(), outcome.order.id()]);
    }
}
