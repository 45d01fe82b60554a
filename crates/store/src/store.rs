use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, IntentId, OrderId, ProductId};
use domain::{Customer, Order, OrderStatus, Product};

use crate::{JournalEvent, OrderQuery, Result};

/// Read access to the authoritative product and customer records.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns the current product record, including its stock.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Returns a stored customer.
    async fn get_customer(&self, customer_id: CustomerId) -> Result<Option<Customer>>;
}

/// Exclusive writer of product stock counters.
///
/// Both operations must be a single conditional write against the stock
/// field. Implementations never read the stock and write it back.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Decrements stock by `quantity` only if the current stock covers it.
    ///
    /// Returns the new stock. Fails with `InsufficientStock` when the
    /// conditional write matched nothing, or `ProductNotFound`. The
    /// `available` figure in the error is informational; it is read after
    /// the failed write.
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<i64>;

    /// Unconditionally increments stock by `quantity`.
    ///
    /// Returns `None` when the product no longer exists.
    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<Option<i64>>;
}

/// Durable record of committed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails with `DuplicateOrderNumber` if the number
    /// is taken.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>>;

    /// Returns matching orders, newest first.
    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>>;

    async fn count_orders(&self) -> Result<u64>;

    /// Sets the status to `to` only if it currently equals `from`.
    ///
    /// Returns the updated order, or `None` if the order is missing or its
    /// status no longer equals `from`.
    async fn transition_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>>;
}

/// Append-only intent log used to finish or undo interrupted stock writes.
#[async_trait]
pub trait CommitJournal: Send + Sync {
    /// Appends one event to an intent's log.
    async fn append_journal(&self, intent_id: IntentId, event: JournalEvent) -> Result<()>;

    /// Returns an intent's events in append order.
    async fn load_intent(&self, intent_id: IntentId) -> Result<Vec<JournalEvent>>;

    /// Returns intents that have no `Closed` event, oldest first.
    async fn open_intents(&self) -> Result<Vec<IntentId>>;
}

/// Everything the order core needs from one backing store.
pub trait Backend:
    ProductCatalog + InventoryLedger + OrderStore + CommitJournal + Clone + 'static
{
}

impl<T> Backend for T where
    T: ProductCatalog + InventoryLedger + OrderStore + CommitJournal + Clone + 'static
{
}
