use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, IntentId, Money, OrderId, ProductId};
use domain::{Customer, Order, OrderStatus, Product, StatusChange};
use tokio::sync::RwLock;

use crate::{
    JournalEvent, OrderQuery, Result, StoreError,
    store::{CommitJournal, InventoryLedger, OrderStore, ProductCatalog},
};

/// Kind of failure injected into `insert_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertFailure {
    /// Report the order number as already taken.
    Duplicate,
    /// Report the store as unavailable.
    Unavailable,
}

/// A catalog entry whose stock lives in its own atomic counter, so
/// reservations on different products never contend.
struct StoredProduct {
    product: Product,
    stock: Arc<AtomicI64>,
}

#[derive(Default)]
struct OrderTable {
    by_id: HashMap<OrderId, Order>,
    by_number: HashMap<String, OrderId>,
}

#[derive(Default)]
struct JournalState {
    intents: HashMap<IntentId, Vec<JournalEvent>>,
    /// Intent ids in the order they were first written.
    opened: Vec<IntentId>,
}

/// In-memory store used by tests and the default server configuration.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, StoredProduct>>>,
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
    orders: Arc<RwLock<OrderTable>>,
    journal: Arc<RwLock<JournalState>>,
    insert_failures: Arc<Mutex<Vec<InsertFailure>>>,
    /// Event types whose next journal append fails, one entry per failure.
    append_failures: Arc<Mutex<Vec<&'static str>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub async fn insert_product(&self, product: Product) {
        let stock = Arc::new(AtomicI64::new(product.stock));
        self.products
            .write()
            .await
            .insert(product.id, StoredProduct { product, stock });
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.customers.write().await.insert(customer.id, customer);
    }

    /// Changes a product's price. Returns false if the product is missing.
    pub async fn set_price(&self, product_id: ProductId, price: Money) -> bool {
        match self.products.write().await.get_mut(&product_id) {
            Some(entry) => {
                entry.product.price = price;
                entry.product.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn set_active(&self, product_id: ProductId, active: bool) -> bool {
        match self.products.write().await.get_mut(&product_id) {
            Some(entry) => {
                entry.product.is_active = active;
                true
            }
            None => false,
        }
    }

    pub async fn remove_product(&self, product_id: ProductId) -> Option<Product> {
        self.products
            .write()
            .await
            .remove(&product_id)
            .map(|entry| with_stock(entry.product, &entry.stock))
    }

    /// Returns the current stock of a product.
    pub async fn stock_of(&self, product_id: ProductId) -> Option<i64> {
        self.products
            .read()
            .await
            .get(&product_id)
            .map(|entry| entry.stock.load(Ordering::SeqCst))
    }

    /// Makes the next `count` calls to `insert_order` fail with `failure`.
    pub fn fail_next_inserts(&self, count: usize, failure: InsertFailure) {
        if let Ok(mut queue) = self.insert_failures.lock() {
            queue.extend(std::iter::repeat_n(failure, count));
        }
    }

    /// Makes the next `count` journal appends of `event_type` events fail
    /// as unavailable.
    pub fn fail_next_appends(&self, event_type: &'static str, count: usize) {
        if let Ok(mut queue) = self.append_failures.lock() {
            queue.extend(std::iter::repeat_n(event_type, count));
        }
    }

    /// Returns the total number of journal entries.
    pub async fn journal_len(&self) -> usize {
        self.journal
            .read()
            .await
            .intents
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Returns every journal entry, intents in the order they were opened.
    pub async fn journal_events(&self) -> Vec<JournalEvent> {
        let journal = self.journal.read().await;
        journal
            .opened
            .iter()
            .filter_map(|id| journal.intents.get(id))
            .flatten()
            .cloned()
            .collect()
    }

    fn take_append_failure(&self, event_type: &str) -> bool {
        let Ok(mut queue) = self.append_failures.lock() else {
            return false;
        };
        match queue.iter().position(|t| *t == event_type) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }

    fn take_insert_failure(&self) -> Option<InsertFailure> {
        let mut queue = self.insert_failures.lock().ok()?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

fn with_stock(mut product: Product, stock: &AtomicI64) -> Product {
    product.stock = stock.load(Ordering::SeqCst);
    product
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products
            .get(&product_id)
            .map(|entry| with_stock(entry.product.clone(), &entry.stock)))
    }

    async fn get_customer(&self, customer_id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.read().await.get(&customer_id).cloned())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryStore {
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<i64> {
        let stock = {
            let products = self.products.read().await;
            products
                .get(&product_id)
                .map(|entry| entry.stock.clone())
                .ok_or(StoreError::ProductNotFound(product_id))?
        };

        let requested = i64::from(quantity);
        match stock.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            (current >= requested).then_some(current - requested)
        }) {
            Ok(previous) => Ok(previous - requested),
            Err(available) => Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available,
            }),
        }
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<Option<i64>> {
        let products = self.products.read().await;
        Ok(products.get(&product_id).map(|entry| {
            let amount = i64::from(quantity);
            entry.stock.fetch_add(amount, Ordering::SeqCst) + amount
        }))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        match self.take_insert_failure() {
            Some(InsertFailure::Duplicate) => {
                return Err(StoreError::DuplicateOrderNumber(
                    order.order_number().to_string(),
                ));
            }
            Some(InsertFailure::Unavailable) => {
                return Err(StoreError::Unavailable("injected insert failure".to_string()));
            }
            None => {}
        }

        let mut table = self.orders.write().await;
        if table.by_number.contains_key(order.order_number()) {
            return Err(StoreError::DuplicateOrderNumber(
                order.order_number().to_string(),
            ));
        }
        table
            .by_number
            .insert(order.order_number().to_string(), order.id());
        table.by_id.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.by_id.get(&order_id).cloned())
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let table = self.orders.read().await;
        Ok(table
            .by_number
            .get(order_number)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let table = self.orders.read().await;
        let mut orders: Vec<Order> = table
            .by_id
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        // Newest first; order number breaks ties between equal timestamps.
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.order_number().cmp(a.order_number()))
        });

        if let Some(limit) = query.limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }

    async fn count_orders(&self) -> Result<u64> {
        Ok(self.orders.read().await.by_id.len() as u64)
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut table = self.orders.write().await;
        let Some(order) = table.by_id.get_mut(&order_id) else {
            return Ok(None);
        };
        if order.status() != from {
            return Ok(None);
        }
        match order.transition(to, at) {
            Ok(StatusChange::Changed { .. }) => Ok(Some(order.clone())),
            Ok(StatusChange::Unchanged) | Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl CommitJournal for InMemoryStore {
    async fn append_journal(&self, intent_id: IntentId, event: JournalEvent) -> Result<()> {
        if self.take_append_failure(event.event_type()) {
            return Err(StoreError::Unavailable("injected journal failure".to_string()));
        }
        let mut journal = self.journal.write().await;
        if !journal.intents.contains_key(&intent_id) {
            journal.opened.push(intent_id);
        }
        journal.intents.entry(intent_id).or_default().push(event);
        Ok(())
    }

    async fn load_intent(&self, intent_id: IntentId) -> Result<Vec<JournalEvent>> {
        Ok(self
            .journal
            .read()
            .await
            .intents
            .get(&intent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn open_intents(&self) -> Result<Vec<IntentId>> {
        let journal = self.journal.read().await;
        Ok(journal
            .opened
            .iter()
            .filter(|id| {
                journal
                    .intents
                    .get(id)
                    .is_some_and(|events| !events.iter().any(JournalEvent::is_closed))
            })
            .copied()
            .collect())
    }
}
