use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, IntentId, Money, OrderId, ProductId};
use domain::{Customer, Order, OrderStatus, Product, StatusChange};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    JournalEvent, OrderQuery, Result, StoreError,
    store::{CommitJournal, InventoryLedger, OrderStore, ProductCatalog},
};

/// PostgreSQL-backed store.
///
/// Stock lives in `products.stock` and is only ever changed by a single
/// conditional `UPDATE`. Orders are kept as JSONB documents with the
/// filterable fields copied into columns.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a product, or replaces every field of an existing one.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, cost_price_cents, category, barcode,
                                  stock, low_stock_threshold, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                cost_price_cents = EXCLUDED.cost_price_cents,
                category = EXCLUDED.category,
                barcode = EXCLUDED.barcode,
                stock = EXCLUDED.stock,
                low_stock_threshold = EXCLUDED.low_stock_threshold,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.cost_price.cents())
        .bind(&product.category)
        .bind(&product.barcode)
        .bind(product.stock)
        .bind(product.low_stock_threshold)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, address, phone_number, nic, is_vat)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.address)
        .bind(&customer.phone_number)
        .bind(&customer.nic)
        .bind(customer.is_vat)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            cost_price: Money::from_cents(row.try_get("cost_price_cents")?),
            category: row.try_get("category")?,
            barcode: row.try_get("barcode")?,
            stock: row.try_get("stock")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            is_active: row.try_get("is_active")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let document: serde_json::Value = row.try_get("document")?;
        Ok(serde_json::from_value(document)?)
    }

    async fn current_stock(&self, product_id: ProductId) -> Result<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price_cents, cost_price_cents, category, barcode,
                   stock, low_stock_threshold, is_active, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_customer(&self, customer_id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, address, phone_number, nic, is_vat
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Customer {
                id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
                address: row.try_get("address")?,
                phone_number: row.try_get("phone_number")?,
                nic: row.try_get("nic")?,
                is_vat: row.try_get("is_vat")?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InventoryLedger for PostgresStore {
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<i64> {
        let requested = i64::from(quantity);
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(requested)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(stock) = remaining {
            return Ok(stock);
        }

        match self.current_stock(product_id).await? {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available,
            }),
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let document = serde_json::to_value(order)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, status, payment_method, created_at, updated_at, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number())
        .bind(order.status().as_str())
        .bind(order.payment_method().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return StoreError::DuplicateOrderNumber(order.order_number().to_string());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT document FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT document FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut sql = String::from("SELECT document FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.payment_method.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_method = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, order_number DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(from) = query.from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.to {
            sqlx_query = sqlx_query.bind(to);
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(method) = query.payment_method {
            sqlx_query = sqlx_query.bind(method.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn count_orders(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        // The row lock makes a concurrent caller re-check `status` after we commit.
        let row = sqlx::query(
            "SELECT document FROM orders WHERE id = $1 AND status = $2 FOR UPDATE",
        )
        .bind(order_id.as_uuid())
        .bind(from.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = Self::row_to_order(row)?;
        if !matches!(order.transition(to, at), Ok(StatusChange::Changed { .. })) {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = $3, document = $4
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(to.as_str())
        .bind(at)
        .bind(serde_json::to_value(&order)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(order))
    }
}

#[async_trait]
impl CommitJournal for PostgresStore {
    async fn append_journal(&self, intent_id: IntentId, event: JournalEvent) -> Result<()> {
        let payload = serde_json::to_value(&event)?;

        sqlx::query(
            r#"
            INSERT INTO commit_journal (intent_id, seq, event_type, payload)
            SELECT $1, COALESCE(MAX(seq), 0) + 1, $2, $3
            FROM commit_journal
            WHERE intent_id = $1
            "#,
        )
        .bind(intent_id.as_uuid())
        .bind(event.event_type())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_intent(&self, intent_id: IntentId) -> Result<Vec<JournalEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT payload
            FROM commit_journal
            WHERE intent_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(intent_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let payload: serde_json::Value = row.try_get("payload")?;
                Ok(serde_json::from_value(payload)?)
            })
            .collect()
    }

    async fn open_intents(&self) -> Result<Vec<IntentId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT intent_id
            FROM commit_journal
            GROUP BY intent_id
            HAVING NOT bool_or(event_type = 'closed')
            ORDER BY MIN(recorded_at) ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(IntentId::from_uuid).collect())
    }
}
