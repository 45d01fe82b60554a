//! Cart validation and pricing.

use common::{CustomerId, Money, ProductId};
use domain::{CustomerSnapshot, OrderDraft, OrderFinancials, PaymentMethod, price_line};
use store::ProductCatalog;

use crate::error::{CommitError, Result};

/// One requested cart line. `product` is the raw id as sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: String,
    pub quantity: i64,
    /// Sale price override. Cost is never taken from the client.
    pub price: Option<Money>,
}

impl CartLine {
    pub fn new(product: impl ToString, quantity: i64) -> Self {
        Self {
            product: product.to_string(),
            quantity,
            price: None,
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }
}

/// Customer fields supplied inline with the cart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineCustomer {
    pub name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub nic: Option<String>,
    pub is_vat: bool,
}

/// Every way a cart can name its customer. Resolution takes the first
/// usable source in field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerInput {
    /// Id of a stored customer.
    pub customer_id: Option<String>,
    pub inline: Option<InlineCustomer>,
    /// Bare name from older clients.
    pub legacy_name: Option<String>,
    /// Bare contact number from older clients.
    pub legacy_contact: Option<String>,
}

/// A client-submitted cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartRequest {
    pub lines: Vec<CartLine>,
    /// Client-computed subtotal, checked against the server figure.
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    /// Client-computed total, checked against the server figure.
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub customer: CustomerInput,
    pub user_id: Option<String>,
}

/// A priced cart ready for reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedCart {
    pub draft: OrderDraft,
    /// Low-stock threshold of each line's product, in line order.
    pub thresholds: Vec<i64>,
}

/// Largest accepted gap between a client-sent figure and the server's.
const TOTALS_TOLERANCE_CENTS: u64 = 1;

/// Validates carts and prices them against the product catalog.
///
/// Assembly has no side effects. The stock check it performs is advisory;
/// the reservation made later is authoritative.
#[derive(Clone)]
pub struct OrderAssembler<C> {
    catalog: C,
}

impl<C: ProductCatalog> OrderAssembler<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Validates and prices a cart.
    #[tracing::instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn assemble(&self, request: CartRequest) -> Result<PricedCart> {
        let created_by = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(CommitError::Unauthenticated)?
            .to_string();

        if request.lines.is_empty() {
            return Err(CommitError::Validation("No items provided".to_string()));
        }

        let customer = self.resolve_customer(&request.customer).await?;

        let mut items = Vec::with_capacity(request.lines.len());
        let mut thresholds = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product_id: ProductId = line.product.parse()?;
            let quantity = u32::try_from(line.quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| {
                    CommitError::InvalidItem(format!(
                        "Invalid quantity {} for product {product_id}",
                        line.quantity
                    ))
                })?;

            let product = self
                .catalog
                .get_product(product_id)
                .await?
                .ok_or(CommitError::ProductNotFound(product_id))?;
            if !product.is_active {
                return Err(CommitError::ProductInactive {
                    product_id,
                    name: product.name,
                });
            }
            if product.stock < i64::from(quantity) {
                return Err(CommitError::InsufficientStock {
                    product_id,
                    product_name: product.name,
                    requested: quantity,
                    available: product.stock,
                });
            }

            items.push(price_line(&product, i64::from(quantity), line.price)?);
            thresholds.push(product.low_stock_threshold);
        }

        let financials = OrderFinancials::compute(&items, request.tax, request.discount)?;
        check_client_figure("subtotal", request.subtotal, financials.subtotal)?;
        check_client_figure("total", request.total, financials.total)?;

        Ok(PricedCart {
            draft: OrderDraft {
                items,
                financials,
                payment_method: request.payment_method,
                customer,
                created_by,
            },
            thresholds,
        })
    }

    async fn resolve_customer(&self, input: &CustomerInput) -> Result<Option<CustomerSnapshot>> {
        if let Some(raw) = input.customer_id.as_deref()
            && !raw.trim().is_empty()
        {
            let customer_id: CustomerId = raw.parse()?;
            let customer = self
                .catalog
                .get_customer(customer_id)
                .await?
                .ok_or(CommitError::CustomerNotFound(customer_id))?;
            return Ok(Some(CustomerSnapshot::from_customer(&customer)));
        }

        if let Some(inline) = &input.inline
            && let Some(snapshot) = CustomerSnapshot::inline(
                &inline.name,
                inline.address.as_deref(),
                inline.phone_number.as_deref(),
                inline.nic.as_deref(),
                inline.is_vat,
            )
        {
            return Ok(Some(snapshot));
        }

        Ok(input
            .legacy_name
            .as_deref()
            .and_then(|name| CustomerSnapshot::legacy(name, input.legacy_contact.as_deref())))
    }
}

fn check_client_figure(field: &str, sent: Money, computed: Money) -> Result<()> {
    if sent.abs_diff(computed) > TOTALS_TOLERANCE_CENTS {
        return Err(CommitError::Validation(format!(
            "{field} {sent} does not match computed {field} {computed}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use domain::{Customer, Product};
    use store::InMemoryStore;

    use super::*;

    async fn setup() -> (OrderAssembler<InMemoryStore>, InMemoryStore, Product) {
        let store = InMemoryStore::new();
        let product = Product::new(
            "Notebook A5",
            Money::from_cents(1000),
            Money::from_cents(600),
            "Stationery",
            10,
        );
        store.insert_product(product.clone()).await;
        (OrderAssembler::new(store.clone()), store, product)
    }

    fn cart(lines: Vec<CartLine>, subtotal: i64, discount: i64) -> CartRequest {
        CartRequest {
            lines,
            subtotal: Money::from_cents(subtotal),
            tax: Money::zero(),
            discount: Money::from_cents(discount),
            total: Money::from_cents(subtotal - discount),
            payment_method: PaymentMethod::Cash,
            customer: CustomerInput::default(),
            user_id: Some("cashier-1".to_string()),
        }
    }

    #[tokio::test]
    async fn prices_from_catalog_and_computes_profit() {
        let (assembler, _, product) = setup().await;
        let priced = assembler
            .assemble(cart(vec![CartLine::new(product.id, 2)], 2000, 200))
            .await
            .unwrap();

        let f = priced.draft.financials;
        assert_eq!(f.total_cost.cents(), 1200);
        assert_eq!(f.total_profit.cents(), 600);
        assert_eq!(f.profit_margin, 50.0);
        assert_eq!(priced.thresholds, vec![5]);
        assert_eq!(priced.draft.created_by, "cashier-1");
    }

    #[tokio::test]
    async fn missing_user_is_unauthenticated() {
        let (assembler, _, product) = setup().await;
        let mut request = cart(vec![CartLine::new(product.id, 1)], 1000, 0);
        request.user_id = Some("  ".to_string());

        assert!(matches!(
            assembler.assemble(request).await,
            Err(CommitError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let (assembler, _, _) = setup().await;
        let err = assembler.assemble(cart(vec![], 0, 0)).await.unwrap_err();
        assert!(matches!(err, CommitError::Validation(ref m) if m == "No items provided"));
    }

    #[tokio::test]
    async fn bad_lines_are_rejected() {
        let (assembler, store, product) = setup().await;

        let err = assembler
            .assemble(cart(vec![CartLine::new(product.id, 0)], 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::InvalidItem(_)));

        let err = assembler
            .assemble(cart(vec![CartLine::new(product.id, i64::from(u32::MAX) + 1)], 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::InvalidItem(ref m) if m.contains("4294967296")));

        let err = assembler
            .assemble(cart(vec![CartLine::new("not-an-id", 1)], 1000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::InvalidId(_)));

        let missing = ProductId::new();
        let err = assembler
            .assemble(cart(vec![CartLine::new(missing, 1)], 1000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::ProductNotFound(id) if id == missing));

        store.set_active(product.id, false).await;
        let err = assembler
            .assemble(cart(vec![CartLine::new(product.id, 1)], 1000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::ProductInactive { .. }));
    }

    #[tokio::test]
    async fn client_totals_must_match() {
        let (assembler, _, product) = setup().await;

        let drift = assembler
            .assemble(cart(vec![CartLine::new(product.id, 1)], 999, 0))
            .await;
        assert!(drift.is_ok(), "one cent of drift is tolerated");

        let err = assembler
            .assemble(cart(vec![CartLine::new(product.id, 1)], 900, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::Validation(_)));
    }

    #[tokio::test]
    async fn override_price_is_used() {
        let (assembler, _, product) = setup().await;
        let line = CartLine::new(product.id, 2).with_price(Money::from_cents(800));
        let priced = assembler.assemble(cart(vec![line], 1600, 0)).await.unwrap();
        assert_eq!(priced.draft.items[0].selling_price.cents(), 800);
        assert_eq!(priced.draft.items[0].cost_price.cents(), 600);
    }

    #[tokio::test]
    async fn oversized_amounts_are_validation_errors() {
        let (assembler, _, product) = setup().await;
        let line = CartLine::new(product.id, 3).with_price(Money::from_cents(i64::MAX / 2));

        let err = assembler.assemble(cart(vec![line], 0, 0)).await.unwrap_err();

        assert!(matches!(err, CommitError::Validation(ref m) if m.contains("out of range")));
    }

    #[tokio::test]
    async fn customer_precedence() {
        let (assembler, store, product) = setup().await;
        let stored = Customer::new("Ruwan Silva");
        store.insert_customer(stored.clone()).await;

        let mut request = cart(vec![CartLine::new(product.id, 1)], 1000, 0);
        request.customer = CustomerInput {
            customer_id: Some(stored.id.to_string()),
            inline: Some(InlineCustomer {
                name: "Inline".to_string(),
                ..Default::default()
            }),
            legacy_name: Some("Legacy".to_string()),
            legacy_contact: None,
        };
        let priced = assembler.assemble(request.clone()).await.unwrap();
        assert_eq!(priced.draft.customer.unwrap().customer_id, Some(stored.id));

        request.customer.customer_id = None;
        let priced = assembler.assemble(request.clone()).await.unwrap();
        assert_eq!(priced.draft.customer.unwrap().name, "Inline");

        request.customer.inline = Some(InlineCustomer {
            name: "   ".to_string(),
            ..Default::default()
        });
        let priced = assembler.assemble(request.clone()).await.unwrap();
        assert_eq!(priced.draft.customer.unwrap().name, "Legacy");

        request.customer = CustomerInput::default();
        let priced = assembler.assemble(request.clone()).await.unwrap();
        assert!(priced.draft.customer.is_none());

        request.customer.customer_id = Some(CustomerId::new().to_string());
        assert!(matches!(
            assembler.assemble(request).await,
            Err(CommitError::CustomerNotFound(_))
        ));
    }
}
