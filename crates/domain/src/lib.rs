//! Domain layer for the point-of-sale order core.
//!
//! Pure model code with no I/O:
//! - catalog records (`Product`, `Customer`) read from the product catalog
//! - immutable order snapshots and the committed `Order` record
//! - the order status machine
//! - line pricing, order financials and profit analytics

pub mod analytics;
pub mod catalog;
pub mod order;
pub mod pricing;

pub use analytics::{DailyProfit, ProfitSummary};
pub use catalog::{Customer, Product};
pub use order::{
    CustomerSnapshot, Order, OrderDraft, OrderError, OrderItemSnapshot, OrderStatus,
    PaymentMethod, StatusChange,
};
pub use pricing::{OrderFinancials, price_line, profit_margin};
