//! Line pricing and order-level profit arithmetic.
//!
//! All amounts are integer cents, so line totals are exact. The only
//! rounded figure is the profit margin percentage.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::order::{OrderError, OrderItemSnapshot};

/// Prices one cart line against the authoritative product record.
///
/// The selling price is the product's current price unless a sale price
/// override is given. Cost always comes from the product.
pub fn price_line(
    product: &Product,
    quantity: i64,
    price_override: Option<Money>,
) -> Result<OrderItemSnapshot, OrderError> {
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(OrderError::InvalidQuantity {
            product_id: product.id,
            quantity,
        })?;

    let selling_price = price_override.unwrap_or(product.price);
    if selling_price.is_negative() {
        return Err(OrderError::NegativeAmount {
            field: "price",
            amount: selling_price,
        });
    }

    let item_total = selling_price
        .checked_multiply(quantity)
        .ok_or(OrderError::AmountOutOfRange { field: "item total" })?;
    let item_cost = product
        .cost_price
        .checked_multiply(quantity)
        .ok_or(OrderError::AmountOutOfRange { field: "item cost" })?;
    let item_profit = item_total
        .checked_sub(item_cost)
        .ok_or(OrderError::AmountOutOfRange { field: "item profit" })?;

    Ok(OrderItemSnapshot {
        product_id: product.id,
        product_name: product.name.clone(),
        product_category: product.category.clone(),
        product_barcode: product.barcode.clone().unwrap_or_default(),
        quantity,
        selling_price,
        cost_price: product.cost_price,
        item_total,
        item_cost,
        item_profit,
    })
}

/// `profit / cost * 100`, rounded half away from zero to two decimals.
/// Zero when there is no cost.
pub fn profit_margin(profit: Money, cost: Money) -> f64 {
    if cost.is_zero() {
        return 0.0;
    }
    let ratio = profit.cents() as f64 / cost.cents() as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

/// Order-level figures frozen at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFinancials {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub total_cost: Money,
    pub total_profit: Money,
    pub profit_margin: f64,
}

impl OrderFinancials {
    /// Computes totals from priced lines.
    ///
    /// `subtotal = Σ item_total`, `total = subtotal + tax - discount`,
    /// `total_profit = subtotal - total_cost - discount`.
    pub fn compute(
        items: &[OrderItemSnapshot],
        tax: Money,
        discount: Money,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if tax.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "tax",
                amount: tax,
            });
        }
        if discount.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "discount",
                amount: discount,
            });
        }

        let subtotal = checked_sum(items.iter().map(|i| i.item_total), "subtotal")?;
        let total_cost = checked_sum(items.iter().map(|i| i.item_cost), "total cost")?;
        let total = subtotal
            .checked_add(tax)
            .and_then(|t| t.checked_sub(discount))
            .ok_or(OrderError::AmountOutOfRange { field: "total" })?;
        if total.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "total",
                amount: total,
            });
        }
        let total_profit = subtotal
            .checked_sub(total_cost)
            .and_then(|p| p.checked_sub(discount))
            .ok_or(OrderError::AmountOutOfRange { field: "total profit" })?;

        Ok(Self {
            subtotal,
            tax,
            discount,
            total,
            total_cost,
            total_profit,
            profit_margin: profit_margin(total_profit, total_cost),
        })
    }
}

fn checked_sum(
    mut amounts: impl Iterator<Item = Money>,
    field: &'static str,
) -> Result<Money, OrderError> {
    amounts.try_fold(Money::zero(), |acc, m| {
        acc.checked_add(m)
            .ok_or(OrderError::AmountOutOfRange { field })
    })
}
