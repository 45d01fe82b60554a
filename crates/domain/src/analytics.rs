//! Profit analytics over committed orders.

use std::collections::BTreeMap;

use common::Money;
use serde::Serialize;

use crate::order::{Order, OrderStatus};

/// Per-day revenue and profit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProfit {
    pub revenue: Money,
    pub cost: Money,
    pub profit: Money,
    pub order_count: u64,
}

/// Revenue, cost and profit across non-cancelled orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitSummary {
    pub total_revenue: Money,
    pub total_cost: Money,
    pub total_profit: Money,
    /// Mean of the per-order margins, two decimals.
    pub average_profit_margin: f64,
    pub order_count: u64,
    /// Keyed by UTC calendar day (`YYYY-MM-DD`).
    pub profit_by_day: BTreeMap<String, DailyProfit>,
}

impl ProfitSummary {
    /// Folds orders into a summary. Cancelled orders are skipped.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut summary = ProfitSummary::default();
        let mut margin_sum = 0.0;

        for order in orders
            .into_iter()
            .filter(|o| o.status() != OrderStatus::Cancelled)
        {
            let f = order.financials();
            summary.total_revenue = summary.total_revenue.saturating_add(f.total);
            summary.total_cost = summary.total_cost.saturating_add(f.total_cost);
            summary.total_profit = summary.total_profit.saturating_add(f.total_profit);
            summary.order_count += 1;
            margin_sum += f.profit_margin;

            let day = order.created_at().format("%Y-%m-%d").to_string();
            let daily = summary.profit_by_day.entry(day).or_default();
            daily.revenue = daily.revenue.saturating_add(f.total);
            daily.cost = daily.cost.saturating_add(f.total_cost);
            daily.profit = daily.profit.saturating_add(f.total_profit);
            daily.order_count += 1;
        }

        if summary.order_count > 0 {
            let mean = margin_sum / summary.order_count as f64;
            summary.average_profit_margin = (mean * 100.0).round() / 100.0;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use common::OrderId;

    use super::*;
    use crate::catalog::Product;
    use crate::order::{OrderDraft, PaymentMethod};
    use crate::pricing::{OrderFinancials, price_line};

    fn order(price: i64, cost: i64, qty: i64, day: u32) -> Order {
        let product = Product::new(
            "Item",
            Money::from_cents(price),
            Money::from_cents(cost),
            "General",
            100,
        );
        let items = vec![price_line(&product, qty, None).unwrap()];
        let financials = OrderFinancials::compute(&items, Money::zero(), Money::zero()).unwrap();
        let draft = OrderDraft {
            items,
            financials,
            payment_method: PaymentMethod::Card,
            customer: None,
            created_by: "u1".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        Order::from_draft(OrderId::new(), draft, format!("ORD-{day}"), at)
    }

    #[test]
    fn empty_input_gives_zero_summary() {
        let summary = ProfitSummary::from_orders(std::iter::empty());
        assert_eq!(summary.order_count, 0);
        assert_eq!(summary.average_profit_margin, 0.0);
        assert!(summary.profit_by_day.is_empty());
    }

    #[test]
    fn cancelled_orders_are_excluded() {
        let kept = order(1000, 500, 2, 1);
        let mut cancelled = order(1000, 500, 5, 1);
        cancelled
            .transition(OrderStatus::Cancelled, Utc::now())
            .unwrap();

        let summary = ProfitSummary::from_orders([&kept, &cancelled]);
        assert_eq!(summary.order_count, 1);
        assert_eq!(summary.total_revenue.cents(), 2000);
        assert_eq!(summary.total_cost.cents(), 1000);
        assert_eq!(summary.total_profit.cents(), 1000);
        assert_eq!(summary.average_profit_margin, 100.0);
    }

    #[test]
    fn groups_by_day_and_averages_margins() {
        let a = order(1000, 500, 1, 1); // margin 100
        let b = order(1500, 1000, 1, 1); // margin 50
        let c = order(400, 300, 3, 2); // margin 33.33

        let summary = ProfitSummary::from_orders([&a, &b, &c]);
        assert_eq!(summary.order_count, 3);
        assert_eq!(summary.average_profit_margin, 61.11);

        let first = summary.profit_by_day["2024-03-01"];
        assert_eq!(first.order_count, 2);
        assert_eq!(first.revenue.cents(), 2500);
        assert_eq!(first.profit.cents(), 1000);
        assert_eq!(summary.profit_by_day["2024-03-02"].cost.cents(), 900);
    }
}
