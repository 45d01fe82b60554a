use common::{Money, OrderId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{OrderFinancials, Order, OrderDraft, PaymentMethod, Product, ProfitSummary, price_line};

fn catalog(n: usize) -> Vec<Product> {
    (0..n)
        .map(|i| {
            Product::new(
                format!("Product {i}"),
                Money::from_cents(100 + i as i64 * 7),
                Money::from_cents(60 + i as i64 * 5),
                "Bench",
                1_000,
            )
        })
        .collect()
}

fn bench_price_cart(c: &mut Criterion) {
    let products = catalog(25);

    c.bench_function("pricing/price_25_line_cart", |b| {
        b.iter(|| {
            let items: Vec<_> = products
                .iter()
                .enumerate()
                .map(|(i, p)| price_line(p, (i % 4 + 1) as i64, None).unwrap())
                .collect();
            OrderFinancials::compute(&items, Money::from_cents(250), Money::from_cents(100))
                .unwrap()
        });
    });
}

fn bench_profit_summary(c: &mut Criterion) {
    let products = catalog(5);
    let orders: Vec<Order> = (0..1_000)
        .map(|i| {
            let items: Vec<_> = products
                .iter()
                .map(|p| price_line(p, (i % 3 + 1) as i64, None).unwrap())
                .collect();
            let financials =
                OrderFinancials::compute(&items, Money::zero(), Money::zero()).unwrap();
            let draft = OrderDraft {
                items,
                financials,
                payment_method: PaymentMethod::Cash,
                customer: None,
                created_by: "bench".to_string(),
            };
            Order::from_draft(OrderId::new(), draft, format!("ORD-BENCH-{i:06}"), chrono::Utc::now())
        })
        .collect();

    c.bench_function("analytics/summarize_1000_orders", |b| {
        b.iter(|| ProfitSummary::from_orders(&orders));
    });
}

criterion_group!(benches, bench_price_cart, bench_profit_summary);
criterion_main!(benches);
