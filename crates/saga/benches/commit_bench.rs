use std::sync::Arc;

use common::Money;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{PaymentMethod, Product};
use saga::{CartLine, CartRequest, CommitCoordinator, CustomerInput, OrderNumberGenerator, StatusTransition};
use store::InMemoryStore;

fn setup(rt: &tokio::runtime::Runtime, lines: usize) -> (InMemoryStore, Vec<Product>) {
    let store = InMemoryStore::new();
    let products: Vec<Product> = (0..lines)
        .map(|i| {
            Product::new(
                format!("Product {i}"),
                Money::from_cents(250),
                Money::from_cents(180),
                "Bench",
                i64::MAX / 2,
            )
        })
        .collect();
    rt.block_on(async {
        for product in &products {
            store.insert_product(product.clone()).await;
        }
    });
    (store, products)
}

fn cart(products: &[Product]) -> CartRequest {
    let subtotal = Money::from_cents(250 * products.len() as i64);
    CartRequest {
        lines: products.iter().map(|p| CartLine::new(p.id, 1)).collect(),
        subtotal,
        tax: Money::zero(),
        discount: Money::zero(),
        total: subtotal,
        payment_method: PaymentMethod::Cash,
        customer: CustomerInput::default(),
        user_id: Some("bench".to_string()),
    }
}

fn bench_commit_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, products) = setup(&rt, 1);
    let coordinator = CommitCoordinator::new(store, Arc::new(OrderNumberGenerator::default()));

    c.bench_function("commit/single_line", |b| {
        b.iter(|| {
            rt.block_on(async { coordinator.commit(cart(&products)).await.unwrap() });
        });
    });
}

fn bench_commit_ten_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, products) = setup(&rt, 10);
    let coordinator = CommitCoordinator::new(store, Arc::new(OrderNumberGenerator::default()));

    c.bench_function("commit/ten_lines", |b| {
        b.iter(|| {
            rt.block_on(async { coordinator.commit(cart(&products)).await.unwrap() });
        });
    });
}

fn bench_commit_then_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, products) = setup(&rt, 3);
    let coordinator =
        CommitCoordinator::new(store.clone(), Arc::new(OrderNumberGenerator::default()));
    let status = StatusTransition::new(store);

    c.bench_function("commit/commit_then_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let outcome = coordinator.commit(cart(&products)).await.unwrap();
                status.cancel(outcome.order.id()).await.unwrap()
            });
        });
    });
}

criterion_group!(
    benches,
    bench_commit_single_line,
    bench_commit_ten_lines,
    bench_commit_then_cancel
);
criterion_main!(benches);
