use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{BookId, CartSnapshot, CheckoutService, Money, UserId, plan_checkout};
use store::{BookstoreStore, CartLine, InMemoryStore, NewBook};

fn snapshot_with_lines(count: i64) -> CartSnapshot {
    let lines = (1..=count)
        .map(|id| CartLine {
            book_id: BookId::new(id),
            quantity: 2,
            title: format!("Book {id}"),
            price: Money::from_cents(1000 + id),
            stock_quantity: 100,
            book_version: 1,
        })
        .collect();
    CartSnapshot::from_lines(UserId::new(1), lines)
}

fn bench_plan_checkout(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout/plan");
    for lines in [1, 10, 100] {
        let snapshot = snapshot_with_lines(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &snapshot, |b, snapshot| {
            b.iter(|| plan_checkout(snapshot, Utc::now()).unwrap());
        });
    }
    group.finish();
}

fn bench_full_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = CheckoutService::new(InMemoryStore::new());
    let user_id = UserId::new(1);
    let books: Vec<BookId> = rt.block_on(async {
        let mut ids = Vec::new();
        for i in 0..5 {
            let id = service
                .store()
                .insert_book(NewBook::new(
                    format!("Bench Book {i}"),
                    Money::from_cents(1500),
                    u32::MAX,
                ))
                .await
                .unwrap();
            ids.push(id);
        }
        ids
    });

    c.bench_function("checkout/in_memory_5_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                for book in &books {
                    service.store().set_cart_item(user_id, *book, 1).await.unwrap();
                }
                service.checkout(user_id).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_plan_checkout, bench_full_checkout);
criterion_main!(benches);
