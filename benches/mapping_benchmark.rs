use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use sql_fluent::prelude::*;
use tokio::runtime::Runtime;

#[derive(Deserialize)]
struct Order {
    id: i64,
    amount: f64,
    placed_at: String,
}

#[derive(Deserialize)]
struct Customer {
    id: i64,
    name: String,
}

// Deterministic orders and customers so runs are comparable
fn generate_inserts(num_rows: usize) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut sql = String::with_capacity(num_rows * 120);
    sql.push_str(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL, amount REAL, placed_at TEXT);\n",
    );
    let customers = (num_rows / 10).max(1);
    for id in 1..=customers {
        sql.push_str(&format!("INSERT INTO customers (id, name) VALUES ({id}, 'customer-{id}');\n"));
    }
    for id in 1..=num_rows {
        let customer = rng.random_range(1..=customers);
        let amount = rng.random_range(1.0..5000.0);
        let day = rng.random_range(1..=28);
        sql.push_str(&format!(
            "INSERT INTO orders (id, customer_id, amount, placed_at) VALUES ({id}, {customer}, {amount:.2}, '2024-03-{day:02} 12:00:00');\n"
        ));
    }
    sql
}

async fn seeded_session(num_rows: usize) -> Result<CommandSession, FluentDbError> {
    let mut session = CommandSession::connect(&ConnectionConfig::sqlite(":memory:")).await?;
    session
        .set_command(format!("BEGIN; {} COMMIT;", generate_inserts(num_rows)))
        .execute()
        .await?;
    Ok(session)
}

fn benchmark_materialization(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("materialize");

    for num_rows in [100_usize, 1_000, 10_000] {
        let mut session = rt
            .block_on(seeded_session(num_rows))
            .expect("seed benchmark database");

        group.bench_with_input(BenchmarkId::new("execute_list", num_rows), &num_rows, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let orders: Vec<Order> = session
                        .set_command("SELECT id, amount, placed_at FROM orders")
                        .execute_list()
                        .await
                        .expect("list orders");
                    orders.iter().map(|o| o.amount).sum::<f64>() + orders.len() as f64
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("execute_mapping", num_rows), &num_rows, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    session
                        .set_command(
                            "SELECT o.id, o.amount, o.placed_at, c.id, c.name
                             FROM orders o JOIN customers c ON c.id = o.customer_id",
                        )
                        .execute_mapping::<(Order, Customer), _, _>(
                            |o: Order, c: Customer| o.id + c.id + (o.placed_at.len() + c.name.len()) as i64,
                            "id",
                        )
                        .await
                        .expect("map orders")
                        .map(|row| row.expect("mapped row"))
                        .sum::<i64>()
                })
            });
        });

        rt.block_on(session.dispose());
    }

    group.finish();
}

criterion_group!(benches, benchmark_materialization);
criterion_main!(benches);
