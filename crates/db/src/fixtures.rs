use sqlx::Row;

use crate::connection::DbPool;

struct DemoCustomer {
    id: i64,
    name: &'static str,
    email: &'static str,
    balance: f64,
}

struct DemoProduct {
    id: i64,
    name: &'static str,
    category: &'static str,
    price: f64,
}

struct DemoTransaction {
    id: i64,
    customer_id: i64,
    product_id: i64,
    quantity: i64,
    date: &'static str,
}

const CUSTOMERS: &[DemoCustomer] = &[
    DemoCustomer { id: 1, name: "Ana Costa", email: "ana.costa@example.com", balance: 1500.0 },
    DemoCustomer { id: 2, name: "Joao Silva", email: "joao.silva@example.com", balance: 300.0 },
    DemoCustomer { id: 3, name: "Maria Souza", email: "maria.souza@example.com", balance: 4200.0 },
    DemoCustomer { id: 4, name: "Pedro Lima", email: "pedro.lima@example.com", balance: 800.0 },
    DemoCustomer { id: 5, name: "Carla Dias", email: "carla.dias@example.com", balance: 2600.0 },
];

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct { id: 1, name: "Notebook", category: "Eletronicos", price: 3500.0 },
    DemoProduct { id: 2, name: "Smartphone", category: "Eletronicos", price: 2200.0 },
    DemoProduct { id: 3, name: "Fone de Ouvido", category: "Acessorios", price: 250.0 },
    DemoProduct { id: 4, name: "Cadeira Gamer", category: "Moveis", price: 1200.0 },
    DemoProduct { id: 5, name: "Monitor", category: "Eletronicos", price: 1100.0 },
];

const TRANSACTIONS: &[DemoTransaction] = &[
    DemoTransaction { id: 1, customer_id: 1, product_id: 1, quantity: 1, date: "2024-01-15" },
    DemoTransaction { id: 2, customer_id: 2, product_id: 3, quantity: 2, date: "2024-01-20" },
    DemoTransaction { id: 3, customer_id: 3, product_id: 1, quantity: 1, date: "2024-02-02" },
    DemoTransaction { id: 4, customer_id: 3, product_id: 2, quantity: 1, date: "2024-02-10" },
    DemoTransaction { id: 5, customer_id: 4, product_id: 5, quantity: 1, date: "2024-03-05" },
    DemoTransaction { id: 6, customer_id: 5, product_id: 1, quantity: 1, date: "2024-03-18" },
    DemoTransaction { id: 7, customer_id: 1, product_id: 3, quantity: 1, date: "2024-04-01" },
    DemoTransaction { id: 8, customer_id: 5, product_id: 4, quantity: 2, date: "2024-04-22" },
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub customers: usize,
    pub products: usize,
    pub transactions: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Customers, products and purchases used by the `demo` command and the tests.
pub struct DemoDataset;

impl DemoDataset {
    /// Inserts the dataset. Rows keep fixed ids, so loading twice is a no-op.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        for customer in CUSTOMERS {
            sqlx::query(
                "INSERT OR IGNORE INTO clientes (id, nome, email, saldo) VALUES (?, ?, ?, ?)",
            )
            .bind(customer.id)
            .bind(customer.name)
            .bind(customer.email)
            .bind(customer.balance)
            .execute(&mut *tx)
            .await?;
        }

        for product in PRODUCTS {
            sqlx::query(
                "INSERT OR IGNORE INTO produtos (id, nome, categoria, preco) VALUES (?, ?, ?, ?)",
            )
            .bind(product.id)
            .bind(product.name)
            .bind(product.category)
            .bind(product.price)
            .execute(&mut *tx)
            .await?;
        }

        for transaction in TRANSACTIONS {
            let unit_price = PRODUCTS
                .iter()
                .find(|product| product.id == transaction.product_id)
                .map(|product| product.price)
                .unwrap_or_default();
            sqlx::query(
                "INSERT OR IGNORE INTO transacoes
                    (id, cliente_id, produto_id, quantidade, valor_total, data_transacao)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(transaction.id)
            .bind(transaction.customer_id)
            .bind(transaction.product_id)
            .bind(transaction.quantity)
            .bind(unit_price * transaction.quantity as f64)
            .bind(transaction.date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(SeedResult {
            customers: CUSTOMERS.len(),
            products: PRODUCTS.len(),
            transactions: TRANSACTIONS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, sqlx::Error> {
        let expectations: [(&'static str, &'static str, usize); 3] = [
            ("clientes_seeded", "SELECT COUNT(*) AS count FROM clientes", CUSTOMERS.len()),
            ("produtos_seeded", "SELECT COUNT(*) AS count FROM produtos", PRODUCTS.len()),
            ("transacoes_seeded", "SELECT COUNT(*) AS count FROM transacoes", TRANSACTIONS.len()),
        ];

        let mut checks = Vec::with_capacity(expectations.len());
        for (check, sql, expected) in expectations {
            let count = sqlx::query(sql).fetch_one(pool).await?.get::<i64, _>("count");
            checks.push((check, usize::try_from(count).is_ok_and(|count| count >= expected)));
        }

        Ok(VerificationResult { all_present: checks.iter().all(|(_, passed)| *passed), checks })
    }
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::DemoDataset;
    use crate::{connect_with_settings, migrations};

    async fn seeded_pool() -> crate::DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        DemoDataset::load(&pool).await.expect("seed");
        pool
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifiable() {
        let pool = seeded_pool().await;
        let second = DemoDataset::load(&pool).await.expect("second seed");
        assert_eq!(second.customers, 5);

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "checks: {:?}", verification.checks);

        let count = sqlx::query("SELECT COUNT(*) AS count FROM clientes")
            .fetch_one(&pool)
            .await
            .expect("count customers")
            .get::<i64, _>("count");
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn three_customers_bought_a_notebook() {
        let pool = seeded_pool().await;

        let buyers = sqlx::query(
            "SELECT COUNT(DISTINCT t.cliente_id) AS count
             FROM transacoes t JOIN produtos p ON p.id = t.produto_id
             WHERE p.nome = 'Notebook'",
        )
        .fetch_one(&pool)
        .await
        .expect("count notebook buyers")
        .get::<i64, _>("count");
        assert_eq!(buyers, 3);
    }

    #[tokio::test]
    async fn transaction_totals_follow_product_prices() {
        let pool = seeded_pool().await;

        let total = sqlx::query("SELECT valor_total FROM transacoes WHERE id = 8")
            .fetch_one(&pool)
            .await
            .expect("load transaction")
            .get::<f64, _>("valor_total");
        assert_eq!(total, 2400.0);
    }
}
