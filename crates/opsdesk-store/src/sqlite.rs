//! SQLite execution layer for the relational store.
//!
//! The store is opened read-only in production; the read-write constructors
//! exist for seeding demo data and for tests. Every statement passes a
//! SELECT-only gate before it reaches the engine, below the generation
//! loop's own validator.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use tracing::info;

use opsdesk_core::{ExecutionResult, Row};

use crate::StoreError;

/// Hard cap on rows returned by a single statement.
pub const MAX_RESULT_ROWS: usize = 200;

/// Relational store backed by SQLite.
///
/// Safe for concurrent readers; the connection is serialized behind a mutex
/// since each query is cheap and strictly sequential within a pipeline.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    schema_cache: Mutex<Option<String>>,
}

impl SqliteStore {
    /// Open an in-memory database (read-write; tests and demos).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_conn(Connection::open_in_memory()?))
    }

    /// Open or create a read-write database at the given path (seeding only).
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_conn(Connection::open(path)?))
    }

    /// Open an existing database read-only. This is the production mode:
    /// the engine itself refuses writes regardless of statement content.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self::from_conn(conn))
    }

    fn from_conn(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            schema_cache: Mutex::new(None),
        }
    }

    /// Execute a single read-only SELECT and collect rows up to
    /// [`MAX_RESULT_ROWS`], preserving engine column order.
    pub fn run_select(&self, sql: &str) -> Result<ExecutionResult, StoreError> {
        let sql = gate_select(sql)?;

        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut result = ExecutionResult::empty(columns.clone());
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if result.rows.len() >= MAX_RESULT_ROWS {
                break;
            }
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), value_to_json(row.get_ref(idx)?));
            }
            result.rows.push(record);
        }

        info!(rows = result.rows.len(), "executed statement");
        Ok(result)
    }

    /// Render `Table name (col type, …)` lines for prompt construction.
    /// Cached after the first read; the schema is static in read-only mode.
    pub fn schema_summary(&self) -> Result<String, StoreError> {
        {
            let cache = self.schema_cache.lock().expect("store mutex poisoned");
            if let Some(summary) = cache.as_ref() {
                return Ok(summary.clone());
            }
        }

        let summary = {
            let conn = self.conn.lock().expect("store mutex poisoned");
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let tables: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            let mut lines = Vec::with_capacity(tables.len());
            for table in &tables {
                let mut cols_stmt =
                    conn.prepare(&format!("PRAGMA table_info('{table}')"))?;
                let cols: Vec<String> = cols_stmt
                    .query_map([], |row| {
                        let name: String = row.get(1)?;
                        let kind: String = row.get(2)?;
                        Ok(format!("{name} {kind}"))
                    })?
                    .collect::<Result<_, _>>()?;
                lines.push(format!("Table {table} ({})", cols.join(", ")));
            }
            lines.join("\n")
        };

        let mut cache = self.schema_cache.lock().expect("store mutex poisoned");
        *cache = Some(summary.clone());
        Ok(summary)
    }

    /// Run a raw SQL script (read-write connections only; seeding and tests).
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Create and populate the demo retail schema: customers with PII
    /// columns, products, orders, and order items, with order totals derived
    /// from the items.
    pub fn seed_demo(&self) -> Result<(), StoreError> {
        self.execute_batch(DEMO_SCHEMA)?;
        self.execute_batch(DEMO_ROWS)?;
        self.schema_cache
            .lock()
            .expect("store mutex poisoned")
            .take();
        info!("seeded demo store");
        Ok(())
    }
}

/// Reject anything that is not a single SELECT before it reaches the engine.
fn gate_select(sql: &str) -> Result<&str, StoreError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.contains(';') {
        return Err(StoreError::MultipleStatements);
    }
    let lowered = trimmed.to_ascii_lowercase();
    if !(lowered.starts_with("select") || lowered.starts_with("with")) {
        return Err(StoreError::NotSelect);
    }
    Ok(trimmed)
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(String::from_utf8_lossy(blob).into_owned()),
    }
}

const DEMO_SCHEMA: &str = "
    DROP TABLE IF EXISTS order_items;
    DROP TABLE IF EXISTS orders;
    DROP TABLE IF EXISTS products;
    DROP TABLE IF EXISTS customers;

    CREATE TABLE customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        address TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        price REAL NOT NULL,
        stock_level INTEGER NOT NULL
    );

    CREATE TABLE orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL,
        order_date TEXT NOT NULL,
        total_amount REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        FOREIGN KEY(customer_id) REFERENCES customers(id)
    );

    CREATE TABLE order_items (
        order_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price REAL NOT NULL,
        FOREIGN KEY(order_id) REFERENCES orders(id),
        FOREIGN KEY(product_id) REFERENCES products(id)
    );
";

const DEMO_ROWS: &str = "
    INSERT INTO customers (name, email, phone, address, created_at) VALUES
        ('Alice Smith', 'alice@example.com', '555-123-0001', '123 Main St, Springfield', date('now', '-300 days')),
        ('Bob Johnson', 'bob.j@example.com', '555-123-0002', '456 Oak Ave, Metropolis', date('now', '-200 days')),
        ('Charlie Brown', 'charlie.brown@example.com', '555-123-0003', '789 Pine Rd, Smallville', date('now', '-150 days')),
        ('Dana Lee', 'dana.lee@example.com', '555-123-0004', '321 Birch Blvd, Gotham', date('now', '-90 days')),
        ('Evan Wright', 'evan.w@example.com', '555-123-0005', '654 Cedar St, Star City', date('now', '-30 days'));

    INSERT INTO products (name, category, price, stock_level) VALUES
        ('T-shirt', 'Apparel', 25.00, 200),
        ('Jeans', 'Apparel', 60.00, 120),
        ('Sneakers', 'Footwear', 90.00, 80),
        ('Backpack', 'Accessories', 45.00, 50),
        ('Water Bottle', 'Accessories', 15.00, 300);

    INSERT INTO orders (customer_id, order_date, total_amount, status) VALUES
        (1, date('now', '-40 days'), 0, 'shipped'),
        (1, date('now', '-10 days'), 0, 'processing'),
        (2, date('now', '-70 days'), 0, 'delivered'),
        (3, date('now', '-15 days'), 0, 'shipped'),
        (4, date('now', '-5 days'), 0, 'processing'),
        (5, date('now', '-2 days'), 0, 'pending');

    INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES
        (1, 1, 2, 25.00),
        (1, 5, 3, 15.00),
        (2, 2, 1, 60.00),
        (2, 3, 1, 90.00),
        (3, 1, 1, 25.00),
        (3, 2, 2, 60.00),
        (4, 4, 1, 45.00),
        (4, 5, 2, 15.00),
        (5, 1, 3, 25.00),
        (5, 3, 1, 90.00),
        (6, 2, 1, 60.00),
        (6, 4, 1, 45.00);

    UPDATE orders
    SET total_amount = (
        SELECT SUM(quantity * unit_price)
        FROM order_items
        WHERE order_items.order_id = orders.id
    );
";
