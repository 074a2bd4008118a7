//! Shared fakes and fixtures for unit and integration tests.
//!
//! `MemoryCatalog` stands in for live `information_schema` introspection;
//! `RecordingRunner` captures psql scripts instead of spawning processes.

use crate::config::{Config, Endpoint};
use crate::error::SyncError;
use crate::introspect::{ColumnInfo, DependentRef, SchemaSource, SupporterRef};
use crate::psql::ScriptRunner;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct ForeignKey {
    dependent_table: String,
    dependent_col: String,
    supporter_table: String,
    supporter_col: String,
}

/// In-memory FK catalog implementing [`SchemaSource`].
#[derive(Default)]
pub struct MemoryCatalog {
    foreign_keys: Vec<ForeignKey>,
    columns: BTreeMap<String, Vec<String>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dependent_table.dependent_col -> supporter_table.supporter_col`.
    pub fn with_fk(
        mut self,
        dependent_table: &str,
        dependent_col: &str,
        supporter_table: &str,
        supporter_col: &str,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            dependent_table: dependent_table.to_string(),
            dependent_col: dependent_col.to_string(),
            supporter_table: supporter_table.to_string(),
            supporter_col: supporter_col.to_string(),
        });
        self
    }

    pub fn with_columns(mut self, table: &str, columns: &[&str]) -> Self {
        self.columns.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl SchemaSource for MemoryCatalog {
    async fn dependents_of(&self, table: &str) -> Result<Vec<DependentRef>> {
        Ok(self
            .foreign_keys
            .iter()
            .filter(|fk| fk.supporter_table == table)
            .map(|fk| DependentRef {
                dependent_table: fk.dependent_table.clone(),
                dependent_col: fk.dependent_col.clone(),
                supporter_col: fk.supporter_col.clone(),
            })
            .collect())
    }

    async fn supporters_of(&self, table: &str) -> Result<Vec<SupporterRef>> {
        Ok(self
            .foreign_keys
            .iter()
            .filter(|fk| fk.dependent_table == table)
            .map(|fk| SupporterRef {
                dependent_table: fk.dependent_table.clone(),
                dependent_col: fk.dependent_col.clone(),
                supporter_table: fk.supporter_table.clone(),
                supporter_col: fk.supporter_col.clone(),
            })
            .collect())
    }

    async fn columns_of(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self
            .columns
            .get(table)
            .map(|cols| {
                cols.iter()
                    .map(|name| ColumnInfo {
                        name: name.clone(),
                        is_nullable: name != "id",
                        data_type: "integer".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Schema of `users(id)` and `orders(id, user_id -> users.id)`.
pub fn users_orders_catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_fk("orders", "user_id", "users", "id")
        .with_columns("users", &["id", "email"])
        .with_columns("orders", &["id", "user_id", "total"])
}

/// The users/orders schema plus `products(id)` and
/// `order_items(order_id -> orders.id, product_id -> products.id)`.
pub fn storefront_catalog() -> MemoryCatalog {
    users_orders_catalog()
        .with_fk("order_items", "order_id", "orders", "id")
        .with_fk("order_items", "product_id", "products", "id")
        .with_columns("products", &["id", "sku"])
        .with_columns("order_items", &["id", "order_id", "product_id"])
}

/// [`ScriptRunner`] that records `(db_name, script)` pairs. Optionally fails
/// any script containing a marker, for exercising error paths.
#[derive(Default)]
pub struct RecordingRunner {
    scripts: Mutex<Vec<(String, String)>>,
    fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(needle: &str) -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            fail_on: Some(needle.to_string()),
        }
    }

    pub fn recorded(&self) -> Vec<(String, String)> {
        self.scripts.lock().expect("script log poisoned").clone()
    }
}

#[async_trait]
impl ScriptRunner for RecordingRunner {
    async fn run_script(&self, endpoint: &Endpoint, script: &str) -> Result<()> {
        self.scripts
            .lock()
            .expect("script log poisoned")
            .push((endpoint.db_name.clone(), script.to_string()));
        if let Some(needle) = &self.fail_on {
            if script.contains(needle.as_str()) {
                return Err(SyncError::Psql { code: 3 }.into());
            }
        }
        Ok(())
    }
}

fn test_endpoint(db_name: &str, port: u16) -> Endpoint {
    Endpoint {
        host: "localhost".to_string(),
        port,
        db_name: db_name.to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        ssl_enabled: false,
    }
}

/// Config pointing at two local throwaway databases.
pub fn test_config() -> Config {
    Config {
        source: test_endpoint("source_db", 5432),
        destination: test_endpoint("destination_db", 5433),
    }
}
