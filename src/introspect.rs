//! Live schema introspection against `information_schema`.
//!
//! Foreign-key discovery runs one table at a time: `dependents_of` finds
//! every table whose FK references the given table, `supporters_of` finds
//! every table the given table references. The query templates are carried
//! verbatim from the deployed tool so log-grepping keeps working.

use crate::config::Endpoint;
use crate::error::SyncError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};

// Template text is part of the external contract, trailing whitespace
// included; do not reformat.
const DEPENDENT_QUERY: &str = "SELECT\n        tc.table_schema, \n        tc.constraint_name, \n        tc.table_name as \"tableName\", \n        kcu.column_name, \n        ccu.table_schema AS foreign_table_schema,\n        ccu.table_name AS foreign_table_name,\n        ccu.column_name AS foreign_column_name \n        FROM information_schema.table_constraints AS tc \n        JOIN information_schema.key_column_usage AS kcu\n        ON tc.constraint_name = kcu.constraint_name\n        AND tc.table_schema = kcu.table_schema\n        JOIN information_schema.constraint_column_usage AS ccu\n        ON ccu.constraint_name = tc.constraint_name\n        WHERE tc.constraint_type = 'FOREIGN KEY'\n        AND tc.table_schema='public'\n        AND ccu.table_name ='";

const SUPPORTER_QUERY: &str = "SELECT\n        tc.table_schema, \n        tc.constraint_name, \n        tc.table_name as \"tableName\", \n        kcu.column_name, \n        ccu.table_schema AS foreign_table_schema,\n        ccu.table_name AS foreign_table_name,\n        ccu.column_name AS foreign_column_name \n        FROM information_schema.table_constraints AS tc \n        JOIN information_schema.key_column_usage AS kcu\n        ON tc.constraint_name = kcu.constraint_name\n        AND tc.table_schema = kcu.table_schema\n        JOIN information_schema.constraint_column_usage AS ccu\n        ON ccu.constraint_name = tc.constraint_name\n        WHERE tc.constraint_type = 'FOREIGN KEY'\n        AND tc.table_schema='public'\n        AND tc.table_name ='";

const COLUMNS_QUERY: &str = r#"
        SELECT column_name, is_nullable, data_type
        FROM information_schema.columns WHERE table_name = '"#;

/// One FK constraint referencing the queried table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentRef {
    /// Table owning the FK column.
    pub dependent_table: String,
    /// FK column in the dependent.
    pub dependent_col: String,
    /// Referenced column in the queried table.
    pub supporter_col: String,
}

/// One FK constraint owned by the queried table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupporterRef {
    /// Table owning the FK column (the queried table).
    pub dependent_table: String,
    /// FK column in the dependent.
    pub dependent_col: String,
    /// Table the FK points at.
    pub supporter_table: String,
    /// Referenced column in the supporter.
    pub supporter_col: String,
}

/// Column metadata from `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub is_nullable: bool,
    pub data_type: String,
}

/// Schema catalog port. The production implementation queries
/// `information_schema` over tokio-postgres; tests supply an in-memory
/// catalog instead.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Every FK constraint whose referenced table is `table`.
    async fn dependents_of(&self, table: &str) -> Result<Vec<DependentRef>>;

    /// Every FK constraint whose owning table is `table`.
    async fn supporters_of(&self, table: &str) -> Result<Vec<SupporterRef>>;

    /// Column metadata for `table`, in live column order.
    async fn columns_of(&self, table: &str) -> Result<Vec<ColumnInfo>>;
}

/// `SchemaSource` backed by a live PostgreSQL connection.
pub struct PgSchemaSource {
    client: Client,
}

impl PgSchemaSource {
    /// Connect to an endpoint and keep the connection task running in the
    /// background.
    pub async fn connect(endpoint: &Endpoint, role: &'static str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(&endpoint.connection_string(), NoTls)
            .await
            .map_err(|source| SyncError::Connection {
                role,
                endpoint: endpoint.to_string(),
                source,
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {e}");
            }
        });

        Ok(Self { client })
    }
}

// Table names come back out of information_schema and from the CLI; quoting
// keeps an embedded quote from breaking the concatenated template.
fn quote_literal(table: &str) -> String {
    table.replace('\'', "''")
}

#[async_trait]
impl SchemaSource for PgSchemaSource {
    async fn dependents_of(&self, table: &str) -> Result<Vec<DependentRef>> {
        let query = format!("{DEPENDENT_QUERY}{}'", quote_literal(table));
        let rows = self
            .client
            .query(&query, &[])
            .await
            .with_context(|| format!("dependent introspection failed for \"{table}\""))?;

        Ok(rows
            .iter()
            .map(|row| DependentRef {
                dependent_table: row.get("tableName"),
                dependent_col: row.get("column_name"),
                supporter_col: row.get("foreign_column_name"),
            })
            .collect())
    }

    async fn supporters_of(&self, table: &str) -> Result<Vec<SupporterRef>> {
        let query = format!("{SUPPORTER_QUERY}{}'", quote_literal(table));
        let rows = self
            .client
            .query(&query, &[])
            .await
            .with_context(|| format!("supporter introspection failed for \"{table}\""))?;

        Ok(rows
            .iter()
            .map(|row| SupporterRef {
                dependent_table: row.get("tableName"),
                dependent_col: row.get("column_name"),
                supporter_table: row.get("foreign_table_name"),
                supporter_col: row.get("foreign_column_name"),
            })
            .collect())
    }

    async fn columns_of(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = format!("{COLUMNS_QUERY}{}'", quote_literal(table));
        let rows = self
            .client
            .query(&query, &[])
            .await
            .with_context(|| format!("column introspection failed for \"{table}\""))?;

        Ok(rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get("column_name"),
                is_nullable: row.get::<_, String>("is_nullable") == "YES",
                data_type: row.get("data_type"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependent_query_filters_on_referenced_table() {
        assert!(DEPENDENT_QUERY.contains("constraint_type = 'FOREIGN KEY'"));
        assert!(DEPENDENT_QUERY.contains("tc.table_schema='public'"));
        assert!(DEPENDENT_QUERY.trim_end().ends_with("ccu.table_name ='"));
    }

    #[test]
    fn test_supporter_query_filters_on_owning_table() {
        assert!(SUPPORTER_QUERY.trim_end().ends_with("tc.table_name ='"));
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("users"), "users");
        assert_eq!(quote_literal("o'clock"), "o''clock");
    }
}
