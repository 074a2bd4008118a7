//! Error cases the orchestrator and exit-code mapping must tell apart.
//!
//! Everything else propagates as `anyhow` context chains naming the
//! component and table involved.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The driver could not reach an endpoint during introspection.
    #[error("cannot connect to {role} database {endpoint}: {source}")]
    Connection {
        role: &'static str,
        endpoint: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// Kahn's algorithm could not order every discovered table, so the
    /// foreign-key graph contains a cycle.
    #[error("foreign key cycle detected: only {sorted} of {total} tables could be ordered")]
    Cycle { sorted: usize, total: usize },

    /// A psql child process exited non-zero. The code is forwarded as the
    /// process exit code.
    #[error("psql exited with code {code}")]
    Psql { code: i32 },
}

impl SyncError {
    /// Process exit code for this error. psql failures forward the child's
    /// own code; everything else is a plain runtime failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Psql { code } => *code,
            _ => 1,
        }
    }
}
