// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connection wrapper and transaction state
//!
//! A single writer guards the SQLite connection behind a mutex. Explicit
//! transactions use BEGIN/COMMIT/ROLLBACK; nested scopes map to
//! savepoints named by depth. Reads outside a scope run in SQLite's
//! autocommit mode, which is the implicit read transaction.

use crate::config::GraphConfig;
use crate::error::{GrafitoError, Result};
use crate::storage::schema;
use log::debug;
use parking_lot::Mutex;
use rusqlite::Connection;

/// Transaction nesting state
#[derive(Debug, Default)]
struct TxnState {
    /// 0 = autocommit; 1 = open transaction; >1 = savepoint depth
    depth: usize,
}

/// SQLite-backed store shared by every subsystem
pub struct Store {
    conn: Mutex<Connection>,
    txn: Mutex<TxnState>,
}

impl Store {
    /// Open (and initialize) the database described by `config`
    pub fn open(config: &GraphConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        schema::initialize(&conn, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            txn: Mutex::new(TxnState::default()),
        })
    }

    /// Run `f` with the connection lock held
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Whether an explicit transaction (or savepoint scope) is open
    pub fn in_transaction(&self) -> bool {
        self.txn.lock().depth > 0
    }

    /// Open a transaction, or a savepoint when one is already open.
    /// Returns the depth of the new scope.
    pub fn begin(&self) -> Result<usize> {
        let mut state = self.txn.lock();
        let conn = self.conn.lock();
        let depth = state.depth + 1;
        if depth == 1 {
            conn.execute_batch("BEGIN")?;
            debug!("begin transaction");
        } else {
            conn.execute_batch(&format!("SAVEPOINT sp_{depth}"))?;
            debug!("begin savepoint sp_{depth}");
        }
        state.depth = depth;
        Ok(depth)
    }

    /// Commit the innermost scope
    pub fn commit(&self) -> Result<()> {
        let mut state = self.txn.lock();
        if state.depth == 0 {
            return Err(GrafitoError::Transaction(
                "commit outside of a transaction".to_string(),
            ));
        }
        let conn = self.conn.lock();
        if state.depth == 1 {
            conn.execute_batch("COMMIT")?;
            debug!("commit transaction");
        } else {
            conn.execute_batch(&format!("RELEASE sp_{}", state.depth))?;
            debug!("release savepoint sp_{}", state.depth);
        }
        state.depth -= 1;
        Ok(())
    }

    /// Roll back the innermost scope; an inner rollback leaves the outer
    /// transaction open.
    pub fn rollback(&self) -> Result<()> {
        let mut state = self.txn.lock();
        if state.depth == 0 {
            return Err(GrafitoError::Transaction(
                "rollback outside of a transaction".to_string(),
            ));
        }
        let conn = self.conn.lock();
        if state.depth == 1 {
            conn.execute_batch("ROLLBACK")?;
            debug!("rollback transaction");
        } else {
            let depth = state.depth;
            conn.execute_batch(&format!("ROLLBACK TO sp_{depth}; RELEASE sp_{depth}"))?;
            debug!("rollback to savepoint sp_{depth}");
        }
        state.depth -= 1;
        Ok(())
    }

    /// Run `f` inside the current transaction if one is open, otherwise
    /// inside a fresh auto-committed one. Errors roll the scope back.
    pub fn in_write_scope<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(error) => {
                // Preserve the original error even if the rollback fails.
                let _ = self.rollback();
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> Store {
        Store::open(&GraphConfig::in_memory()).expect("open in-memory store")
    }

    #[test]
    fn test_begin_commit_depth() {
        let store = memory_store();
        assert!(!store.in_transaction());
        store.begin().unwrap();
        assert!(store.in_transaction());
        store.begin().unwrap(); // savepoint
        store.commit().unwrap();
        assert!(store.in_transaction());
        store.commit().unwrap();
        assert!(!store.in_transaction());
    }

    #[test]
    fn test_commit_outside_transaction_fails() {
        let store = memory_store();
        assert!(matches!(
            store.commit(),
            Err(GrafitoError::Transaction(_))
        ));
    }

    #[test]
    fn test_inner_rollback_preserves_outer_writes() {
        let store = memory_store();
        store.begin().unwrap();
        store
            .with_conn(|c| {
                c.execute("INSERT INTO nodes (properties) VALUES ('{}')", [])?;
                Ok(())
            })
            .unwrap();
        store.begin().unwrap();
        store
            .with_conn(|c| {
                c.execute("INSERT INTO nodes (properties) VALUES ('{}')", [])?;
                Ok(())
            })
            .unwrap();
        store.rollback().unwrap(); // inner savepoint gone
        store.commit().unwrap();
        let count: i64 = store
            .with_conn(|c| {
                Ok(c.query_row("SELECT count(*) FROM nodes", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
