// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scoped transactions
//!
//! A [`Transaction`] guard opens a scope on creation and rolls back on
//! drop unless committed. Nested guards open savepoints, so an inner
//! failure rolls back to its savepoint without disturbing the outer
//! transaction. Reads outside any scope use the store's implicit read
//! transaction; single-statement writes outside a scope auto-commit.

use crate::error::Result;
use crate::graph::Graph;
use log::warn;

/// RAII transaction scope over a [`Graph`]
pub struct Transaction<'g> {
    graph: &'g Graph,
    finished: bool,
}

impl Graph {
    /// Open an explicit transaction (or a savepoint when nested)
    pub fn begin(&self) -> Result<()> {
        self.store.begin().map(|_| ())
    }

    /// Commit the innermost open scope
    pub fn commit(&self) -> Result<()> {
        self.store.commit()
    }

    /// Roll back the innermost open scope
    pub fn rollback(&self) -> Result<()> {
        self.store.rollback()
    }

    /// Whether an explicit transaction scope is open
    pub fn in_transaction(&self) -> bool {
        self.store.in_transaction()
    }

    /// Acquire a scoped transaction; commit on [`Transaction::commit`],
    /// automatic rollback on drop.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        self.store.begin()?;
        Ok(Transaction {
            graph: self,
            finished: false,
        })
    }
}

impl Transaction<'_> {
    /// Commit this scope
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.graph.store.commit()
    }

    /// Roll back this scope explicitly
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.graph.store.rollback()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(error) = self.graph.store.rollback() {
                warn!("rollback on drop failed: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Properties;

    #[test]
    fn test_drop_rolls_back() {
        let graph = Graph::open_in_memory().unwrap();
        {
            let _tx = graph.transaction().unwrap();
            graph.create_node(&["Temp"], Properties::new()).unwrap();
            // dropped without commit
        }
        assert_eq!(graph.node_count().unwrap(), 0);
    }

    #[test]
    fn test_commit_persists() {
        let graph = Graph::open_in_memory().unwrap();
        let tx = graph.transaction().unwrap();
        graph.create_node(&["Kept"], Properties::new()).unwrap();
        tx.commit().unwrap();
        assert_eq!(graph.node_count().unwrap(), 1);
    }

    #[test]
    fn test_nested_scope_rolls_back_to_savepoint() {
        let graph = Graph::open_in_memory().unwrap();
        let outer = graph.transaction().unwrap();
        graph.create_node(&["Outer"], Properties::new()).unwrap();
        {
            let _inner = graph.transaction().unwrap();
            graph.create_node(&["Inner"], Properties::new()).unwrap();
            // inner dropped → rolled back to the savepoint
        }
        outer.commit().unwrap();
        assert_eq!(graph.node_count().unwrap(), 1);
        let survivors = graph
            .match_nodes(&["Outer"], &Properties::new())
            .unwrap();
        assert_eq!(survivors.len(), 1);
    }
}
