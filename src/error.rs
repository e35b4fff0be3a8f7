// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Crate-wide error types

use thiserror::Error;

/// Errors surfaced by Grafito operations
#[derive(Error, Debug)]
pub enum GrafitoError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Query execution error: {0}")]
    QueryExecution(String),

    #[error("Import error: {0}")]
    Import(String),
}

impl GrafitoError {
    /// Build a location-tagged parse error
    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        GrafitoError::Parse {
            line,
            column,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for GrafitoError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                GrafitoError::ConstraintViolation(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violated".to_string()),
                )
            }
            _ => GrafitoError::Storage(error.to_string()),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GrafitoError>;
