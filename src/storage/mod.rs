// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage layer: SQLite schema, connection/transaction management and
//! the value codec

pub mod schema;
pub mod store;
pub mod types;
pub mod value;

pub use store::Store;
pub use types::{Direction, EntityKind, Node, Path, Relationship};
pub use value::{Crs, DurationValue, PointValue, Value, ZonedTime};
