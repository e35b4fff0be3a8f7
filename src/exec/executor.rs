// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Clause executor
//!
//! Execution pipelines a stream of binding frames through the clauses of
//! a query. Evaluation is eager at clause boundaries; ORDER BY, DISTINCT
//! and aggregations materialize. A whole statement runs inside one write
//! scope, so execution errors never leave partial writes behind.

use crate::ast::{
    is_aggregate_name, Clause, Expr, Pattern, PatternDirection, Projection, Query, RemoveItem,
    SetItem, Statement,
};
use crate::error::{GrafitoError, Result};
use crate::exec::aggregate::Accumulator;
use crate::exec::eval::EvalContext;
use crate::exec::pattern::match_pattern;
use crate::exec::result::{QueryResult, Row};
use crate::exec::Frame;
use crate::graph::{Graph, Properties};
use crate::storage::Value;
use log::debug;
use std::collections::BTreeMap;

/// Tree-walking executor for a parsed statement
pub struct Executor<'g> {
    graph: &'g Graph,
    params: &'g BTreeMap<String, Value>,
}

impl<'g> Executor<'g> {
    pub fn new(graph: &'g Graph, params: &'g BTreeMap<String, Value>) -> Self {
        Self { graph, params }
    }

    fn ctx(&self) -> EvalContext<'g> {
        EvalContext::new(self.graph, self.params)
    }

    pub fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        match statement {
            Statement::Query(query) => self.run_query(query),
            Statement::CreateIndex {
                name,
                entity,
                label_or_type,
                property,
                unique,
                if_not_exists,
            } => {
                self.graph.create_index(
                    *entity,
                    label_or_type,
                    property,
                    *unique,
                    name.as_deref(),
                    *if_not_exists,
                )?;
                Ok(QueryResult::empty())
            }
            Statement::DropIndex { name, if_exists } => {
                self.graph.drop_index(name, *if_exists)?;
                Ok(QueryResult::empty())
            }
            Statement::CreateConstraint {
                name,
                kind,
                entity,
                label_or_type,
                property,
                value_type,
                if_not_exists,
            } => {
                self.graph.create_constraint(
                    *kind,
                    *entity,
                    label_or_type,
                    property,
                    *value_type,
                    name.as_deref(),
                    *if_not_exists,
                )?;
                Ok(QueryResult::empty())
            }
            Statement::DropConstraint { name, if_exists } => {
                self.graph.drop_constraint(name, *if_exists)?;
                Ok(QueryResult::empty())
            }
            Statement::ShowIndexes => {
                let columns = ["name", "entity", "label_or_type", "property", "unique", "kind"];
                let rows = self
                    .graph
                    .show_indexes()?
                    .into_iter()
                    .map(|info| {
                        Row::new(vec![
                            Value::String(info.name),
                            Value::String(info.entity.as_str().to_string()),
                            Value::String(info.label_or_type),
                            Value::String(info.property),
                            Value::Bool(info.unique),
                            Value::String(info.kind.to_string()),
                        ])
                    })
                    .collect();
                Ok(QueryResult::new(
                    columns.iter().map(|c| c.to_string()).collect(),
                    rows,
                ))
            }
            Statement::ShowConstraints => {
                let columns = ["name", "kind", "entity", "label_or_type", "property", "value_type"];
                let rows = self
                    .graph
                    .show_constraints()?
                    .into_iter()
                    .map(|info| {
                        Row::new(vec![
                            Value::String(info.name),
                            Value::String(info.kind.as_str().to_string()),
                            Value::String(info.entity.as_str().to_string()),
                            Value::String(info.label_or_type),
                            Value::String(info.property),
                            info.value_type
                                .map(|t| Value::String(t.as_str().to_string()))
                                .unwrap_or(Value::Null),
                        ])
                    })
                    .collect();
                Ok(QueryResult::new(
                    columns.iter().map(|c| c.to_string()).collect(),
                    rows,
                ))
            }
        }
    }

    fn run_query(&self, query: &Query) -> Result<QueryResult> {
        let mut result = self.run_clauses(&query.clauses)?;
        if let Some(part) = &query.union {
            let other = self.run_query(&part.query)?;
            if result.columns != other.columns {
                return Err(GrafitoError::QueryExecution(format!(
                    "UNION column mismatch: {:?} vs {:?}",
                    result.columns, other.columns
                )));
            }
            result.rows.extend(other.rows);
            if !part.all {
                let mut deduped: Vec<Row> = Vec::new();
                for row in result.rows {
                    if !deduped.contains(&row) {
                        deduped.push(row);
                    }
                }
                result.rows = deduped;
            }
        }
        Ok(result)
    }

    fn run_clauses(&self, clauses: &[Clause]) -> Result<QueryResult> {
        let mut frames = vec![Frame::new()];
        let mut final_result: Option<QueryResult> = None;

        for (position, clause) in clauses.iter().enumerate() {
            self.graph.check_interrupted()?;
            if final_result.is_some() {
                return Err(GrafitoError::QueryExecution(
                    "RETURN must be the final clause".to_string(),
                ));
            }
            let is_last = position == clauses.len() - 1;
            debug!("executing clause {position}: {} frames in", frames.len());
            match clause {
                Clause::Match {
                    optional,
                    patterns,
                    where_clause,
                } => {
                    frames = self.exec_match(frames, *optional, patterns, where_clause.as_ref())?;
                }
                Clause::Create { patterns } => {
                    frames = self.exec_create(frames, patterns)?;
                }
                Clause::Merge {
                    pattern,
                    on_create,
                    on_match,
                } => {
                    frames = self.exec_merge(frames, pattern, on_create, on_match)?;
                }
                Clause::Set { items } => {
                    frames = self.exec_set(frames, items)?;
                }
                Clause::Remove { items } => {
                    frames = self.exec_remove(frames, items)?;
                }
                Clause::Delete { detach, exprs } => {
                    frames = self.exec_delete(frames, *detach, exprs)?;
                }
                Clause::With {
                    projection,
                    where_clause,
                } => {
                    let (_, mut projected) = self.project(frames, projection)?;
                    if let Some(predicate) = where_clause {
                        let ctx = self.ctx();
                        let mut kept = Vec::new();
                        for frame in projected {
                            if ctx.eval_predicate(&frame, predicate)? {
                                kept.push(frame);
                            }
                        }
                        projected = kept;
                    }
                    frames = projected;
                }
                Clause::Unwind { expr, alias } => {
                    frames = self.exec_unwind(frames, expr, alias)?;
                }
                Clause::Return { projection } => {
                    let (columns, projected) = self.project(frames, projection)?;
                    let rows = projected
                        .into_iter()
                        .map(|frame| {
                            Row::new(
                                columns
                                    .iter()
                                    .map(|c| frame.get(c).cloned().unwrap_or(Value::Null))
                                    .collect(),
                            )
                        })
                        .collect();
                    final_result = Some(QueryResult::new(columns, rows));
                    frames = Vec::new();
                }
                Clause::Call {
                    procedure,
                    args,
                    yield_items,
                    where_clause,
                } => {
                    let outcome = self.exec_call(
                        frames,
                        procedure,
                        args,
                        yield_items.as_deref(),
                        where_clause.as_ref(),
                        is_last,
                    )?;
                    match outcome {
                        CallOutcome::Frames(next) => frames = next,
                        CallOutcome::Result(result) => {
                            final_result = Some(result);
                            frames = Vec::new();
                        }
                    }
                }
            }
        }
        Ok(final_result.unwrap_or_else(QueryResult::empty))
    }

    // ------------------------------------------------------------------
    // MATCH
    // ------------------------------------------------------------------

    fn exec_match(
        &self,
        frames: Vec<Frame>,
        optional: bool,
        patterns: &[Pattern],
        where_clause: Option<&Expr>,
    ) -> Result<Vec<Frame>> {
        let ctx = self.ctx();
        let mut output = Vec::new();
        for frame in frames {
            let mut embeddings = vec![frame.clone()];
            for pattern in patterns {
                let mut next = Vec::new();
                for embedding in &embeddings {
                    next.extend(match_pattern(&ctx, embedding, pattern)?);
                }
                embeddings = next;
            }
            if let Some(predicate) = where_clause {
                let mut kept = Vec::new();
                for embedding in embeddings {
                    if ctx.eval_predicate(&embedding, predicate)? {
                        kept.push(embedding);
                    }
                }
                embeddings = kept;
            }
            if embeddings.is_empty() && optional {
                let mut padded = frame;
                for variable in pattern_variables(patterns) {
                    if !padded.contains(&variable) {
                        padded.set(variable, Value::Null);
                    }
                }
                output.push(padded);
            } else {
                output.extend(embeddings);
            }
        }
        Ok(output)
    }

    // ------------------------------------------------------------------
    // CREATE / MERGE
    // ------------------------------------------------------------------

    fn exec_create(&self, frames: Vec<Frame>, patterns: &[Pattern]) -> Result<Vec<Frame>> {
        let mut output = Vec::new();
        for frame in frames {
            let mut frame = frame;
            for pattern in patterns {
                frame = self.create_pattern(frame, pattern)?;
            }
            output.push(frame);
        }
        Ok(output)
    }

    fn create_pattern(&self, mut frame: Frame, pattern: &Pattern) -> Result<Frame> {
        if pattern.shortest.is_some() {
            return Err(GrafitoError::QueryExecution(
                "path functions cannot appear in CREATE".to_string(),
            ));
        }
        let ctx = self.ctx();
        let mut path_nodes = Vec::new();
        let mut path_rels = Vec::new();

        let start = self.resolve_or_create_node(&ctx, &mut frame, &pattern.start)?;
        path_nodes.push(start);
        for (rel_pattern, node_pattern) in &pattern.segments {
            if rel_pattern.length.is_some() {
                return Err(GrafitoError::QueryExecution(
                    "variable-length relationships cannot appear in CREATE".to_string(),
                ));
            }
            if rel_pattern.types.len() != 1 {
                return Err(GrafitoError::QueryExecution(
                    "CREATE requires exactly one relationship type".to_string(),
                ));
            }
            let node = self.resolve_or_create_node(&ctx, &mut frame, node_pattern)?;
            let previous = path_nodes.last().expect("start node present");
            let (source, target) = match rel_pattern.direction {
                PatternDirection::Outgoing => (previous.id, node.id),
                PatternDirection::Incoming => (node.id, previous.id),
                PatternDirection::Undirected => {
                    return Err(GrafitoError::QueryExecution(
                        "CREATE requires a directed relationship".to_string(),
                    ))
                }
            };
            let mut properties = Properties::new();
            for (key, expr) in &rel_pattern.properties {
                properties.insert(key.clone(), ctx.eval(&frame, expr)?);
            }
            let rel =
                self.graph
                    .create_relationship(source, target, &rel_pattern.types[0], properties)?;
            if let Some(var) = &rel_pattern.variable {
                frame.set(var.clone(), Value::Relationship(rel.clone()));
            }
            path_rels.push(rel);
            path_nodes.push(node);
        }

        if let Some(path_var) = &pattern.path_variable {
            frame.set(
                path_var.clone(),
                Value::Path(crate::storage::Path {
                    nodes: path_nodes,
                    relationships: path_rels,
                }),
            );
        }
        Ok(frame)
    }

    fn resolve_or_create_node(
        &self,
        ctx: &EvalContext,
        frame: &mut Frame,
        pattern: &crate::ast::NodePattern,
    ) -> Result<crate::storage::Node> {
        if let Some(var) = &pattern.variable {
            if let Some(bound) = frame.get(var) {
                return match bound {
                    Value::Node(node) => Ok(node.clone()),
                    other => Err(GrafitoError::QueryExecution(format!(
                        "{var} is bound to {}, not a node",
                        other.type_name()
                    ))),
                };
            }
        }
        let mut properties = Properties::new();
        for (key, expr) in &pattern.properties {
            properties.insert(key.clone(), ctx.eval(frame, expr)?);
        }
        let labels: Vec<&str> = pattern.labels.iter().map(String::as_str).collect();
        let node = self.graph.create_node(&labels, properties)?;
        if let Some(var) = &pattern.variable {
            frame.set(var.clone(), Value::Node(node.clone()));
        }
        Ok(node)
    }

    fn exec_merge(
        &self,
        frames: Vec<Frame>,
        pattern: &Pattern,
        on_create: &[SetItem],
        on_match: &[SetItem],
    ) -> Result<Vec<Frame>> {
        let ctx = self.ctx();
        let mut output = Vec::new();
        for frame in frames {
            let embeddings = match_pattern(&ctx, &frame, pattern)?;
            if embeddings.is_empty() {
                // MERGE is whole-pattern atomic: nothing matched, so the
                // entire pattern is created.
                let created = self.create_pattern(frame, pattern)?;
                let mut after = vec![created];
                if !on_create.is_empty() {
                    after = self.exec_set(after, on_create)?;
                }
                output.extend(after);
            } else {
                let mut after = embeddings;
                if !on_match.is_empty() {
                    after = self.exec_set(after, on_match)?;
                }
                output.extend(after);
            }
        }
        Ok(output)
    }

    // ------------------------------------------------------------------
    // SET / REMOVE / DELETE
    // ------------------------------------------------------------------

    fn exec_set(&self, frames: Vec<Frame>, items: &[SetItem]) -> Result<Vec<Frame>> {
        let ctx = self.ctx();
        let mut output = Vec::new();
        for mut frame in frames {
            for item in items {
                match item {
                    SetItem::Property {
                        variable,
                        property,
                        value,
                    } => {
                        let new_value = ctx.eval(&frame, value)?;
                        let mut props = Properties::new();
                        props.insert(property.clone(), new_value);
                        self.apply_property_update(&mut frame, variable, props, false)?;
                    }
                    SetItem::Variable {
                        variable,
                        value,
                        merge,
                    } => {
                        let new_value = ctx.eval(&frame, value)?;
                        let props = match new_value {
                            Value::Map(entries) => entries,
                            Value::Node(node) => node.properties,
                            other => {
                                return Err(GrafitoError::QueryExecution(format!(
                                    "SET {variable} = requires a map, got {}",
                                    other.type_name()
                                )))
                            }
                        };
                        self.apply_property_update(&mut frame, variable, props, !*merge)?;
                    }
                    SetItem::Labels { variable, labels } => {
                        let node = self.frame_node(&frame, variable)?;
                        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                        let updated = self.graph.add_labels(node.id, &labels)?;
                        frame.set(variable.clone(), Value::Node(updated));
                    }
                }
            }
            output.push(frame);
        }
        Ok(output)
    }

    /// Merge or replace an entity's properties, refreshing the binding
    fn apply_property_update(
        &self,
        frame: &mut Frame,
        variable: &str,
        props: Properties,
        replace: bool,
    ) -> Result<()> {
        match frame.get(variable) {
            Some(Value::Node(node)) => {
                let id = node.id;
                if replace {
                    let existing = self.graph.require_node(id)?;
                    for key in existing.properties.keys() {
                        if !props.contains_key(key) {
                            self.graph.remove_node_property(id, key)?;
                        }
                    }
                }
                let updated = self.graph.update_node_properties(id, props)?;
                frame.set(variable.to_string(), Value::Node(updated));
                Ok(())
            }
            Some(Value::Relationship(rel)) => {
                let id = rel.id;
                if replace {
                    let existing = self.graph.require_relationship(id)?;
                    for key in existing.properties.keys() {
                        if !props.contains_key(key) {
                            self.graph.remove_relationship_property(id, key)?;
                        }
                    }
                }
                let updated = self.graph.update_relationship_properties(id, props)?;
                frame.set(variable.to_string(), Value::Relationship(updated));
                Ok(())
            }
            Some(Value::Null) => Ok(()), // SET on an optional miss is a no-op
            Some(other) => Err(GrafitoError::QueryExecution(format!(
                "cannot SET on {}",
                other.type_name()
            ))),
            None => Err(GrafitoError::QueryExecution(format!(
                "unknown variable: {variable}"
            ))),
        }
    }

    fn frame_node(&self, frame: &Frame, variable: &str) -> Result<crate::storage::Node> {
        match frame.get(variable) {
            Some(Value::Node(node)) => Ok(node.clone()),
            Some(other) => Err(GrafitoError::QueryExecution(format!(
                "{variable} is bound to {}, not a node",
                other.type_name()
            ))),
            None => Err(GrafitoError::QueryExecution(format!(
                "unknown variable: {variable}"
            ))),
        }
    }

    fn exec_remove(&self, frames: Vec<Frame>, items: &[RemoveItem]) -> Result<Vec<Frame>> {
        let mut output = Vec::new();
        for mut frame in frames {
            for item in items {
                match item {
                    RemoveItem::Property { variable, property } => match frame.get(variable) {
                        Some(Value::Node(node)) => {
                            let updated = self.graph.remove_node_property(node.id, property)?;
                            frame.set(variable.clone(), Value::Node(updated));
                        }
                        Some(Value::Relationship(rel)) => {
                            let updated =
                                self.graph.remove_relationship_property(rel.id, property)?;
                            frame.set(variable.clone(), Value::Relationship(updated));
                        }
                        Some(Value::Null) => {}
                        Some(other) => {
                            return Err(GrafitoError::QueryExecution(format!(
                                "cannot REMOVE from {}",
                                other.type_name()
                            )))
                        }
                        None => {
                            return Err(GrafitoError::QueryExecution(format!(
                                "unknown variable: {variable}"
                            )))
                        }
                    },
                    RemoveItem::Labels { variable, labels } => {
                        let node = self.frame_node(&frame, variable)?;
                        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                        let updated = self.graph.remove_labels(node.id, &labels)?;
                        frame.set(variable.clone(), Value::Node(updated));
                    }
                }
            }
            output.push(frame);
        }
        Ok(output)
    }

    fn exec_delete(&self, frames: Vec<Frame>, detach: bool, exprs: &[Expr]) -> Result<Vec<Frame>> {
        let ctx = self.ctx();
        for frame in &frames {
            for expr in exprs {
                match ctx.eval(frame, expr)? {
                    Value::Null => {}
                    Value::Node(node) => self.delete_node_checked(node.id, detach)?,
                    Value::Relationship(rel) => {
                        if self.graph.get_relationship(rel.id)?.is_some() {
                            self.graph.delete_relationship(rel.id)?;
                        }
                    }
                    Value::Path(path) => {
                        for rel in &path.relationships {
                            if self.graph.get_relationship(rel.id)?.is_some() {
                                self.graph.delete_relationship(rel.id)?;
                            }
                        }
                        for node in &path.nodes {
                            self.delete_node_checked(node.id, detach)?;
                        }
                    }
                    other => {
                        return Err(GrafitoError::QueryExecution(format!(
                            "cannot DELETE {}",
                            other.type_name()
                        )))
                    }
                }
            }
        }
        Ok(frames)
    }

    fn delete_node_checked(&self, id: i64, detach: bool) -> Result<()> {
        if self.graph.get_node(id)?.is_none() {
            return Ok(()); // already deleted through another frame
        }
        if !detach && self.graph.degree(id)? > 0 {
            return Err(GrafitoError::QueryExecution(format!(
                "cannot delete node {id} because it still has relationships; use DETACH DELETE"
            )));
        }
        self.graph.delete_node(id)
    }

    // ------------------------------------------------------------------
    // UNWIND / CALL
    // ------------------------------------------------------------------

    fn exec_unwind(&self, frames: Vec<Frame>, expr: &Expr, alias: &str) -> Result<Vec<Frame>> {
        let ctx = self.ctx();
        let mut output = Vec::new();
        for frame in frames {
            match ctx.eval(&frame, expr)? {
                Value::Null => {}
                Value::List(items) => {
                    for item in items {
                        let mut next = frame.clone();
                        next.set(alias.to_string(), item);
                        output.push(next);
                    }
                }
                value => {
                    let mut next = frame;
                    next.set(alias.to_string(), value);
                    output.push(next);
                }
            }
        }
        Ok(output)
    }

    fn exec_call(
        &self,
        frames: Vec<Frame>,
        procedure: &str,
        args: &[Expr],
        yield_items: Option<&[crate::ast::YieldItem]>,
        where_clause: Option<&Expr>,
        is_last: bool,
    ) -> Result<CallOutcome> {
        let ctx = self.ctx();
        let proc = self.graph.procedures.get(procedure).ok_or_else(|| {
            GrafitoError::Configuration(format!("unknown procedure: {procedure}"))
        })?;

        if let Some(items) = yield_items {
            for item in items {
                if !proc.columns.iter().any(|c| c == &item.column) {
                    return Err(GrafitoError::parse(
                        0,
                        0,
                        format!(
                            "unknown YIELD column '{}' for {procedure} (returns: {})",
                            item.column,
                            proc.columns.join(", ")
                        ),
                    ));
                }
            }
        } else if !is_last {
            return Err(GrafitoError::QueryExecution(format!(
                "CALL {procedure} must YIELD columns to continue the query"
            )));
        }

        let mut output = Vec::new();
        for frame in &frames {
            self.graph.check_interrupted()?;
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(ctx.eval(frame, arg)?);
            }
            let rows = (proc.handler)(self.graph, &arg_values)?;
            for row in rows {
                let mut next = frame.clone();
                match yield_items {
                    Some(items) => {
                        for item in items {
                            let idx = proc
                                .columns
                                .iter()
                                .position(|c| c == &item.column)
                                .expect("validated above");
                            let name = item.alias.clone().unwrap_or_else(|| item.column.clone());
                            next.set(name, row.get(idx).cloned().unwrap_or(Value::Null));
                        }
                    }
                    None => {
                        for (idx, column) in proc.columns.iter().enumerate() {
                            next.set(column.clone(), row.get(idx).cloned().unwrap_or(Value::Null));
                        }
                    }
                }
                if let Some(predicate) = where_clause {
                    if !ctx.eval_predicate(&next, predicate)? {
                        continue;
                    }
                }
                output.push(next);
            }
        }

        if yield_items.is_none() && is_last {
            // Standalone CALL: the procedure's schema is the result.
            let rows = output
                .into_iter()
                .map(|frame| {
                    Row::new(
                        proc.columns
                            .iter()
                            .map(|c| frame.get(c).cloned().unwrap_or(Value::Null))
                            .collect(),
                    )
                })
                .collect();
            return Ok(CallOutcome::Result(QueryResult::new(
                proc.columns.clone(),
                rows,
            )));
        }
        Ok(CallOutcome::Frames(output))
    }

    // ------------------------------------------------------------------
    // Projection (WITH / RETURN)
    // ------------------------------------------------------------------

    /// Project frames through a WITH/RETURN projection. Returns the
    /// output column names and one frame per output row, keyed by column
    /// name.
    fn project(
        &self,
        frames: Vec<Frame>,
        projection: &Projection,
    ) -> Result<(Vec<String>, Vec<Frame>)> {
        let ctx = self.ctx();

        // RETURN * expands to every bound variable, in frame order.
        let mut items = Vec::new();
        if projection.star {
            if let Some(first) = frames.first() {
                for name in first.names() {
                    items.push(crate::ast::ProjectionItem {
                        expr: Expr::Variable(name.to_string()),
                        alias: Some(name.to_string()),
                    });
                }
            }
        }
        items.extend(projection.items.iter().cloned());

        let columns: Vec<String> = items.iter().map(|item| item.column_name()).collect();
        let aggregated = items.iter().any(|item| item.expr.contains_aggregate());

        // Each output row pairs the projected frame with a frame for
        // ORDER BY evaluation (which may reference pre-projection
        // variables).
        let mut rows: Vec<(Frame, Frame)> = Vec::new();

        if aggregated {
            rows = self.project_aggregated(&ctx, &frames, &items, &columns)?;
        } else {
            for frame in &frames {
                let mut projected = Frame::new();
                for (item, column) in items.iter().zip(&columns) {
                    let value = ctx.eval(frame, &item.expr)?;
                    projected.set(column.clone(), value);
                }
                let mut order_frame = frame.clone();
                for (name, value) in projected.iter() {
                    order_frame.set(name.to_string(), value.clone());
                }
                rows.push((projected, order_frame));
            }
        }

        if projection.distinct {
            let mut deduped: Vec<(Frame, Frame)> = Vec::new();
            for (projected, order_frame) in rows {
                if !deduped.iter().any(|(p, _)| *p == projected) {
                    deduped.push((projected, order_frame));
                }
            }
            rows = deduped;
        }

        if !projection.order_by.is_empty() {
            let mut keyed: Vec<(Vec<Value>, Frame, Frame)> = Vec::new();
            for (projected, order_frame) in rows {
                let mut keys = Vec::with_capacity(projection.order_by.len());
                for item in &projection.order_by {
                    keys.push(self.order_key(&ctx, &order_frame, &items, &projected, &item.expr)?);
                }
                keyed.push((keys, projected, order_frame));
            }
            keyed.sort_by(|(a, _, _), (b, _, _)| {
                for (idx, item) in projection.order_by.iter().enumerate() {
                    let (x, y) = (&a[idx], &b[idx]);
                    // Nulls sort last regardless of direction.
                    let ord = match (x.is_null(), y.is_null()) {
                        (true, true) => std::cmp::Ordering::Equal,
                        (true, false) => std::cmp::Ordering::Greater,
                        (false, true) => std::cmp::Ordering::Less,
                        (false, false) => {
                            let ord = x.order_cmp(y);
                            if item.ascending {
                                ord
                            } else {
                                ord.reverse()
                            }
                        }
                    };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
            rows = keyed
                .into_iter()
                .map(|(_, projected, order_frame)| (projected, order_frame))
                .collect();
        }

        let skip = match &projection.skip {
            Some(expr) => usize_value(&ctx.eval(&Frame::new(), expr)?, "SKIP")?,
            None => 0,
        };
        let limit = match &projection.limit {
            Some(expr) => Some(usize_value(&ctx.eval(&Frame::new(), expr)?, "LIMIT")?),
            None => None,
        };
        let mut projected: Vec<Frame> = rows.into_iter().map(|(p, _)| p).collect();
        if skip > 0 {
            projected = projected.into_iter().skip(skip).collect();
        }
        if let Some(limit) = limit {
            projected.truncate(limit);
        }
        Ok((columns, projected))
    }

    /// ORDER BY key: an expression textually matching a projection item
    /// reads the projected value (so aggregates order correctly);
    /// anything else evaluates against the combined frame.
    fn order_key(
        &self,
        ctx: &EvalContext,
        order_frame: &Frame,
        items: &[crate::ast::ProjectionItem],
        projected: &Frame,
        expr: &Expr,
    ) -> Result<Value> {
        for item in items {
            if item.expr == *expr {
                if let Some(value) = projected.get(&item.column_name()) {
                    return Ok(value.clone());
                }
            }
        }
        ctx.eval(order_frame, expr)
    }

    fn project_aggregated(
        &self,
        ctx: &EvalContext,
        frames: &[Frame],
        items: &[crate::ast::ProjectionItem],
        columns: &[String],
    ) -> Result<Vec<(Frame, Frame)>> {
        // Grouping keys are the non-aggregate projection items.
        let key_indexes: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.expr.contains_aggregate())
            .map(|(i, _)| i)
            .collect();

        struct Group {
            keys: Vec<Value>,
            accumulators: Vec<Vec<Accumulator>>,
        }

        let agg_specs: Vec<Vec<AggSpec>> = items
            .iter()
            .map(|item| {
                let mut specs = Vec::new();
                collect_agg_specs(&item.expr, &mut specs);
                specs
            })
            .collect();

        let mut groups: Vec<Group> = Vec::new();
        for frame in frames {
            let mut keys = Vec::with_capacity(key_indexes.len());
            for &idx in &key_indexes {
                keys.push(ctx.eval(frame, &items[idx].expr)?);
            }
            let group_idx = match groups.iter().position(|g| g.keys == keys) {
                Some(idx) => idx,
                None => {
                    let accumulators = agg_specs
                        .iter()
                        .map(|specs| specs.iter().map(AggSpec::accumulator).collect())
                        .collect();
                    groups.push(Group { keys, accumulators });
                    groups.len() - 1
                }
            };
            let group = &mut groups[group_idx];
            for (item_idx, specs) in agg_specs.iter().enumerate() {
                for (spec_idx, spec) in specs.iter().enumerate() {
                    let value = match &spec.argument {
                        Some(arg) => ctx.eval(frame, arg)?,
                        None => Value::Null,
                    };
                    let mut extra = Vec::new();
                    for e in &spec.extra_args {
                        extra.push(ctx.eval(frame, e)?);
                    }
                    group.accumulators[item_idx][spec_idx].feed(value, &extra)?;
                }
            }
        }

        // Aggregates with no grouping keys produce one row even over an
        // empty input.
        if groups.is_empty() && key_indexes.is_empty() {
            groups.push(Group {
                keys: Vec::new(),
                accumulators: agg_specs
                    .iter()
                    .map(|specs| specs.iter().map(AggSpec::accumulator).collect())
                    .collect(),
            });
        }

        let mut rows = Vec::with_capacity(groups.len());
        for mut group in groups {
            let mut projected = Frame::new();
            let mut key_iter = group.keys.iter();
            for (item_idx, item) in items.iter().enumerate() {
                let column = &columns[item_idx];
                if key_indexes.contains(&item_idx) {
                    let value = key_iter.next().expect("key per non-aggregate item").clone();
                    projected.set(column.clone(), value);
                } else {
                    // Finalize this item's aggregates and evaluate the
                    // expression with results substituted in.
                    let mut finished = Vec::new();
                    for acc in group.accumulators[item_idx].drain(..) {
                        finished.push(acc.finish()?);
                    }
                    let mut counter = 0usize;
                    let rewritten = rewrite_aggregates(&item.expr, &mut counter);
                    let mut eval_frame = projected.clone();
                    for (i, value) in finished.iter().enumerate() {
                        eval_frame.set(format!("#agg{i}"), value.clone());
                    }
                    let value = ctx.eval(&eval_frame, &rewritten)?;
                    projected.set(column.clone(), value);
                }
            }
            let order_frame = projected.clone();
            rows.push((projected, order_frame));
        }
        Ok(rows)
    }
}

enum CallOutcome {
    Frames(Vec<Frame>),
    Result(QueryResult),
}

/// One aggregate call inside a projection item
struct AggSpec {
    name: String,
    distinct: bool,
    argument: Option<Expr>,
    extra_args: Vec<Expr>,
    count_star: bool,
}

impl AggSpec {
    fn accumulator(&self) -> Accumulator {
        if self.count_star {
            Accumulator::count_star()
        } else {
            Accumulator::for_function(&self.name, self.distinct)
                .expect("aggregate name validated during collection")
        }
    }
}

/// Collect aggregate calls in evaluation order
fn collect_agg_specs(expr: &Expr, out: &mut Vec<AggSpec>) {
    match expr {
        Expr::CountStar => out.push(AggSpec {
            name: "count".to_string(),
            distinct: false,
            argument: None,
            extra_args: Vec::new(),
            count_star: true,
        }),
        Expr::FunctionCall {
            name,
            args,
            distinct,
        } if is_aggregate_name(name) => out.push(AggSpec {
            name: name.clone(),
            distinct: *distinct,
            argument: args.first().cloned(),
            extra_args: args.iter().skip(1).cloned().collect(),
            count_star: false,
        }),
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                collect_agg_specs(arg, out);
            }
        }
        Expr::Property(base, _) => collect_agg_specs(base, out),
        Expr::Index(a, b) => {
            collect_agg_specs(a, out);
            collect_agg_specs(b, out);
        }
        Expr::Slice(base, from, to) => {
            collect_agg_specs(base, out);
            if let Some(from) = from {
                collect_agg_specs(from, out);
            }
            if let Some(to) = to {
                collect_agg_specs(to, out);
            }
        }
        Expr::List(items) => {
            for item in items {
                collect_agg_specs(item, out);
            }
        }
        Expr::Map(entries) => {
            for (_, value) in entries {
                collect_agg_specs(value, out);
            }
        }
        Expr::Unary(_, inner) => collect_agg_specs(inner, out),
        Expr::Binary(_, lhs, rhs) => {
            collect_agg_specs(lhs, out);
            collect_agg_specs(rhs, out);
        }
        Expr::IsNull(inner, _) => collect_agg_specs(inner, out),
        Expr::Case {
            operand,
            branches,
            else_expr,
        } => {
            if let Some(operand) = operand {
                collect_agg_specs(operand, out);
            }
            for (when, then) in branches {
                collect_agg_specs(when, out);
                collect_agg_specs(then, out);
            }
            if let Some(else_expr) = else_expr {
                collect_agg_specs(else_expr, out);
            }
        }
        _ => {}
    }
}

/// Replace aggregate calls with `#aggN` placeholder variables, in the
/// same order `collect_agg_specs` walks.
fn rewrite_aggregates(expr: &Expr, counter: &mut usize) -> Expr {
    let placeholder = |counter: &mut usize| {
        let variable = Expr::Variable(format!("#agg{counter}"));
        *counter += 1;
        variable
    };
    match expr {
        Expr::CountStar => placeholder(counter),
        Expr::FunctionCall { name, .. } if is_aggregate_name(name) => placeholder(counter),
        Expr::FunctionCall {
            name,
            args,
            distinct,
        } => Expr::FunctionCall {
            name: name.clone(),
            args: args.iter().map(|a| rewrite_aggregates(a, counter)).collect(),
            distinct: *distinct,
        },
        Expr::Property(base, prop) => {
            Expr::Property(Box::new(rewrite_aggregates(base, counter)), prop.clone())
        }
        Expr::Index(a, b) => Expr::Index(
            Box::new(rewrite_aggregates(a, counter)),
            Box::new(rewrite_aggregates(b, counter)),
        ),
        Expr::Slice(base, from, to) => Expr::Slice(
            Box::new(rewrite_aggregates(base, counter)),
            from.as_ref().map(|e| Box::new(rewrite_aggregates(e, counter))),
            to.as_ref().map(|e| Box::new(rewrite_aggregates(e, counter))),
        ),
        Expr::List(items) => Expr::List(
            items
                .iter()
                .map(|e| rewrite_aggregates(e, counter))
                .collect(),
        ),
        Expr::Map(entries) => Expr::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), rewrite_aggregates(v, counter)))
                .collect(),
        ),
        Expr::Unary(op, inner) => Expr::Unary(*op, Box::new(rewrite_aggregates(inner, counter))),
        Expr::Binary(op, lhs, rhs) => Expr::Binary(
            *op,
            Box::new(rewrite_aggregates(lhs, counter)),
            Box::new(rewrite_aggregates(rhs, counter)),
        ),
        Expr::IsNull(inner, negated) => {
            Expr::IsNull(Box::new(rewrite_aggregates(inner, counter)), *negated)
        }
        Expr::Case {
            operand,
            branches,
            else_expr,
        } => Expr::Case {
            operand: operand
                .as_ref()
                .map(|e| Box::new(rewrite_aggregates(e, counter))),
            branches: branches
                .iter()
                .map(|(w, t)| {
                    (
                        rewrite_aggregates(w, counter),
                        rewrite_aggregates(t, counter),
                    )
                })
                .collect(),
            else_expr: else_expr
                .as_ref()
                .map(|e| Box::new(rewrite_aggregates(e, counter))),
        },
        other => other.clone(),
    }
}

/// Variables named anywhere in a pattern list (for OPTIONAL MATCH
/// null-padding)
fn pattern_variables(patterns: &[Pattern]) -> Vec<String> {
    let mut variables = Vec::new();
    let mut push = |name: &Option<String>| {
        if let Some(name) = name {
            if !variables.contains(name) {
                variables.push(name.clone());
            }
        }
    };
    for pattern in patterns {
        push(&pattern.path_variable);
        push(&pattern.start.variable);
        for (rel, node) in &pattern.segments {
            push(&rel.variable);
            push(&node.variable);
        }
    }
    variables
}

fn usize_value(value: &Value, what: &str) -> Result<usize> {
    match value {
        Value::Int(i) if *i >= 0 => Ok(*i as usize),
        other => Err(GrafitoError::QueryExecution(format!(
            "{what} requires a non-negative integer, got {other}"
        ))),
    }
}
