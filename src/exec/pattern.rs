// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pattern-embedding enumeration
//!
//! A pattern is expanded left to right. Pattern nodes bind to graph
//! nodes after label and inline-property filtering; relationships bind
//! honoring direction and are never reused within one embedding.
//! Variable-length segments bind their variable to the relationship
//! list; a named path binds to the node/relationship alternation.
//! `shortestPath`/`allShortestPaths` heads substitute BFS.

use crate::ast::{NodePattern, Pattern, PatternDirection, RelPattern, ShortestKind};
use crate::error::{GrafitoError, Result};
use crate::exec::eval::EvalContext;
use crate::exec::Frame;
use crate::storage::{Direction, Node, Path, Relationship, Value};

/// Enumerate every embedding of `pattern` that extends `frame`,
/// returning one extended frame per embedding.
pub fn match_pattern(ctx: &EvalContext, frame: &Frame, pattern: &Pattern) -> Result<Vec<Frame>> {
    if let Some(kind) = pattern.shortest {
        return match_shortest(ctx, frame, pattern, kind);
    }

    let mut partials: Vec<Embedding> = Vec::new();
    for node in start_candidates(ctx, frame, &pattern.start)? {
        let mut frame = frame.clone();
        if let Some(var) = &pattern.start.variable {
            frame.set(var.clone(), Value::Node(node.clone()));
        }
        partials.push(Embedding {
            frame,
            nodes: vec![node],
            rels: Vec::new(),
        });
    }

    for (rel_pattern, node_pattern) in &pattern.segments {
        ctx.graph.check_interrupted()?;
        let mut extended = Vec::new();
        for partial in partials {
            if rel_pattern.length.is_some() {
                expand_variable_segment(ctx, &partial, rel_pattern, node_pattern, &mut extended)?;
            } else {
                expand_single_segment(ctx, &partial, rel_pattern, node_pattern, &mut extended)?;
            }
        }
        partials = extended;
    }

    let mut frames = Vec::with_capacity(partials.len());
    for mut embedding in partials {
        if let Some(path_var) = &pattern.path_variable {
            let path = Path {
                nodes: embedding.nodes.clone(),
                relationships: embedding.rels.clone(),
            };
            embedding.frame.set(path_var.clone(), Value::Path(path));
        }
        frames.push(embedding.frame);
    }
    Ok(frames)
}

struct Embedding {
    frame: Frame,
    nodes: Vec<Node>,
    rels: Vec<Relationship>,
}

/// Candidate bindings for the leftmost pattern node
fn start_candidates(
    ctx: &EvalContext,
    frame: &Frame,
    pattern: &NodePattern,
) -> Result<Vec<Node>> {
    if let Some(var) = &pattern.variable {
        if let Some(bound) = frame.get(var) {
            let node = match bound {
                Value::Node(node) => node.clone(),
                other => {
                    return Err(GrafitoError::QueryExecution(format!(
                        "{var} is bound to {}, not a node",
                        other.type_name()
                    )))
                }
            };
            return if node_matches(ctx, frame, pattern, &node)? {
                Ok(vec![node])
            } else {
                Ok(Vec::new())
            };
        }
    }
    let labels: Vec<&str> = pattern.labels.iter().map(String::as_str).collect();
    let mut candidates = Vec::new();
    for node in ctx.graph.match_nodes(&labels, &Default::default())? {
        if node_matches(ctx, frame, pattern, &node)? {
            candidates.push(node);
        }
    }
    Ok(candidates)
}

/// Label and inline-property filters for a node pattern
fn node_matches(
    ctx: &EvalContext,
    frame: &Frame,
    pattern: &NodePattern,
    node: &Node,
) -> Result<bool> {
    for label in &pattern.labels {
        if !node.has_label(label) {
            return Ok(false);
        }
    }
    for (key, expr) in &pattern.properties {
        let expected = ctx.eval(frame, expr)?;
        let actual = node.property(key).cloned().unwrap_or(Value::Null);
        if actual != expected {
            return Ok(false);
        }
    }
    Ok(true)
}

fn rel_matches(
    ctx: &EvalContext,
    frame: &Frame,
    pattern: &RelPattern,
    rel: &Relationship,
) -> Result<bool> {
    if !pattern.types.is_empty() && !pattern.types.iter().any(|t| *t == rel.rel_type) {
        return Ok(false);
    }
    for (key, expr) in &pattern.properties {
        let expected = ctx.eval(frame, expr)?;
        let actual = rel.property(key).cloned().unwrap_or(Value::Null);
        if actual != expected {
            return Ok(false);
        }
    }
    Ok(true)
}

fn pattern_direction(direction: PatternDirection) -> Direction {
    match direction {
        PatternDirection::Outgoing => Direction::Outgoing,
        PatternDirection::Incoming => Direction::Incoming,
        PatternDirection::Undirected => Direction::Both,
    }
}

/// Accept or reject a candidate node for a non-start pattern position,
/// extending the frame on acceptance.
fn bind_node(
    ctx: &EvalContext,
    frame: &mut Frame,
    pattern: &NodePattern,
    node: &Node,
) -> Result<bool> {
    if let Some(var) = &pattern.variable {
        if let Some(bound) = frame.get(var) {
            match bound {
                Value::Node(existing) => return Ok(existing.id == node.id),
                _ => return Ok(false),
            }
        }
    }
    if !node_matches(ctx, frame, pattern, node)? {
        return Ok(false);
    }
    if let Some(var) = &pattern.variable {
        frame.set(var.clone(), Value::Node(node.clone()));
    }
    Ok(true)
}

fn expand_single_segment(
    ctx: &EvalContext,
    partial: &Embedding,
    rel_pattern: &RelPattern,
    node_pattern: &NodePattern,
    out: &mut Vec<Embedding>,
) -> Result<()> {
    let current = partial.nodes.last().expect("non-empty embedding");
    let direction = pattern_direction(rel_pattern.direction);

    // A pre-bound relationship variable pins the edge.
    if let Some(var) = &rel_pattern.variable {
        if let Some(Value::Relationship(bound)) = partial.frame.get(var) {
            let bound = bound.clone();
            let next_id = match step(&bound, current.id, direction) {
                Some(id) => id,
                None => return Ok(()),
            };
            if partial.rels.iter().any(|r| r.id == bound.id) {
                return Ok(());
            }
            let Some(next) = ctx.graph.get_node(next_id)? else {
                return Ok(());
            };
            let mut frame = partial.frame.clone();
            if rel_matches(ctx, &frame, rel_pattern, &bound)?
                && bind_node(ctx, &mut frame, node_pattern, &next)?
            {
                let mut nodes = partial.nodes.clone();
                let mut rels = partial.rels.clone();
                nodes.push(next);
                rels.push(bound);
                out.push(Embedding { frame, nodes, rels });
            }
            return Ok(());
        }
    }

    let rel_type_filter = if rel_pattern.types.len() == 1 {
        Some(rel_pattern.types[0].as_str())
    } else {
        None
    };
    for rel in ctx
        .graph
        .incident_relationships(current.id, direction, rel_type_filter)?
    {
        if partial.rels.iter().any(|r| r.id == rel.id) {
            continue; // relationship uniqueness within an embedding
        }
        if !rel_matches(ctx, &partial.frame, rel_pattern, &rel)? {
            continue;
        }
        let next_id = match step(&rel, current.id, direction) {
            Some(id) => id,
            None => continue,
        };
        let Some(next) = ctx.graph.get_node(next_id)? else {
            continue;
        };
        let mut frame = partial.frame.clone();
        if !bind_node(ctx, &mut frame, node_pattern, &next)? {
            continue;
        }
        if let Some(var) = &rel_pattern.variable {
            frame.set(var.clone(), Value::Relationship(rel.clone()));
        }
        let mut nodes = partial.nodes.clone();
        let mut rels = partial.rels.clone();
        nodes.push(next);
        rels.push(rel);
        out.push(Embedding { frame, nodes, rels });
    }
    Ok(())
}

fn expand_variable_segment(
    ctx: &EvalContext,
    partial: &Embedding,
    rel_pattern: &RelPattern,
    node_pattern: &NodePattern,
    out: &mut Vec<Embedding>,
) -> Result<()> {
    let current = partial.nodes.last().expect("non-empty embedding");
    let direction = pattern_direction(rel_pattern.direction);
    let (min, max) = rel_pattern.length.expect("variable-length segment");
    let min = min.unwrap_or(1);
    let max = max.unwrap_or(ctx.graph.config().cypher_max_hops);
    if max > ctx.graph.config().cypher_max_hops {
        return Err(GrafitoError::QueryExecution(format!(
            "variable-length upper bound {max} exceeds the hop limit {}",
            ctx.graph.config().cypher_max_hops
        )));
    }

    for (rels, end_id) in
        ctx.graph
            .expand_paths(current.id, direction, &rel_pattern.types, min, max)?
    {
        if rels
            .iter()
            .any(|rel| partial.rels.iter().any(|r| r.id == rel.id))
        {
            continue;
        }
        let mut ok = true;
        for rel in &rels {
            if !rel_matches(ctx, &partial.frame, rel_pattern, rel)? {
                ok = false;
                break;
            }
        }
        if !ok {
            continue;
        }
        let Some(end) = ctx.graph.get_node(end_id)? else {
            continue;
        };
        let mut frame = partial.frame.clone();
        if !bind_node(ctx, &mut frame, node_pattern, &end)? {
            continue;
        }
        if let Some(var) = &rel_pattern.variable {
            frame.set(
                var.clone(),
                Value::List(rels.iter().cloned().map(Value::Relationship).collect()),
            );
        }
        let mut nodes = partial.nodes.clone();
        let mut all_rels = partial.rels.clone();
        let mut walk = current.id;
        for rel in &rels {
            let next = rel.other_end(walk).unwrap_or(rel.target);
            nodes.push(ctx.graph.require_node(next)?);
            walk = next;
        }
        all_rels.extend(rels);
        out.push(Embedding {
            frame,
            nodes,
            rels: all_rels,
        });
    }
    Ok(())
}

/// BFS substitution for `shortestPath` / `allShortestPaths` heads
fn match_shortest(
    ctx: &EvalContext,
    frame: &Frame,
    pattern: &Pattern,
    kind: ShortestKind,
) -> Result<Vec<Frame>> {
    if pattern.segments.len() != 1 {
        return Err(GrafitoError::QueryExecution(
            "shortestPath takes a single relationship pattern".to_string(),
        ));
    }
    let (rel_pattern, end_pattern) = &pattern.segments[0];
    let direction = pattern_direction(rel_pattern.direction);
    let (min, max) = rel_pattern.length.unwrap_or((Some(1), Some(1)));
    let min = min.unwrap_or(1);
    let max = max.unwrap_or(ctx.graph.config().cypher_max_hops);

    let starts = start_candidates(ctx, frame, &pattern.start)?;
    let mut frames = Vec::new();
    for start in starts {
        for end in start_candidates(ctx, frame, end_pattern)? {
            ctx.graph.check_interrupted()?;
            let paths = match kind {
                ShortestKind::Shortest => ctx
                    .graph
                    .shortest_path_with_types(start.id, end.id, direction, &rel_pattern.types)?
                    .into_iter()
                    .collect::<Vec<_>>(),
                ShortestKind::AllShortest => ctx.graph.all_shortest_paths_with_types(
                    start.id,
                    end.id,
                    direction,
                    &rel_pattern.types,
                )?,
            };
            for path in paths {
                if path.length() < min || path.length() > max {
                    continue;
                }
                let mut frame = frame.clone();
                if let Some(var) = &pattern.start.variable {
                    frame.set(var.clone(), Value::Node(start.clone()));
                }
                if let Some(var) = &end_pattern.variable {
                    frame.set(var.clone(), Value::Node(end.clone()));
                }
                if let Some(var) = &rel_pattern.variable {
                    frame.set(
                        var.clone(),
                        Value::List(
                            path.relationships
                                .iter()
                                .cloned()
                                .map(Value::Relationship)
                                .collect(),
                        ),
                    );
                }
                if let Some(path_var) = &pattern.path_variable {
                    frame.set(path_var.clone(), Value::Path(path.clone()));
                }
                frames.push(frame);
            }
        }
    }
    Ok(frames)
}

fn step(rel: &Relationship, from: i64, direction: Direction) -> Option<i64> {
    match direction {
        Direction::Outgoing => (rel.source == from).then_some(rel.target),
        Direction::Incoming => (rel.target == from).then_some(rel.source),
        Direction::Both => rel.other_end(from),
    }
}
