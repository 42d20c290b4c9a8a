//! Heuristic mapping from a set of referenced tables to a minimal
//! connecting table set, plus the query-shape suggestions consumed by
//! interactive builders.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema_graph::{FkEdge, SchemaGraph};
use crate::state::JoinEdge;

/// What the caller wants connected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapeIntent {
    pub include_tables: Vec<String>,
}

/// A candidate query shape: a table set, the joins that connect it, and a
/// human-readable description.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeCandidate {
    pub tables: Vec<String>,
    pub joins: Vec<JoinEdge>,
    pub description: String,
}

pub fn fk_to_join_edge(edge: &FkEdge) -> JoinEdge {
    JoinEdge {
        left_table: edge.child_table.clone(),
        left_column: edge.child_column.clone(),
        right_table: edge.parent_table.clone(),
        right_column: edge.parent_column.clone(),
    }
}

/// Bridge tables for a disconnected or sprawling table set: the union of
/// intermediate tables over all pairwise shortest paths, most-shared first,
/// ties broken by name.
pub fn bridge_tables(graph: &SchemaGraph, tables: &BTreeSet<String>) -> Vec<String> {
    let mut frequency: BTreeMap<String, usize> = BTreeMap::new();
    let names: Vec<&String> = tables.iter().collect();
    for (i, a) in names.iter().enumerate() {
        for b in names.iter().skip(i + 1) {
            let Some(path) = graph.shortest_path(a, b) else {
                continue;
            };
            let mut current = (*a).clone();
            for edge in &path {
                let next = edge
                    .other_endpoint(&current)
                    .unwrap_or(edge.parent_table.as_str())
                    .to_string();
                if next != **b && !tables.contains(&next) {
                    *frequency.entry(next.clone()).or_insert(0) += 1;
                }
                current = next;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|(ta, ca), (tb, cb)| cb.cmp(ca).then_with(|| ta.cmp(tb)));
    ranked.into_iter().map(|(table, _)| table).collect()
}

/// Propose query shapes for an intent. A single included table yields one
/// candidate per FK-adjacent table; a multi-table intent yields the
/// connecting shape when one exists.
pub fn suggest_shapes(graph: &SchemaGraph, intent: &ShapeIntent) -> Vec<ShapeCandidate> {
    let include: Vec<&String> = intent
        .include_tables
        .iter()
        .filter(|t| graph.has_table(t))
        .collect();

    match include.as_slice() {
        [] => Vec::new(),
        [table] => neighbor_shapes(graph, table),
        _ => connecting_shape(graph, &include).into_iter().collect(),
    }
}

fn neighbor_shapes(graph: &SchemaGraph, table: &str) -> Vec<ShapeCandidate> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut candidates = Vec::new();
    for edge in graph.edges_incident(table) {
        let Some(other) = edge.other_endpoint(table) else {
            continue;
        };
        if other == table || !seen.insert(other.to_string()) {
            continue;
        }
        candidates.push(ShapeCandidate {
            tables: vec![table.to_string(), other.to_string()],
            joins: vec![fk_to_join_edge(edge)],
            description: format!(
                "{} joined to {} on {}.{} = {}.{}",
                table,
                other,
                edge.child_table,
                edge.child_column,
                edge.parent_table,
                edge.parent_column
            ),
        });
    }
    candidates
}

fn connecting_shape(graph: &SchemaGraph, include: &[&String]) -> Option<ShapeCandidate> {
    let mut joins: Vec<JoinEdge> = Vec::new();
    let mut tables: BTreeSet<String> = include.iter().map(|t| (*t).clone()).collect();

    for (i, a) in include.iter().enumerate() {
        for b in include.iter().skip(i + 1) {
            let path = graph.shortest_path(a, b)?;
            let mut current = (*a).clone();
            for edge in &path {
                let next = edge
                    .other_endpoint(&current)
                    .unwrap_or(edge.parent_table.as_str())
                    .to_string();
                tables.insert(next.clone());
                let join = fk_to_join_edge(edge);
                if !joins.contains(&join) {
                    joins.push(join);
                }
                current = next;
            }
        }
    }

    let included: Vec<String> = include.iter().map(|t| (*t).clone()).collect();
    let bridges: Vec<String> = tables
        .iter()
        .filter(|t| !included.contains(t))
        .cloned()
        .collect();
    let description = if bridges.is_empty() {
        format!("{} joined directly", included.join(", "))
    } else {
        format!("{} connected through {}", included.join(", "), bridges.join(", "))
    };

    Some(ShapeCandidate {
        tables: tables.into_iter().collect(),
        joins,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_graph::{ForeignKeyMeta, SchemaMetadata, TableMeta};

    fn star_graph() -> SchemaGraph {
        // order_items -> orders -> customers
        let metadata = SchemaMetadata {
            tables: vec![
                TableMeta {
                    name: "customers".to_string(),
                    columns: vec!["id".to_string(), "region".to_string()],
                    primary_key: vec!["id".to_string()],
                    foreign_keys: vec![],
                },
                TableMeta {
                    name: "orders".to_string(),
                    columns: vec!["id".to_string(), "customer_id".to_string()],
                    primary_key: vec!["id".to_string()],
                    foreign_keys: vec![ForeignKeyMeta {
                        column: "customer_id".to_string(),
                        references_table: "customers".to_string(),
                        references_column: "id".to_string(),
                    }],
                },
                TableMeta {
                    name: "order_items".to_string(),
                    columns: vec!["id".to_string(), "order_id".to_string(), "sku".to_string()],
                    primary_key: vec!["id".to_string()],
                    foreign_keys: vec![ForeignKeyMeta {
                        column: "order_id".to_string(),
                        references_table: "orders".to_string(),
                        references_column: "id".to_string(),
                    }],
                },
            ],
        };
        SchemaGraph::from_metadata(&metadata).unwrap()
    }

    #[test]
    fn ranks_shared_intermediates_first() {
        let graph = star_graph();
        let tables: BTreeSet<String> = ["customers", "order_items"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(bridge_tables(&graph, &tables), vec!["orders".to_string()]);
    }

    #[test]
    fn single_table_intent_lists_neighbors() {
        let graph = star_graph();
        let intent = ShapeIntent {
            include_tables: vec!["orders".to_string()],
        };
        let shapes = suggest_shapes(&graph, &intent);
        assert_eq!(shapes.len(), 2);
        let described: Vec<&str> = shapes.iter().map(|s| s.description.as_str()).collect();
        assert!(described[0].contains("customers") || described[1].contains("customers"));
    }

    #[test]
    fn multi_table_intent_reports_bridges() {
        let graph = star_graph();
        let intent = ShapeIntent {
            include_tables: vec!["customers".to_string(), "order_items".to_string()],
        };
        let shapes = suggest_shapes(&graph, &intent);
        assert_eq!(shapes.len(), 1);
        assert!(shapes[0].description.contains("connected through orders"));
        assert_eq!(shapes[0].tables.len(), 3);
    }
}
