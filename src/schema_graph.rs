use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{HtnqlError, Result};

/// Reflected database metadata, the construction input for [`SchemaGraph`].
/// Producing this from a live database is the reflection layer's job; the
/// core only validates and indexes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub tables: Vec<TableMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyMeta {
    /// Referencing column on this table.
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// A foreign-key edge, oriented from the referencing (child) table to the
/// referenced (parent) table. Path-finding treats edges as undirected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FkEdge {
    pub child_table: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
}

impl FkEdge {
    /// The endpoint opposite `table`, or None if the edge does not touch it.
    pub fn other_endpoint(&self, table: &str) -> Option<&str> {
        if self.child_table == table {
            Some(&self.parent_table)
        } else if self.parent_table == table {
            Some(&self.child_table)
        } else {
            None
        }
    }

    pub fn touches(&self, table: &str) -> bool {
        self.child_table == table || self.parent_table == table
    }
}

#[derive(Debug, Clone)]
struct TableNode {
    columns: BTreeSet<String>,
    primary_key: BTreeSet<String>,
}

/// Undirected multigraph over table names, built once from reflected
/// metadata and read-only afterwards. All iteration happens in sorted order
/// so every walk over the graph is deterministic.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    tables: BTreeMap<String, TableNode>,
    edges: Vec<FkEdge>,
}

impl SchemaGraph {
    pub fn from_metadata(metadata: &SchemaMetadata) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for table in &metadata.tables {
            let columns: BTreeSet<String> = table.columns.iter().cloned().collect();
            for pk in &table.primary_key {
                if !columns.contains(pk) {
                    return Err(HtnqlError::Schema(format!(
                        "primary key column {pk} missing on table {}",
                        table.name
                    )));
                }
            }
            tables.insert(
                table.name.clone(),
                TableNode {
                    columns,
                    primary_key: table.primary_key.iter().cloned().collect(),
                },
            );
        }

        let mut edges = Vec::new();
        for table in &metadata.tables {
            for fk in &table.foreign_keys {
                let child = tables.get(&table.name).ok_or_else(|| {
                    HtnqlError::Schema(format!("unknown child table {}", table.name))
                })?;
                if !child.columns.contains(&fk.column) {
                    return Err(HtnqlError::Schema(format!(
                        "foreign key column {} missing on table {}",
                        fk.column, table.name
                    )));
                }
                let parent = tables.get(&fk.references_table).ok_or_else(|| {
                    HtnqlError::Schema(format!(
                        "foreign key on {} references missing table {}",
                        table.name, fk.references_table
                    ))
                })?;
                if !parent.columns.contains(&fk.references_column) {
                    return Err(HtnqlError::Schema(format!(
                        "foreign key on {} references missing column {}.{}",
                        table.name, fk.references_table, fk.references_column
                    )));
                }
                edges.push(FkEdge {
                    child_table: table.name.clone(),
                    child_column: fk.column.clone(),
                    parent_table: fk.references_table.clone(),
                    parent_column: fk.references_column.clone(),
                });
            }
        }
        edges.sort();
        edges.dedup();

        Ok(Self { tables, edges })
    }

    pub fn tables(&self) -> BTreeSet<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn columns(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table).map(|node| &node.columns)
    }

    pub fn primary_key(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table).map(|node| &node.primary_key)
    }

    /// All FK edges touching `table`, in sorted edge order.
    pub fn edges_incident(&self, table: &str) -> Vec<&FkEdge> {
        self.edges.iter().filter(|e| e.touches(table)).collect()
    }

    /// Breadth-first shortest path on the undirected view. Neighbors expand
    /// in sorted edge order, so among equal-length paths the one through
    /// lexicographically smaller intermediate tables wins.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<FkEdge>> {
        if !self.tables.contains_key(from) || !self.tables.contains_key(to) {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }

        let mut predecessor: BTreeMap<String, (String, FkEdge)> = BTreeMap::new();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(from.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(from.to_string());

        while let Some(current) = queue.pop_front() {
            for edge in self.edges_incident(&current) {
                let Some(next) = edge.other_endpoint(&current) else {
                    continue;
                };
                if !visited.insert(next.to_string()) {
                    continue;
                }
                predecessor.insert(next.to_string(), (current.clone(), (*edge).clone()));
                if next == to {
                    let mut path = Vec::new();
                    let mut cursor = to.to_string();
                    while cursor != from {
                        let (prev, edge) = predecessor
                            .get(&cursor)
                            .expect("predecessor chain is complete for discovered nodes");
                        path.push(edge.clone());
                        cursor = prev.clone();
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next.to_string());
            }
        }
        None
    }

    /// Partition a requested table set by mutual reachability. Paths may run
    /// through tables outside the requested set.
    pub fn connected_components(&self, requested: &BTreeSet<String>) -> Vec<BTreeSet<String>> {
        let mut components: Vec<BTreeSet<String>> = Vec::new();
        let mut assigned: BTreeSet<String> = BTreeSet::new();

        for table in requested {
            if assigned.contains(table) {
                continue;
            }
            let reachable = self.reachable_from(table);
            let component: BTreeSet<String> = requested
                .iter()
                .filter(|t| reachable.contains(*t))
                .cloned()
                .collect();
            assigned.extend(component.iter().cloned());
            components.push(component);
        }
        components
    }

    fn reachable_from(&self, start: &str) -> BTreeSet<String> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        if !self.tables.contains_key(start) {
            return visited;
        }
        visited.insert(start.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(start.to_string());
        while let Some(current) = queue.pop_front() {
            for edge in self.edges_incident(&current) {
                if let Some(next) = edge.other_endpoint(&current) {
                    if visited.insert(next.to_string()) {
                        queue.push_back(next.to_string());
                    }
                }
            }
        }
        visited
    }
}
