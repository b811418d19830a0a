// Dependency sort of nodes
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of TAME.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Topological sort of nodes by their hierarchical dependencies.
//!
//! Every inverse hierarchical reference of a node names a node that must
//!   be created before it
//!     (its parent, or its supertype via `HasSubtype`).
//! [`DependencySort`] records an edge `parent -> child` for each such
//!   reference and produces an order in which every parent precedes all of
//!   its children.
//!
//! Entries are keyed by [`NodeId`] in an ordered map;
//!   a reference to a node that has not (yet) been declared creates a
//!   _placeholder_ entry.
//! Placeholders take part in the sort like any other entry but produce no
//!   output,
//!     since they stand for nodes that already exist in the backend
//!     (such as the base namespace)
//!     or that are simply missing.
//!
//! The sort is performed in _waves_ à la Kahn:
//!   each wave consists of every entry whose dependencies have all been
//!   emitted,
//!     in identifier order.
//! No ordering is guaranteed between the members of a single wave beyond
//!   that.
//!
//! Errors
//! ======
//! If a wave is empty while entries remain,
//!   those entries participate in (or depend upon) a cycle.
//! The sort then fails with [`SortError::Cycles`] rather than emitting a
//!   partial order;
//!     the strongly connected components of the graph are computed only
//!     in that case to report the offending nodes.

use crate::id::NodeId;
use crate::node::{Node, NodeRef};
use fixedbitset::FixedBitSet;
use petgraph::{
    graph::{DiGraph, NodeIndex},
    Direction,
};
use std::{collections::BTreeMap, error::Error, fmt::Display};

/// Result of [`DependencySort::sort`].
pub type SortResult<T> = Result<T, SortError>;

/// Entry of the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortEntry<'a> {
    id: NodeId<'a>,

    /// Declared node,
    ///   or [`None`] for a placeholder.
    node: Option<NodeRef>,
}

/// Dependency graph of the nodes of a document.
#[derive(Debug, Default)]
pub struct DependencySort<'a> {
    graph: DiGraph<SortEntry<'a>, ()>,
    index: BTreeMap<NodeId<'a>, NodeIndex>,
}

impl<'a> DependencySort<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Look up the entry for `id`,
    ///   creating a placeholder if it does not yet exist.
    fn lookup_or_missing(&mut self, id: NodeId<'a>) -> NodeIndex {
        let graph = &mut self.graph;

        *self
            .index
            .entry(id)
            .or_insert_with(|| graph.add_node(SortEntry { id, node: None }))
    }

    /// Add the declared node `node`,
    ///   addressed by `nref`,
    ///   along with an edge from each of its parents.
    ///
    /// If a node of the same identifier was already added,
    ///   the later declaration replaces it
    ///     (including its dependencies).
    pub fn add_node(&mut self, nref: NodeRef, node: &Node<'a>) {
        let ix = self.lookup_or_missing(node.id);

        if self.graph[ix].node.replace(nref).is_some() {
            tracing::warn!(id = %node.id, "duplicate node id; later declaration wins");

            while let Some(edge) = self.graph.first_edge(ix, Direction::Incoming)
            {
                self.graph.remove_edge(edge);
            }
        }

        for parent in node.refs.parents() {
            let pix = self.lookup_or_missing(parent.target);
            self.graph.add_edge(pix, ix, ());
        }
    }

    /// Number of entries,
    ///   including placeholders.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Whether a node with identifier `id` has been declared
    ///   (as opposed to merely referenced).
    pub fn contains(&self, id: NodeId<'_>) -> bool {
        self.index
            .get(&id)
            .map(|ix| self.graph[*ix].node.is_some())
            .unwrap_or(false)
    }

    /// Number of entries that were referenced but never declared.
    pub fn placeholder_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|entry| entry.node.is_none())
            .count()
    }

    /// Order declared nodes such that every parent precedes its children.
    ///
    /// Errors
    /// ======
    /// - [`SortError::Cycles`] if any entry could not be ordered.
    pub fn sort(&self) -> SortResult<Vec<NodeRef>> {
        let graph = &self.graph;
        let count = graph.node_count();

        let mut indegree: Vec<usize> = graph
            .node_indices()
            .map(|ix| graph.edges_directed(ix, Direction::Incoming).count())
            .collect();

        let mut done = FixedBitSet::with_capacity(count);
        let mut order = Vec::with_capacity(count);
        let mut remaining = count;
        let mut waves = 0usize;

        loop {
            let wave: Vec<NodeIndex> = self
                .index
                .values()
                .copied()
                .filter(|ix| !done.contains(ix.index()))
                .filter(|ix| indegree[ix.index()] == 0)
                .collect();

            if wave.is_empty() {
                break;
            }

            waves += 1;

            for ix in wave {
                done.insert(ix.index());
                remaining -= 1;

                if let Some(nref) = graph[ix].node {
                    order.push(nref);
                }

                for dep in graph.neighbors_directed(ix, Direction::Outgoing) {
                    indegree[dep.index()] -= 1;
                }
            }
        }

        tracing::debug!(entries = count, waves, remaining, "dependency sort");

        match remaining {
            0 => Ok(order),
            _ => Err(SortError::Cycles {
                remaining,
                cycles: self.cycles(),
            }),
        }
    }

    /// Strongly connected components that form cycles,
    ///   rendered as identifiers.
    fn cycles(&self) -> Vec<Vec<String>> {
        petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                // A single entry is a cycle only if it is its own parent.
                scc.len() > 1
                    || self
                        .graph
                        .neighbors(scc[0])
                        .any(|nx| nx == scc[0])
            })
            .map(|scc| {
                let mut ids: Vec<_> =
                    scc.iter().map(|ix| self.graph[*ix].id).collect();
                ids.sort();
                ids.into_iter().map(|id| id.to_string()).collect()
            })
            .collect()
    }
}

/// Error during dependency sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    /// The dependency graph has at least one cycle.
    ///
    /// `remaining` is the number of entries that could not be ordered,
    ///   which includes entries that merely depend on a cycle.
    Cycles {
        remaining: usize,
        cycles: Vec<Vec<String>>,
    },
}

impl Display for SortError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Cycles { remaining, cycles } => {
                write!(
                    fmt,
                    "cyclic dependencies ({remaining} nodes could not be sorted)"
                )?;

                for cycle in cycles {
                    write!(fmt, "; cycle: {}", cycle.join(" -> "))?;
                }

                Ok(())
            }
        }
    }
}

impl Error for SortError {}

#[cfg(test)]
mod test;
