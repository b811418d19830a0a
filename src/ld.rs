// UANodeSet loader
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

//! The loader imports UANodeSet documents into a [`Backend`].
//!
//! Its user-facing binary is [`nodesetld`][nodesetld].
//!
//! An import proceeds in three steps:
//!
//!   1. The document is [parsed](crate::xml) into a
//!        [`NodeSet`](crate::node::NodeSet),
//!          classifying every reference and recording the dependencies
//!          of each node on its parents.
//!   2. Those dependencies are [sorted](crate::sort).
//!      A cycle fails the import before any node is emitted.
//!   3. Nodes are emitted to the backend grouped by
//!        [class](NodeClass::EMIT_ORDER),
//!          in dependency order within each group.
//!      Data types are [laid out](crate::types) as they are emitted;
//!        once all data types of the document have been emitted,
//!        the layout of each is computed.
//!
//! A node rejected by the backend is offered again after the rest of
//!   the document,
//!     up to [`global::MAX_BACKEND_RETRIES`] times.
//! Nodes that are still rejected do not fail the import;
//!   they are reported in the [`ImportSummary`].
//!
//! Sequential Imports
//! ==================
//! A single [`Loader`] may import any number of documents in sequence
//!   into the same backend.
//! Reference types and data types declared by earlier documents are
//!   available to later ones,
//!     but a document may reference nodes of another only if that other
//!     document was imported first.
//!
//! Imports are not transactional:
//!   a failed import leaves the backend with whatever was emitted before
//!   the failure.
//!
//! [nodesetld]: ../../nodesetld

use crate::arena::Arena;
use crate::backend::Backend;
use crate::global;
use crate::node::{Node, NodeClass, NodeRef, NodeSet};
use crate::ns::NamespaceError;
use crate::refs::RefClassifier;
use crate::sort::SortError;
use crate::types::{LayoutError, TypeRegistry};
use crate::value::ValueHandler;
use crate::xml::{Document, NodesetParser};
use std::error::Error;
use std::fmt::{self, Display};
use std::io;

pub type ImportResult<T> = Result<T, ImportError>;

/// Importer of UANodeSet documents.
///
/// All text of imported documents is retained in `arena`,
///   which must therefore outlive the backend receiving the nodes.
pub struct Loader<'a> {
    arena: &'a Arena,

    /// Reference types known from previous imports.
    classifier: RefClassifier<'a>,

    types: TypeRegistry<'a>,
}

impl<'a> Loader<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self {
            arena,
            classifier: RefClassifier::new(),
            types: TypeRegistry::new(),
        }
    }

    /// Custom data types of every document imported so far.
    pub fn types(&self) -> &TypeRegistry<'a> {
        &self.types
    }

    /// Reference types of every document imported so far.
    pub fn classifier(&self) -> &RefClassifier<'a> {
        &self.classifier
    }

    /// Import the document `input` into `backend`,
    ///   delivering each node value to `values`.
    ///
    /// Errors
    /// ======
    /// Malformed XML,
    ///   undeclared namespaces,
    ///   unclassifiable references,
    ///   and dependency cycles all fail the import.
    /// Backend rejections and layout diagnostics do not;
    ///   see [`ImportSummary`].
    pub fn load<B, V>(
        &mut self,
        input: &str,
        backend: &mut B,
        values: &mut V,
    ) -> ImportResult<ImportSummary>
    where
        B: Backend<'a> + ?Sized,
        V: ValueHandler<'a> + ?Sized,
    {
        let parser = NodesetParser::new(self.arena, self.classifier.clone());

        let Document {
            nodes,
            classifier,
            sort,
            ..
        } = parser.parse(input, backend, values)?;

        let order = sort.sort()?;

        // Reference types of this document are known to be sound only
        //   once it has sorted.
        self.classifier = classifier;

        let mut summary = ImportSummary::default();
        let mut rejected = Vec::new();

        for class in NodeClass::EMIT_ORDER {
            let group = order
                .iter()
                .copied()
                .filter(|&nref| nodes.get(nref).class() == class);

            for nref in group {
                let node = nodes.get(nref);

                if class == NodeClass::DataType {
                    self.register_type(node, &nodes, &mut summary);
                }

                match backend.add_node(node) {
                    Ok(()) => Self::emitted(node, &mut summary),
                    Err(e) => rejected.push((nref, e.to_string())),
                }
            }

            if class == NodeClass::DataType {
                self.finalize_types(&nodes, &mut summary);
            }
        }

        self.retry(rejected, &nodes, backend, &mut summary);

        tracing::debug!(
            emitted = summary.emitted,
            rejected = summary.rejected.len(),
            layout_errors = summary.layout_errors.len(),
            "imported document"
        );

        Ok(summary)
    }

    fn emitted(node: &Node, summary: &mut ImportSummary) {
        tracing::trace!(
            class = %node.class(),
            id = %node.id,
            browse_name = %node.browse_name,
            "emitted node"
        );

        summary.emitted += 1;
    }

    fn register_type(
        &mut self,
        node: &Node<'a>,
        nodes: &NodeSet<'a>,
        summary: &mut ImportSummary,
    ) {
        if let Err(e) = self.types.register(node, nodes) {
            tracing::error!(%e, "unable to register data type");
            summary.layout_errors.push(e);
        }
    }

    fn finalize_types(&mut self, nodes: &NodeSet<'a>, summary: &mut ImportSummary) {
        for e in self.types.finalize(nodes) {
            tracing::error!(%e, "unable to lay out data type");
            summary.layout_errors.push(e);
        }
    }

    /// Offer rejected nodes to `backend` again,
    ///   each retry attempting only those nodes that failed the last.
    fn retry<B: Backend<'a> + ?Sized>(
        &self,
        mut rejected: Vec<(NodeRef, String)>,
        nodes: &NodeSet<'a>,
        backend: &mut B,
        summary: &mut ImportSummary,
    ) {
        for attempt in 1..=global::MAX_BACKEND_RETRIES {
            if rejected.is_empty() {
                break;
            }

            tracing::debug!(attempt, nodes = rejected.len(), "retrying nodes");

            rejected = rejected
                .into_iter()
                .filter_map(|(nref, _)| {
                    let node = nodes.get(nref);

                    match backend.add_node(node) {
                        Ok(()) => {
                            Self::emitted(node, summary);
                            None
                        }
                        Err(e) => Some((nref, e.to_string())),
                    }
                })
                .collect();
        }

        for (nref, reason) in rejected {
            let node = nodes.get(nref);

            tracing::warn!(id = %node.id, %reason, "node rejected by backend");

            summary.rejected.push(Rejection {
                node: node.id.to_string(),
                reason,
            });
        }
    }
}

/// Outcome of a successful import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Number of nodes accepted by the backend.
    pub emitted: usize,

    /// Nodes that the backend rejected on every attempt.
    pub rejected: Vec<Rejection>,

    /// Data types that could not be laid out.
    pub layout_errors: Vec<LayoutError>,
}

/// A node that the backend refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub node: String,

    /// Reason given by the backend on the final attempt.
    pub reason: String,
}

/// Failure of an import.
#[derive(Debug)]
pub enum ImportError {
    /// The document could not be read.
    Io(io::Error),

    /// The document is not well-formed XML.
    Xml(quick_xml::Error),

    /// The document uses an undeclared namespace index.
    Namespace(NamespaceError),

    /// References of a node have a reference type that was never
    ///   declared.
    UnresolvedReference {
        node: String,
        references: Vec<String>,
    },

    /// Nodes depend on one another cyclically.
    Sort(SortError),

    /// Recognized elements are nested beyond the given depth.
    ///
    /// See [`global::MAX_STATE_DEPTH`].
    NestingTooDeep(usize),
}

impl From<io::Error> for ImportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<quick_xml::Error> for ImportError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e)
    }
}

impl From<NamespaceError> for ImportError {
    fn from(e: NamespaceError) -> Self {
        Self::Namespace(e)
    }
}

impl From<SortError> for ImportError {
    fn from(e: SortError) -> Self {
        Self::Sort(e)
    }
}

impl Display for ImportError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => e.fmt(fmt),
            Self::Xml(e) => write!(fmt, "malformed XML: {e}"),
            Self::Namespace(e) => e.fmt(fmt),
            Self::UnresolvedReference { node, references } => write!(
                fmt,
                "node {node} has references of undeclared type {}",
                references.join(", ")
            ),
            Self::Sort(e) => e.fmt(fmt),
            Self::NestingTooDeep(max) => {
                write!(fmt, "elements nested more than {max} deep")
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Xml(e) => Some(e),
            Self::Namespace(e) => Some(e),
            Self::Sort(e) => Some(e),
            Self::UnresolvedReference { .. } | Self::NestingTooDeep(_) => None,
        }
    }
}
