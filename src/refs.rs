// Reference classification
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

//! Classification of references as hierarchical or non-hierarchical.
//!
//! Only hierarchical references impose an order on node creation,
//!   so every reference must be classified before its node can be sorted.
//! The classification of a reference is determined by its reference type,
//!   and reference types may themselves be declared by the document being
//!   loaded---potentially _after_ their first use.
//! A reference that cannot yet be classified is placed in the
//!   [unknown bucket](RefBucket::Unknown) of its node and is retried by
//!   [`RefClassifier::resolve_deferred`] once more reference types are
//!   known.
//!
//! The base namespace is assumed to be fully known:
//!   any reference type in namespace `0` that is not among the
//!   hierarchical seed types is non-hierarchical.

use crate::id::{well_known, NodeId};
use crate::node::{Node, RefBucket, Reference};
use fxhash::FxHashSet;

/// Hierarchical reference types of the base namespace.
pub const HIERARCHICAL_SEED: [NodeId<'static>; 10] = [
    NodeId::new(0, "i=33"), // HierarchicalReferences
    NodeId::new(0, "i=34"), // HasChild
    NodeId::new(0, "i=35"), // Organizes
    NodeId::new(0, "i=36"), // HasEventSource
    NodeId::new(0, "i=44"), // Aggregates
    NodeId::new(0, "i=45"), // HasSubtype
    NodeId::new(0, "i=46"), // HasProperty
    NodeId::new(0, "i=47"), // HasComponent
    NodeId::new(0, "i=48"), // HasNotifier
    NodeId::new(0, "i=49"), // HasOrderedComponent
];

/// Classifier of references.
///
/// A classifier accumulates the reference types of every document it has
///   seen,
///     so that a later import may use reference types declared by an
///     earlier one.
#[derive(Debug, Clone)]
pub struct RefClassifier<'a> {
    hierarchical: FxHashSet<NodeId<'a>>,
    non_hierarchical: FxHashSet<NodeId<'a>>,
}

impl<'a> RefClassifier<'a> {
    /// Create a classifier knowing only the hierarchical reference types of
    ///   the base namespace.
    pub fn new() -> Self {
        Self::with_hierarchical(HIERARCHICAL_SEED)
    }

    /// Create a classifier with an explicit set of hierarchical reference
    ///   types.
    pub fn with_hierarchical(
        seed: impl IntoIterator<Item = NodeId<'a>>,
    ) -> Self {
        Self {
            hierarchical: seed.into_iter().collect(),
            non_hierarchical: Default::default(),
        }
    }

    pub fn is_hierarchical(&self, reference: &Reference) -> bool {
        self.hierarchical.contains(&reference.ref_type)
    }

    pub fn is_non_hierarchical(&self, reference: &Reference) -> bool {
        reference.ref_type.is_base()
            || self.non_hierarchical.contains(&reference.ref_type)
    }

    /// Whether `reference` is the `HasTypeDefinition` of an instance,
    ///   which is stored on the node itself rather than in a bucket.
    pub fn is_type_definition_ref(&self, reference: &Reference) -> bool {
        reference.ref_type == well_known::HAS_TYPE_DEFINITION
    }

    /// Determine the bucket that `reference` belongs in.
    pub fn classify(&self, reference: &Reference) -> RefBucket {
        if self.is_hierarchical(reference) {
            RefBucket::Hierarchical
        } else if self.is_non_hierarchical(reference) {
            RefBucket::NonHierarchical
        } else {
            RefBucket::Unknown
        }
    }

    /// Learn the classification of the reference type declared by `node`.
    ///
    /// A reference type whose inverse hierarchical references
    ///   (its supertype via `HasSubtype`)
    ///   target a known hierarchical reference type is itself
    ///   hierarchical;
    ///     any other reference type is non-hierarchical.
    ///
    /// Returns whether the reference type was found to be hierarchical.
    pub fn register_reference_type(&mut self, node: &Node<'a>) -> bool {
        let hierarchical = node
            .refs
            .parents()
            .any(|r| self.hierarchical.contains(&r.target));

        if hierarchical {
            self.hierarchical.insert(node.id);
        } else {
            self.non_hierarchical.insert(node.id);
        }

        tracing::trace!(id = %node.id, hierarchical, "reference type");

        hierarchical
    }

    /// Re-attempt classification of each unknown reference of `node`.
    ///
    /// References that can now be classified are moved into their
    ///   respective bucket.
    /// Returns `true` if no unknown references remain.
    pub fn resolve_deferred(&self, node: &mut Node<'a>) -> bool {
        let pending = std::mem::take(&mut node.refs.unknown);

        for reference in pending {
            let bucket = self.classify(&reference);
            node.refs.attach(reference, bucket);
        }

        !node.refs.has_unknown()
    }

    pub fn hierarchical(&self) -> impl Iterator<Item = &NodeId<'a>> {
        self.hierarchical.iter()
    }

    pub fn non_hierarchical(&self) -> impl Iterator<Item = &NodeId<'a>> {
        self.non_hierarchical.iter()
    }
}

impl Default for RefClassifier<'_> {
    fn default() -> Self {
        Self::new()
    }
}
