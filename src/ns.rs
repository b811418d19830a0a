// Document namespace table
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

//! Translation of document-local namespace indexes.
//!
//! Each UANodeSet document declares the namespaces it uses in its
//!   `NamespaceUris` block;
//!     the first `<Uri>` is local index `1`,
//!     the second is `2`,
//!     and so on.
//! Local index `0` is always the base namespace
//!   ([`global::BASE_NAMESPACE_URI`]).
//!
//! The backend decides what global index each URI receives
//!   (see [`NamespaceRegistry`]),
//!     and [`NamespaceTable`] remembers that decision so that every
//!     namespace index parsed from the document can be translated.

use crate::global::{self, NamespaceIndex};
use std::{error::Error, fmt::Display};

/// Assigns global namespace indexes to namespace URIs.
///
/// This is invoked once per `<Uri>` of a document's `NamespaceUris` block,
///   in document order.
/// The returned index is opaque to the loader;
///   it is simply echoed back by [`NamespaceTable::translate`].
pub trait NamespaceRegistry {
    fn add_namespace(&mut self, uri: &str) -> NamespaceIndex;
}

impl<F> NamespaceRegistry for F
where
    F: FnMut(&str) -> NamespaceIndex,
{
    fn add_namespace(&mut self, uri: &str) -> NamespaceIndex {
        self(uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NamespaceEntry<'a> {
    uri: &'a str,
    global: NamespaceIndex,
}

/// Per-document mapping of local namespace indexes to global indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTable<'a> {
    entries: Vec<NamespaceEntry<'a>>,
}

impl<'a> NamespaceTable<'a> {
    /// Create a table containing only the base namespace.
    pub fn new() -> Self {
        Self {
            entries: vec![NamespaceEntry {
                uri: global::BASE_NAMESPACE_URI,
                global: 0,
            }],
        }
    }

    /// Declare the next document namespace `uri`,
    ///   registering it with `registry`.
    ///
    /// Returns the new local index.
    pub fn new_namespace<R: NamespaceRegistry + ?Sized>(
        &mut self,
        uri: &'a str,
        registry: &mut R,
    ) -> NamespaceIndex {
        let local = self.entries.len() as NamespaceIndex;
        let global = registry.add_namespace(uri);

        tracing::debug!(uri, local, global, "registered namespace");

        self.entries.push(NamespaceEntry { uri, global });
        local
    }

    /// Translate local index `local` into the global index assigned by the
    ///   backend.
    ///
    /// The base namespace `0` always translates to itself.
    ///
    /// Errors
    /// ======
    /// - [`NamespaceError::OutOfRange`] if `local` was never declared.
    pub fn translate(
        &self,
        local: NamespaceIndex,
    ) -> Result<NamespaceIndex, NamespaceError> {
        match local {
            0 => Ok(0),
            _ => self
                .entries
                .get(local as usize)
                .map(|entry| entry.global)
                .ok_or(NamespaceError::OutOfRange(local)),
        }
    }

    /// URI of the namespace at local index `local`.
    pub fn uri(&self, local: NamespaceIndex) -> Option<&'a str> {
        self.entries.get(local as usize).map(|entry| entry.uri)
    }

    /// Number of namespaces,
    ///   including the base namespace.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        // The base namespace is always present.
        false
    }
}

impl Default for NamespaceTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Error translating a namespace index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// The document referenced a namespace index that it never declared
    ///   in its `NamespaceUris` block.
    OutOfRange(NamespaceIndex),
}

impl Display for NamespaceError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::OutOfRange(index) => {
                write!(fmt, "undeclared namespace index {index}")
            }
        }
    }
}

impl Error for NamespaceError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_namespace_is_never_remapped() {
        let sut = NamespaceTable::new();

        assert_eq!(Ok(0), sut.translate(0));
        assert_eq!(Some(global::BASE_NAMESPACE_URI), sut.uri(0));
        assert_eq!(1, sut.len());
    }

    #[test]
    fn translates_through_registry_result() {
        let mut sut = NamespaceTable::new();
        let mut given = Vec::new();

        let mut registry = |uri: &str| {
            given.push(uri.to_string());
            given.len() as NamespaceIndex + 4
        };

        assert_eq!(1, sut.new_namespace("urn:a", &mut registry));
        assert_eq!(2, sut.new_namespace("urn:b", &mut registry));

        assert_eq!(Ok(5), sut.translate(1));
        assert_eq!(Ok(6), sut.translate(2));
        assert_eq!(Some("urn:b"), sut.uri(2));

        assert_eq!(vec!["urn:a".to_string(), "urn:b".to_string()], given);
    }

    #[test]
    fn undeclared_index_is_out_of_range() {
        let mut sut = NamespaceTable::new();
        sut.new_namespace("urn:a", &mut |_: &str| 3 as NamespaceIndex);

        assert_eq!(Err(NamespaceError::OutOfRange(2)), sut.translate(2));
    }
}
