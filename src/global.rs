// Global constants across the entirety of the loader
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

//! System-wide static configuration.
//!
//! This module provides a system-wide configuration.
//! Subsystems should reference these values rather than defining their own
//!   and risk incompatibilities or maintenance issues as requirements
//!   change.
//!
//! By convention,
//!   import this entire module rather than individual members and reference
//!   them as `global::foo` to emphasize their nature and risk.

/// A size capable of representing every namespace known to a backend.
///
/// This is the width of the namespace component of a
///   [`NodeId`](crate::id::NodeId),
///     both in the local (per-document) and global (per-backend) sense.
pub type NamespaceIndex = u16;

/// URI of the base namespace.
///
/// This namespace always occupies index `0` and is never remapped.
pub const BASE_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// Number of additional attempts made to add nodes that a backend
///   rejected during the first emission pass.
///
/// Each attempt retries only those nodes that failed in the attempt
///   before it.
pub const MAX_BACKEND_RETRIES: usize = 10;

/// Upper bound on deferred reference resolution passes at the end of a
///   document.
///
/// Every pass either resolves at least one pending node or terminates the
///   loop,
///     so this bound guards only against a defect in that invariant.
pub const MAX_RESOLVE_PASSES: usize = 64;

/// Capacity of the parser state stack.
///
/// Unknown subtrees and `Value` payloads are tracked by depth counters
///   rather than by stack entries,
///     so the stack depth is bounded by the nesting of the recognized
///     UANodeSet elements.
/// The deepest such nesting is [`MAX_RECOGNIZED_DEPTH`];
///   exceeding this capacity is therefore a defect in the router,
///   which is reported as an import error rather than a panic.
pub const MAX_STATE_DEPTH: usize = 16;

/// Deepest nesting of parser states:
///   the initial state,
///   `UANodeSet`,
///   a node,
///   `Definition`,
///   `Field`,
///   and one entry for any unknown subtree within it.
pub const MAX_RECOGNIZED_DEPTH: usize = 6;

const_assert!(MAX_BACKEND_RETRIES > 0);
const_assert!(MAX_STATE_DEPTH > MAX_RECOGNIZED_DEPTH);
