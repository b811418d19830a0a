// Document text arena
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

//! Bump allocation of parsed text.
//!
//! Every string that outlives a single parser event
//!   (identifiers, browse names, localized text, captured values)
//!   is copied into an [`Arena`].
//! Strings are never freed individually;
//!   the entire arena is released at once when it is dropped.
//!
//! Node graphs borrow from the arena,
//!   which is why most types in this crate carry a lifetime `'a`:
//!     a [`Node<'a>`](crate::node::Node) is valid for exactly as long as the
//!     arena that owns its text.
//! No in-flight reference into the arena can be invalidated mid-parse,
//!   since the arena only ever grows.
//!
//! ```
//! use nodeset::arena::Arena;
//!
//! let arena = Arena::new();
//!
//! let mut buf = arena.text_buf();
//! buf.push_str("Default ");
//! buf.push_str("Binary");
//!
//! let text: &str = buf.into_str();
//! assert_eq!("Default Binary", text);
//! assert_eq!("ns=1;i=5", arena.alloc_str("ns=1;i=5"));
//! ```

use bumpalo::{collections::String as BumpString, Bump};
use std::fmt::{self, Debug};

/// Region allocator for document text.
///
/// This is a thin wrapper around [`bumpalo::Bump`] that exposes only what
///   the loader requires.
/// The arena assumes a single writer;
///   it is deliberately not [`Sync`].
#[derive(Default)]
pub struct Arena {
    bump: Bump,
}

impl Arena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Create an arena with room for at least `bytes` bytes before the
    ///   first chunk must be grown.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bump: Bump::with_capacity(bytes),
        }
    }

    /// Copy `s` into the arena.
    #[inline]
    pub fn alloc_str<'a>(&'a self, s: &str) -> &'a str {
        self.bump.alloc_str(s)
    }

    /// Copy `s` into the arena,
    ///   or return [`None`] if `s` is empty.
    ///
    /// Empty text in a UANodeSet is equivalent to absent text.
    pub fn alloc_nonempty<'a>(&'a self, s: &str) -> Option<&'a str> {
        match s {
            "" => None,
            _ => Some(self.alloc_str(s)),
        }
    }

    /// A growable text buffer whose storage lives in the arena.
    ///
    /// Character data for a single construct is accumulated into such a
    ///   buffer and frozen into a `&'a str` once the construct ends.
    pub fn text_buf(&self) -> TextBuf<'_> {
        TextBuf(BumpString::new_in(&self.bump))
    }

    /// Total number of bytes allocated for arena chunks.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

/// Growable string backed by an [`Arena`].
///
/// See [`Arena::text_buf`].
pub struct TextBuf<'a>(BumpString<'a>);

impl<'a> TextBuf<'a> {
    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.0.push_str(s)
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Freeze the buffer into a string slice that lives as long as the
    ///   arena.
    pub fn into_str(self) -> &'a str {
        self.0.into_bump_str()
    }
}

impl<'a> Debug for TextBuf<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self.as_str(), f)
    }
}
