// Nodeset document filesystem access
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

//! Filesystem access for nodeset documents.
//!
//! Documents are read whole,
//!   since the router retains slices of `<Value>` content by byte offset.
//!
//!
//! Visiting Files Once
//! ===================
//! A document imported twice into the same backend would declare every
//!   one of its nodes a second time.
//! [`VisitOnceFilesystem`] therefore produces [`VisitOnceFile::FirstVisit`]
//!   the first time it encounters a given path,
//!     and [`VisitOnceFile::Visited`] every time thereafter,
//!     after canonicalizing the path so that different spellings of the
//!     same file are recognized.

use fxhash::FxBuildHasher;
use std::collections::HashSet;
use std::fs;
use std::hash::BuildHasher;
use std::io::{Read, Result};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A document file.
pub trait File: Sized {
    fn open<P: AsRef<Path>>(path: P) -> Result<Self>;

    /// Read the entire document.
    fn read_document(self) -> Result<String>;
}

impl File for fs::File {
    fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path)
    }

    fn read_document(mut self) -> Result<String> {
        let mut buf = String::new();
        self.read_to_string(&mut buf)?;

        Ok(buf)
    }
}

/// A potentially visited [`File`].
///
/// See [`VisitOnceFilesystem`] for more information.
#[derive(Debug, PartialEq)]
pub enum VisitOnceFile<F: File> {
    /// First time visiting file at requested path.
    FirstVisit(F),

    /// Requested path has already been visited.
    Visited,
}

impl<F: File> VisitOnceFile<F> {
    /// Read the document if this is its first visit.
    pub fn read_document(self) -> Result<Option<String>> {
        match self {
            Self::FirstVisit(file) => file.read_document().map(Some),
            Self::Visited => Ok(None),
        }
    }
}

/// Opens each path only once.
///
/// A path is not marked as visited if it fails to be opened.
pub struct VisitOnceFilesystem<C, S = FxBuildHasher>
where
    C: Canonicalizer,
    S: BuildHasher,
{
    visited: HashSet<PathBuf, S>,
    _c: PhantomData<C>,
}

impl<C, S> VisitOnceFilesystem<C, S>
where
    C: Canonicalizer,
    S: BuildHasher + Default,
{
    pub fn new() -> Self {
        Self {
            visited: Default::default(),
            _c: PhantomData,
        }
    }

    /// Number of visited paths.
    pub fn visit_len(&self) -> usize {
        self.visited.len()
    }
}

impl<C, S> VisitOnceFilesystem<C, S>
where
    C: Canonicalizer,
    S: BuildHasher,
{
    /// Open the file at `path`,
    ///   marking it as visited.
    pub fn open<F: File, P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<VisitOnceFile<F>> {
        let cpath = C::canonicalize(path)?;

        if self.visited.contains(&cpath) {
            return Ok(VisitOnceFile::Visited);
        }

        let file = F::open(&cpath)?;
        self.visited.insert(cpath);

        Ok(VisitOnceFile::FirstVisit(file))
    }
}

impl<C, S> Default for VisitOnceFilesystem<C, S>
where
    C: Canonicalizer,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

pub trait Canonicalizer {
    fn canonicalize<P: AsRef<Path>>(path: P) -> Result<PathBuf>;
}

/// Canonicalization through the real filesystem,
///   resolving symlinks and relative components.
pub struct FsCanonicalizer;

impl Canonicalizer for FsCanonicalizer {
    fn canonicalize<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
        fs::canonicalize(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[derive(Debug, PartialEq)]
    struct DummyFile(PathBuf);

    impl File for DummyFile {
        fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref().to_path_buf();

            match path.to_string_lossy().starts_with("missing") {
                true => Err(Error::new(ErrorKind::NotFound, "missing")),
                false => Ok(Self(path)),
            }
        }

        fn read_document(self) -> Result<String> {
            Ok(self.0.display().to_string())
        }
    }

    struct StubCanonicalizer;

    impl Canonicalizer for StubCanonicalizer {
        fn canonicalize<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
            let mut buf = path.as_ref().to_path_buf();
            buf.push("CANONICALIZED");

            Ok(buf)
        }
    }

    type Sut = VisitOnceFilesystem<StubCanonicalizer>;

    #[test]
    fn visit_once() {
        let mut fs = Sut::new();
        let path: PathBuf = "foo/bar.xml".into();

        let result: VisitOnceFile<DummyFile> = fs.open(&path).unwrap();

        // First time, return file.
        assert_eq!(
            VisitOnceFile::FirstVisit(DummyFile(
                "foo/bar.xml/CANONICALIZED".into()
            )),
            result
        );

        // Second time, already visited.
        let result: VisitOnceFile<DummyFile> = fs.open(&path).unwrap();
        assert_eq!(VisitOnceFile::Visited, result);
        assert_eq!(1, fs.visit_len());
    }

    #[test]
    fn failed_open_is_not_visited() {
        let mut fs = Sut::new();

        assert!(fs.open::<DummyFile, _>("missing.xml").is_err());
        assert_eq!(0, fs.visit_len());
    }

    #[test]
    fn visited_file_reads_nothing() {
        let mut fs = Sut::new();

        let first = fs.open::<DummyFile, _>("a.xml").unwrap();
        let second = fs.open::<DummyFile, _>("a.xml").unwrap();

        assert_eq!(
            Some("a.xml/CANONICALIZED".to_string()),
            first.read_document().unwrap()
        );
        assert_eq!(None, second.read_document().unwrap());
    }
}
