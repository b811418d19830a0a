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

//! This is the UANodeSet loader.
//!
//! `nodesetld` imports one or more UANodeSet documents,
//!   in the order given,
//!   into a single in-memory address space and writes the nodes in the
//!   order that they were created.
//!
//! For more information about the loader,
//!   see the [`nodeset::ld`] module.

extern crate nodeset;

use getopts::{Fail, Options};
use nodeset::{
    arena::Arena,
    backend::AddressSpace,
    fs::{FsCanonicalizer, VisitOnceFilesystem},
    ld::{ImportError, Loader},
    types::TypeRegistry,
    value::NoValues,
};
use std::{
    env,
    error::Error,
    fmt::{self, Display},
    fs,
    io::{self, BufWriter, Write},
};
use tracing_subscriber::EnvFilter;

/// Types of commands
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Load(LoadOptions),
    Usage,
}

#[derive(Debug, PartialEq, Eq)]
struct LoadOptions {
    inputs: Vec<String>,
    output: Option<String>,
    types: bool,
    verbose: bool,
}

/// Import each input in turn and write the result.
fn load(opts: &LoadOptions) -> Result<(), NodesetldError> {
    let arena = Arena::new();
    let mut space = AddressSpace::new();
    let mut loader = Loader::new(&arena);
    let mut files = VisitOnceFilesystem::<FsCanonicalizer>::new();

    for path in &opts.inputs {
        let read = files
            .open::<fs::File, _>(path)
            .and_then(|file| file.read_document())
            .map_err(|e| NodesetldError::Import(path.clone(), e.into()))?;

        let input = match read {
            Some(input) => input,
            None => {
                tracing::debug!(path = %path, "skipping already loaded document");
                continue;
            }
        };

        let summary = loader
            .load(&input, &mut space, &mut NoValues)
            .map_err(|e| NodesetldError::Import(path.clone(), e))?;

        tracing::debug!(
            path = %path,
            emitted = summary.emitted,
            rejected = summary.rejected.len(),
            "loaded document"
        );
    }

    tracing::debug!(
        nodes = space.len(),
        arena_bytes = arena.allocated_bytes(),
        "loaded all documents"
    );

    let out: Box<dyn Write> = match &opts.output {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout()),
    };

    let mut out = BufWriter::new(out);

    write_nodes(&mut out, &space)?;

    if opts.types {
        write_types(&mut out, loader.types())?;
    }

    out.flush()?;
    Ok(())
}

/// Write each node in the order it was created.
fn write_nodes<W: Write>(out: &mut W, space: &AddressSpace) -> io::Result<()> {
    for node in space.iter() {
        writeln!(out, "{}\t{}\t{}", node.class(), node.id, node.browse_name)?;
    }

    Ok(())
}

/// Write the native layout of each custom data type.
fn write_types<W: Write>(out: &mut W, types: &TypeRegistry) -> io::Result<()> {
    for desc in types.iter() {
        if !desc.is_sized() {
            writeln!(out, "type\t{}\t{}\tunsized", desc.type_id, desc.type_name)?;
            continue;
        }

        writeln!(
            out,
            "type\t{}\t{}\t{}\tsize={}\talign={}",
            desc.type_id, desc.type_name, desc.kind, desc.mem_size, desc.align,
        )?;

        let offsets = desc.member_offsets(types);

        for (member, offset) in desc.members.iter().zip(offsets) {
            let shape = match (member.is_array, member.is_optional) {
                (true, _) => "[]",
                (false, true) => "?",
                (false, false) => "",
            };

            writeln!(
                out,
                "\t{offset}\t{}\t{}{shape}",
                member.name, member.declared_type
            )?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = match verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Entrypoint for the loader
pub fn main() {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = get_opts();
    let usage =
        opts.usage(&format!("Usage: {} [OPTIONS] INPUT...", program));

    match parse_options(opts, args.clone()) {
        Ok(Command::Load(load_opts)) => {
            init_logging(load_opts.verbose);

            if let Err(e) = load(&load_opts) {
                eprintln!("fatal: {e}");
                std::process::exit(e.exit_code());
            }
        }
        Ok(Command::Usage) => {
            println!("{}", usage);
            std::process::exit(exitcode::OK);
        }
        Err(e) => {
            eprintln!("{}", e);
            println!("{}", usage);
            std::process::exit(exitcode::USAGE);
        }
    }
}

/// Get 'Options'
fn get_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("o", "output", "write output to FILE", "FILE");
    opts.optflag("t", "types", "also write custom data type layouts");
    opts.optflag("v", "verbose", "log progress to stderr");
    opts.optflag("h", "help", "print this help menu");

    opts
}

/// Option parser
fn parse_options(opts: Options, args: Vec<String>) -> Result<Command, Fail> {
    let matches = opts.parse(&args[1..])?;

    if matches.opt_present("h") {
        return Ok(Command::Usage);
    }

    if matches.free.is_empty() {
        return Err(Fail::OptionMissing(String::from("INPUT")));
    }

    Ok(Command::Load(LoadOptions {
        inputs: matches.free.clone(),
        output: matches.opt_str("o"),
        types: matches.opt_present("t"),
        verbose: matches.opt_present("v"),
    }))
}

/// Loader (`nodesetld`) error.
#[derive(Debug)]
pub enum NodesetldError {
    Io(io::Error),

    /// Import of the document at the given path failed.
    Import(String, ImportError),
}

impl NodesetldError {
    fn exit_code(&self) -> exitcode::ExitCode {
        match self {
            Self::Io(_) | Self::Import(_, ImportError::Io(_)) => {
                exitcode::IOERR
            }
            Self::Import(..) => exitcode::DATAERR,
        }
    }
}

impl From<io::Error> for NodesetldError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl Display for NodesetldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => Display::fmt(e, f),
            Self::Import(path, e) => {
                write!(f, "failed to load `{path}`: {e}")
            }
        }
    }
}

impl Error for NodesetldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Import(_, e) => Some(e),
        }
    }
}
