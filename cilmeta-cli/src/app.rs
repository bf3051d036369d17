use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cilmeta - inspect and re-emit ECMA-335 metadata
#[derive(Debug, Parser)]
#[command(name = "cilmeta", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Reject inputs that need a reader quirk instead of tolerating them.
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display the metadata root: version, streams and heap index widths.
    Info {
        /// A metadata blob, or a PE file containing one.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List metadata tables and row counts, or the rows of one table.
    Tables {
        /// A metadata blob, or a PE file containing one.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Show the rows of a specific table (e.g., TypeDef, MethodDef).
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Dump a metadata heap (strings, userstrings, guid, blob).
    Heaps {
        /// A metadata blob, or a PE file containing one.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// The heap to dump; without it, a summary of all heaps.
        #[arg(long)]
        heap: Option<String>,
    },

    /// Re-emit the metadata and compare it byte for byte with the input.
    Roundtrip {
        /// A metadata blob, or a PE file containing one.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Write the re-emitted metadata here.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Re-emit through the writer, which rebuilds every heap and table, instead of
        /// re-encoding the tables stream in place.
        #[arg(long)]
        rewrite: bool,
    },
}
