use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cildecode - CIL method body decoding and inspection
#[derive(Debug, Parser)]
#[command(name = "cildecode", version, about, long_about = None)]
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
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode the CIL code in a file (ildasm-style output).
    Disasm {
        /// File holding raw CIL bytes.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Input is hex text (whitespace, commas and 0x prefixes are ignored).
        #[arg(long)]
        hex: bool,

        /// Input starts with a tiny or fat method header.
        #[arg(long)]
        body: bool,

        /// Show raw IL bytes alongside instructions.
        #[arg(long)]
        bytes: bool,
    },

    /// Decode every .il, .bin and .hex file under a directory in parallel.
    Batch {
        /// Directory to scan recursively.
        #[arg(value_name = "DIR")]
        path: PathBuf,

        /// Treat every file as hex text (files ending in .hex always are).
        #[arg(long)]
        hex: bool,

        /// Files start with a tiny or fat method header.
        #[arg(long)]
        body: bool,
    },

    /// List the opcode table.
    Opcodes {
        /// Show only opcodes with this operand kind (e.g., LongBranchTarget).
        #[arg(long, value_name = "KIND")]
        operand: Option<String>,
    },
}
