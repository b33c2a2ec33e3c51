mod app;
mod commands;
mod output;

use anyhow::Context;
use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // Show cildecode info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("cildecode", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Disasm {
            path,
            hex,
            body,
            bytes,
        } => commands::disasm::run(
            path,
            commands::common::InputOptions {
                hex: *hex,
                body: *body,
            },
            *bytes,
            &cli.global,
        ),
        Command::Batch { path, hex, body } => commands::batch::run(
            path,
            commands::common::InputOptions {
                hex: *hex,
                body: *body,
            },
            &cli.global,
        ),
        Command::Opcodes { operand } => {
            commands::opcodes::run(operand.as_deref(), &cli.global)
        }
    }
}
