use std::path::Path;

use anyhow::Context;
use cildecode::{
    disassembler::{decode, Instruction},
    metadata::{
        method::{ExceptionHandlerFlags, MethodBody},
        resolver::OpaqueResolver,
    },
};
use log::info;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{file_display_name, hex_string, load_input, split_input, InputOptions},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct InstructionEntry {
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<String>,
    mnemonic: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    operand: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    targets: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct HandlerEntry {
    kind: String,
    try_start: u32,
    try_end: u32,
    handler_start: u32,
    handler_end: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    catch_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<u32>,
}

#[derive(Debug, Serialize)]
struct BodyEntry {
    format: &'static str,
    header_size: usize,
    code_size: usize,
    max_stack: usize,
    local_var_sig_token: String,
    init_locals: bool,
    exception_handlers: Vec<HandlerEntry>,
}

#[derive(Debug, Serialize)]
struct DisasmOutput {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<BodyEntry>,
    instructions: Vec<InstructionEntry>,
    code_size: usize,
    count: usize,
}

pub fn run(
    path: &Path,
    input: InputOptions,
    bytes: bool,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let data = load_input(path, input)?;
    let split = split_input(&data, input.body)
        .with_context(|| format!("failed to parse method header: {}", path.display()))?;
    let instructions = decode(split.code, &OpaqueResolver)
        .with_context(|| format!("failed to decode: {}", path.display()))?;
    info!(
        "Decoded {} instructions from {} bytes",
        instructions.len(),
        split.code.len()
    );

    let entries = instructions
        .iter()
        .map(|instruction| instruction_entry(instruction, split.code, bytes))
        .collect::<Vec<_>>();

    let output = DisasmOutput {
        file: file_display_name(path),
        body: split.body.as_ref().map(body_entry),
        count: entries.len(),
        code_size: split.code.len(),
        instructions: entries,
    };

    print_output(&output, opts, |out| {
        if let Some(body) = &out.body {
            println!("// {} header, {} bytes", body.format, body.header_size);
            println!("// code size  {}", body.code_size);
            println!(".maxstack {}", body.max_stack);
            if body.local_var_sig_token != "0x00000000" {
                let init = if body.init_locals { " init" } else { "" };
                println!(".locals{init} {}", body.local_var_sig_token);
            }
            println!();
        }

        if bytes {
            let mut tw = TabWriter::new(vec![
                ("Offset", Align::Left),
                ("Bytes", Align::Left),
                ("Instruction", Align::Left),
            ]);
            for e in &out.instructions {
                tw.row(vec![
                    format!("IL_{:04x}", e.offset),
                    e.bytes.clone().unwrap_or_default(),
                    instruction_text(e),
                ]);
            }
            tw.print();
        } else {
            for e in &out.instructions {
                println!("IL_{:04x}: {}", e.offset, instruction_text(e));
            }
        }

        if let Some(body) = &out.body {
            for handler in &body.exception_handlers {
                let clause = match (&handler.catch_type, handler.filter) {
                    (Some(catch_type), _) => format!("catch {catch_type}"),
                    (None, Some(filter)) => format!("filter IL_{filter:04x}"),
                    (None, None) => handler.kind.clone(),
                };
                println!(
                    ".try IL_{:04x} to IL_{:04x} {} handler IL_{:04x} to IL_{:04x}",
                    handler.try_start,
                    handler.try_end,
                    clause,
                    handler.handler_start,
                    handler.handler_end
                );
            }
        }
    })
}

fn instruction_entry(instruction: &Instruction, code: &[u8], bytes: bool) -> InstructionEntry {
    let operand = instruction.operand.to_string();
    let start = instruction.offset as usize;
    let raw = bytes.then(|| {
        code.get(start..start + instruction.size())
            .map(hex_string)
            .unwrap_or_default()
    });

    InstructionEntry {
        offset: instruction.offset,
        bytes: raw,
        mnemonic: instruction.mnemonic(),
        operand: (!operand.is_empty()).then_some(operand),
        targets: instruction.branch_targets(),
    }
}

fn instruction_text(entry: &InstructionEntry) -> String {
    match &entry.operand {
        Some(operand) => format!("{} {operand}", entry.mnemonic),
        None => entry.mnemonic.to_string(),
    }
}

fn body_entry(body: &MethodBody) -> BodyEntry {
    BodyEntry {
        format: if body.is_fat { "fat" } else { "tiny" },
        header_size: body.size_header,
        code_size: body.size_code,
        max_stack: body.max_stack,
        local_var_sig_token: body.local_var_sig_token.to_string(),
        init_locals: body.is_init_local,
        exception_handlers: body
            .exception_handlers
            .iter()
            .map(|handler| HandlerEntry {
                kind: clause_kind(handler.flags).to_string(),
                try_start: handler.try_offset,
                try_end: handler.try_offset.wrapping_add(handler.try_length),
                handler_start: handler.handler_offset,
                handler_end: handler.handler_offset.wrapping_add(handler.handler_length),
                catch_type: handler.class_token().map(|token| token.to_string()),
                filter: handler.filter_offset(),
            })
            .collect(),
    }
}

fn clause_kind(flags: ExceptionHandlerFlags) -> &'static str {
    if flags.contains(ExceptionHandlerFlags::FAULT) {
        "fault"
    } else if flags.contains(ExceptionHandlerFlags::FINALLY) {
        "finally"
    } else if flags.contains(ExceptionHandlerFlags::FILTER) {
        "filter"
    } else {
        "catch"
    }
}
