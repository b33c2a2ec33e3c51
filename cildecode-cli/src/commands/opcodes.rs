use cildecode::disassembler::opcodes as all_opcodes;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::hex_string,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct OpcodeEntry {
    bytes: String,
    mnemonic: &'static str,
    operand: String,
    operand_size: Option<usize>,
    flow: String,
}

#[derive(Debug, Serialize)]
struct OpcodesOutput {
    opcodes: Vec<OpcodeEntry>,
    count: usize,
}

pub fn run(operand_filter: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let opcodes: Vec<OpcodeEntry> = all_opcodes()
        .filter(|opcode| {
            operand_filter.map_or(true, |filter| {
                opcode.operand.to_string().eq_ignore_ascii_case(filter)
            })
        })
        .map(|opcode| OpcodeEntry {
            bytes: hex_string(opcode.bytes()),
            mnemonic: opcode.mnemonic,
            operand: opcode.operand.to_string(),
            operand_size: opcode.operand.size(),
            flow: opcode.flow.to_string(),
        })
        .collect();

    let output = OpcodesOutput {
        count: opcodes.len(),
        opcodes,
    };

    print_output(&output, opts, |out| {
        let mut tw = TabWriter::new(vec![
            ("Bytes", Align::Left),
            ("Mnemonic", Align::Left),
            ("Operand", Align::Left),
            ("Size", Align::Right),
            ("Flow", Align::Left),
        ]);
        for e in &out.opcodes {
            tw.row(vec![
                e.bytes.clone(),
                e.mnemonic.to_string(),
                e.operand.clone(),
                e.operand_size.map_or_else(|| "var".to_string(), |s| s.to_string()),
                e.flow.clone(),
            ]);
        }
        tw.print();
        println!("\n{} opcode(s) listed.", out.count);
    })
}
