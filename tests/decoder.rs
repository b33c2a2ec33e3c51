use cildecode::prelude::*;

/// Builds an operand for `opcode` the way `OpaqueResolver` would decode it.
fn operand_for(opcode: &OpcodeDescriptor, position: u32) -> Result<OperandValue> {
    Ok(match opcode.operand {
        OperandKind::None => OperandValue::None,
        OperandKind::Int8 => OperandValue::Int8(-7),
        OperandKind::Int32 => OperandValue::Int32(i32::MIN),
        OperandKind::Int64 => OperandValue::Int64(0x0102_0304_0506_0708),
        OperandKind::Float32 => OperandValue::Float32(-2.5),
        OperandKind::Float64 => OperandValue::Float64(1e100),
        OperandKind::StringToken => {
            OperandValue::String(OpaqueResolver.resolve_string(Token(0x7000_0010))?)
        }
        OperandKind::MethodToken => {
            OperandValue::Method(OpaqueResolver.resolve_method(Token(0x0A00_0002))?)
        }
        OperandKind::FieldToken => {
            OperandValue::Field(OpaqueResolver.resolve_field(Token(0x0400_0003))?)
        }
        OperandKind::TypeToken => OperandValue::Type(OpaqueResolver.resolve_type(Token(0x1B00_0004))?),
        OperandKind::MemberToken => {
            OperandValue::Member(OpaqueResolver.resolve_member(Token(0x0600_0005))?)
        }
        OperandKind::ShortBranchTarget => OperandValue::Target(position),
        OperandKind::LongBranchTarget => OperandValue::Target(position.wrapping_sub(1000)),
        OperandKind::SwitchTargets => OperandValue::Switch(vec![0, position, position + 100]),
        OperandKind::LocalIndexShort => OperandValue::ShortLocal(200),
        OperandKind::LocalIndexLong => OperandValue::Local(-2),
        OperandKind::InlineSignature => unreachable!(),
    })
}

/// One instruction for every opcode that can be encoded.
fn every_opcode() -> Result<Vec<Instruction>> {
    let mut encoder = InstructionEncoder::new();
    for opcode in cildecode::disassembler::opcodes() {
        if opcode.operand == OperandKind::InlineSignature {
            continue;
        }
        let operand = operand_for(opcode, encoder.position())?;
        encoder.emit(opcode.mnemonic, operand)?;
    }
    Ok(encoder.into_instructions())
}

#[test]
fn every_opcode_round_trips() -> Result<()> {
    let instructions = every_opcode()?;
    assert_eq!(instructions.len(), 218);

    let code = encode(&instructions)?;
    let decoded = decode(&code, &OpaqueResolver)?;

    assert_eq!(decoded, instructions);
    assert_eq!(encode(&decoded)?, code);
    Ok(())
}

#[test]
fn special_floats_round_trip() -> Result<()> {
    let singles = [
        f32::NAN,
        f32::from_bits(0xFFC0_1234),
        -0.0,
        f32::INFINITY,
        f32::NEG_INFINITY,
        f32::MIN_POSITIVE / 2.0,
    ];
    let doubles = [
        f64::NAN,
        f64::from_bits(0x7FF0_0000_0000_0001),
        -0.0,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::MIN_POSITIVE / 2.0,
    ];

    let mut encoder = InstructionEncoder::new();
    for value in singles {
        encoder.emit("ldc.r4", OperandValue::Float32(value))?;
    }
    for value in doubles {
        encoder.emit("ldc.r8", OperandValue::Float64(value))?;
    }
    let instructions = encoder.into_instructions();

    let code = encode(&instructions)?;
    let decoded = decode(&code, &OpaqueResolver)?;
    assert_eq!(decoded, instructions);
    assert_eq!(encode(&decoded)?, code);

    // Positive and negative zero stay distinct
    assert_ne!(decoded[2].operand, OperandValue::Float32(0.0));
    assert_ne!(decoded[8].operand, OperandValue::Float64(0.0));
    Ok(())
}

#[test]
fn sizes_cover_the_buffer() -> Result<()> {
    let code = encode(&every_opcode()?)?;
    let decoded = decode(&code, &OpaqueResolver)?;

    assert_eq!(decoded[0].offset, 0);
    for pair in decoded.windows(2) {
        assert!(pair[0].offset < pair[1].offset);
        assert_eq!(pair[0].end(), u64::from(pair[1].offset));
    }

    let total: usize = decoded.iter().map(Instruction::size).sum();
    assert_eq!(total, code.len());
    Ok(())
}

#[test]
fn every_truncation_is_an_error() -> Result<()> {
    let code = encode(&every_opcode()?)?;
    let boundaries: Vec<usize> = decode(&code, &OpaqueResolver)?
        .iter()
        .map(|instruction| instruction.offset as usize)
        .collect();

    for len in 1..code.len() {
        let result = decode(&code[..len], &OpaqueResolver);
        if boundaries.contains(&len) {
            assert!(result.is_ok(), "prefix of {len} bytes should decode");
        } else {
            assert!(
                matches!(result, Err(Error::BufferTruncated { .. })),
                "prefix of {len} bytes should be truncated"
            );
        }
    }
    Ok(())
}

#[test]
fn self_loop() -> Result<()> {
    let instructions = decode(&[0x2B, 0xFE], &OpaqueResolver)?;
    assert_eq!(instructions[0].operand, OperandValue::Target(0));
    assert_eq!(instructions[0].to_string(), "IL_0000: br.s IL_0000");
    Ok(())
}

#[test]
fn switch_consumes_its_table() -> Result<()> {
    #[rustfmt::skip]
    let code = [
        0x00,                       // nop
        0x45, 0x03, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0xFF, 0xFF, 0xFF, 0xFF,
        0x02, 0x00, 0x00, 0x00,
        0x2A,                       // IL_0012: ret
    ];
    let instructions = decode(&code, &OpaqueResolver)?;

    assert_eq!(instructions.len(), 3);
    assert_eq!(instructions[1].size(), 1 + 16);
    let base = 1 + 1 + 16;
    assert_eq!(
        instructions[1].operand,
        OperandValue::Switch(vec![base, base - 1, base + 2])
    );
    assert_eq!(instructions[2].offset, base);
    Ok(())
}

#[test]
fn escape_byte_selects_two_byte_table() -> Result<()> {
    let instructions = decode(&[0xFE, 0x01, 0x01], &OpaqueResolver)?;
    assert_eq!(instructions[0].mnemonic(), "ceq");
    assert_eq!(instructions[1].mnemonic(), "break");
    Ok(())
}

#[test]
fn truncated_immediate() {
    assert!(matches!(
        decode(&[0x20, 0x01, 0x00], &OpaqueResolver),
        Err(Error::BufferTruncated {
            offset: 1,
            needed: 4,
            remaining: 2
        })
    ));
}

#[test]
fn resolved_method_body() -> Result<()> {
    let mut map = TokenMap::new();
    map.insert_string(Token(0x7000_0001), "done")
        .insert_method(Token(0x0A00_0001), Some("System.Console"), "WriteLine")
        .insert_type_descriptor(
            Token(0x0100_0001),
            &TypeDescriptor::Named {
                namespace: "System".into(),
                name: "InvalidOperationException".into(),
            },
        );

    // The header promises 13 bytes of code but only 4 follow
    #[rustfmt::skip]
    let truncated = [
        0x13, 0x30, 0x01, 0x00,
        0x0D, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x2A,
    ];
    assert!(matches!(
        decode_method(&truncated, &map),
        Err(Error::BufferTruncated { needed: 25, .. })
    ));

    #[rustfmt::skip]
    let data = [
        0x1B, 0x30, 0x01, 0x00,
        0x0B, 0x00, 0x00, 0x00,             // 11 bytes of code
        0x00, 0x00, 0x00, 0x00,
        0x00,                               // IL_0000: nop
        0xDE, 0x07,                         // IL_0001: leave.s IL_000a
        0x26,                               // IL_0003: pop
        0x72, 0x01, 0x00, 0x00, 0x70,       // IL_0004: ldstr
        0xDE, 0x00,                         // IL_0009: leave.s IL_000b
        0x00,                               // padding
        0x01, 0x10, 0x00, 0x00,             // small EH section, 16 bytes
        0x00, 0x00,                         // catch
        0x00, 0x00, 0x03,                   // try IL_0000..IL_0003
        0x03, 0x00, 0x08,                   // handler IL_0003..IL_000b
        0x01, 0x00, 0x00, 0x01,             // System.InvalidOperationException
    ];
    let method = decode_method(&data, &map)?;

    assert_eq!(method.body.exception_handlers.len(), 1);
    let handler = &method.body.exception_handlers[0];
    assert_eq!(
        map.resolve_type(handler.class_token().unwrap())?.name,
        "System.InvalidOperationException"
    );

    let lines: Vec<String> = method.instructions.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        [
            "IL_0000: nop",
            "IL_0001: leave.s IL_000a",
            "IL_0003: pop",
            "IL_0004: ldstr \"done\"",
            "IL_0009: leave.s IL_000b",
        ]
    );
    Ok(())
}

#[test]
fn parallel_batch_with_shared_cache() -> Result<()> {
    let program = encode(&every_opcode()?)?;
    let broken = [0x00, 0x00, 0xA6];

    let bodies: Vec<(Token, &[u8])> = (1..=32_u32)
        .map(|row| {
            let code = if row % 8 == 0 {
                &broken[..]
            } else {
                program.as_slice()
            };
            (Token(0x0600_0000 | row), code)
        })
        .collect();

    let resolver = CachingResolver::new(OpaqueResolver);
    let results = decode_methods(&bodies, &resolver);

    assert_eq!(results.len(), 32);
    for ((token, result), (expected, _)) in results.iter().zip(&bodies) {
        assert_eq!(token, expected);
        if token.row() % 8 == 0 {
            assert!(matches!(result, Err(Error::UnknownOpcode(0xA6))));
        } else {
            assert_eq!(result.as_ref().map(Vec::len).unwrap_or(0), 218);
        }
    }

    // One cached entry per distinct token category used by the program
    assert_eq!(resolver.cached(), 5);
    Ok(())
}
