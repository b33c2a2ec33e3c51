use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cildecode::{metadata::method::MethodBody, Error};

/// How input files are interpreted.
#[derive(Debug, Clone, Copy)]
pub struct InputOptions {
    /// Input is hex text rather than raw bytes
    pub hex: bool,
    /// Input starts with a method header
    pub body: bool,
}

/// Read an input file as raw bytes, or as hex text when requested or named `*.hex`.
pub fn load_input(path: &Path, opts: InputOptions) -> anyhow::Result<Vec<u8>> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read: {}", path.display()))?;

    if opts.hex || has_extension(path, &["hex"]) {
        let text = std::str::from_utf8(&data)
            .with_context(|| format!("hex input is not UTF-8: {}", path.display()))?;
        parse_hex(text).with_context(|| format!("invalid hex input: {}", path.display()))
    } else {
        Ok(data)
    }
}

/// Parse hex text like `"02 2D 01 00 2A"`, `"0x02,0x2d"` or `"022D01002A"`.
///
/// `#` and `//` start a comment that runs to the end of the line.
pub fn parse_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();

    for line in text.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let line = line.split("//").next().unwrap_or_default();

        for word in line.split(|c: char| c.is_whitespace() || c == ',') {
            let digits = word
                .strip_prefix("0x")
                .or_else(|| word.strip_prefix("0X"))
                .unwrap_or(word);
            if digits.is_empty() {
                continue;
            }
            if digits.len() % 2 != 0 {
                bail!("odd number of hex digits in '{word}'");
            }

            for pair in digits.as_bytes().chunks(2) {
                let pair = std::str::from_utf8(pair)?;
                let byte = u8::from_str_radix(pair, 16)
                    .with_context(|| format!("'{pair}' is not a hex byte"))?;
                bytes.push(byte);
            }
        }
    }

    Ok(bytes)
}

/// The code range of an input and, for method bodies, its parsed header.
pub struct CodeInput<'a> {
    pub body: Option<MethodBody>,
    pub code: &'a [u8],
}

/// Locate the code in `data`: all of it, or the range described by its method header.
pub fn split_input(data: &[u8], body: bool) -> Result<CodeInput<'_>, Error> {
    if body {
        let header = MethodBody::from(data)?;
        let code = header.code(data)?;
        Ok(CodeInput {
            body: Some(header),
            code,
        })
    } else {
        Ok(CodeInput {
            body: None,
            code: data,
        })
    }
}

/// Collect all `.il`, `.bin` and `.hex` files recursively from a directory.
pub fn collect_inputs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_inputs_recursive(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_inputs_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_inputs_recursive(&path, files)?;
        } else if has_extension(&path, &["il", "bin", "hex"]) {
            files.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

/// Render bytes as space separated upper-case hex.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
