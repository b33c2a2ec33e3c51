use std::path::Path;

use anyhow::bail;
use cildecode::{
    disassembler::decode_methods,
    metadata::resolver::{CachingResolver, OpaqueResolver},
};
use log::{debug, warn};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{collect_inputs, file_display_name, load_input, split_input, InputOptions},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct FileEntry {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchOutput {
    files: Vec<FileEntry>,
    decoded: usize,
    failed: usize,
    cached_tokens: usize,
}

pub fn run(path: &Path, input: InputOptions, opts: &GlobalOptions) -> anyhow::Result<()> {
    let paths = collect_inputs(path)?;
    if paths.is_empty() {
        bail!("no .il, .bin or .hex files found in {}", path.display());
    }
    debug!("Found {} input files", paths.len());

    let mut entries: Vec<FileEntry> = paths
        .iter()
        .map(|p| FileEntry {
            file: relative_name(path, p),
            code_size: None,
            instructions: None,
            error: None,
        })
        .collect();

    let mut loaded = Vec::with_capacity(paths.len());
    for (index, file) in paths.iter().enumerate() {
        match load_input(file, input) {
            Ok(data) => loaded.push((index, data)),
            Err(e) => {
                warn!("Skipping {}: {e:#}", file.display());
                entries[index].error = Some(format!("{e:#}"));
            }
        }
    }

    let mut bodies: Vec<(usize, &[u8])> = Vec::with_capacity(loaded.len());
    for (index, data) in &loaded {
        match split_input(data, input.body) {
            Ok(split) => {
                entries[*index].code_size = Some(split.code.len());
                bodies.push((*index, split.code));
            }
            Err(e) => {
                warn!("Skipping {}: {e}", paths[*index].display());
                entries[*index].error = Some(e.to_string());
            }
        }
    }

    let resolver = CachingResolver::new(OpaqueResolver);
    for (index, result) in decode_methods(&bodies, &resolver) {
        match result {
            Ok(instructions) => entries[index].instructions = Some(instructions.len()),
            Err(e) => entries[index].error = Some(e.to_string()),
        }
    }

    let decoded = entries.iter().filter(|e| e.instructions.is_some()).count();
    let output = BatchOutput {
        failed: entries.len() - decoded,
        files: entries,
        decoded,
        cached_tokens: resolver.cached(),
    };

    print_output(&output, opts, |out| {
        let mut tw = TabWriter::new(vec![
            ("File", Align::Left),
            ("Code", Align::Right),
            ("Instructions", Align::Right),
            ("Status", Align::Left),
        ]);
        for e in &out.files {
            tw.row(vec![
                e.file.clone(),
                e.code_size.map(|s| s.to_string()).unwrap_or_default(),
                e.instructions.map(|n| n.to_string()).unwrap_or_default(),
                e.error.clone().unwrap_or_else(|| "ok".to_string()),
            ]);
        }
        tw.print();
        println!(
            "\n{} file(s) decoded, {} failed, {} distinct token(s) resolved.",
            out.decoded, out.failed, out.cached_tokens
        );
    })?;

    if decoded == 0 {
        bail!("no file under {} could be decoded", path.display());
    }
    Ok(())
}

fn relative_name(root: &Path, file: &Path) -> String {
    file.strip_prefix(root).map_or_else(
        |_| file_display_name(file),
        |relative| relative.display().to_string(),
    )
}
