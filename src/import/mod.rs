pub mod images;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::text::ensure_trailing_newline;

/// Marker line written above every appended note.
pub const PROVENANCE_LINE: &str = "- from the apple notes exporter app";

pub struct ImportStats {
    pub notes: usize,
    pub images: usize,
    pub rewritten: usize,
}

/// `*.md` files directly inside `dir`, sorted, optionally limited to names starting with `prefix`.
pub fn list_notes(dir: &Path, prefix: Option<&str>) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.md", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut notes = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if prefix.is_some_and(|p| !name.starts_with(p)) {
            continue;
        }
        notes.push(path);
    }
    notes.sort();
    Ok(notes)
}

fn progress(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// Migrate every note into `<output>/journals`, copying matched images into `<output>/assets`.
///
/// Notes are processed one at a time in order; a failure stops the batch and
/// leaves already-migrated notes in place.
pub fn process_images(notes: &[PathBuf], output_dir: &Path) -> Result<ImportStats> {
    let journals = output_dir.join("journals");
    let assets = output_dir.join("assets");
    fs::create_dir_all(&journals).with_context(|| format!("Failed to create {:?}", journals))?;
    fs::create_dir_all(&assets).with_context(|| format!("Failed to create {:?}", assets))?;

    let mut stats = ImportStats {
        notes: 0,
        images: 0,
        rewritten: 0,
    };
    let pb = progress(notes.len())?;
    for note in notes {
        pb.set_message(note.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        let s = images::migrate_note(note, &journals, &assets)
            .with_context(|| format!("Failed to migrate {:?}", note))?;
        stats.notes += 1;
        stats.images += s.images;
        stats.rewritten += s.rewritten;
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Migrated {} notes ({} of {} inline images rewritten)",
        stats.notes, stats.rewritten, stats.images
    );
    Ok(stats)
}

/// Run the external reflow tool over every note: `<command> -d <output> <names...>`.
pub fn reflow(command: &str, input_dir: &Path, output_dir: &Path) -> Result<usize> {
    fs::create_dir_all(output_dir).with_context(|| format!("Failed to create {:?}", output_dir))?;
    let output_dir = fs::canonicalize(output_dir)?;
    let names: Vec<_> = list_notes(input_dir, None)?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
        .collect();
    if names.is_empty() {
        info!("No markdown files in {:?}", input_dir);
        return Ok(0);
    }

    info!("Running {} on {} files", command, names.len());
    let status = Command::new(command)
        .arg("-d")
        .arg(&output_dir)
        .args(&names)
        .current_dir(input_dir)
        .status()
        .with_context(|| format!("Failed to start {}", command))?;
    if !status.success() {
        bail!("{} exited with {}", command, status);
    }
    Ok(names.len())
}

/// Append each note to the file of the same name in `output_dir`, under a provenance line.
pub fn append_notes(input_dir: &Path, output_dir: &Path) -> Result<usize> {
    fs::create_dir_all(output_dir).with_context(|| format!("Failed to create {:?}", output_dir))?;

    let notes = list_notes(input_dir, None)?;
    for note in &notes {
        let Some(name) = note.file_name() else { continue };
        let dst = output_dir.join(name);
        let mut addition = fs::read_to_string(note).with_context(|| format!("Failed to read {:?}", note))?;
        let existing = if dst.exists() {
            fs::read_to_string(&dst).with_context(|| format!("Failed to read {:?}", dst))?
        } else {
            String::new()
        };

        let mut chunk = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            chunk.push('\n');
        }
        chunk.push_str(PROVENANCE_LINE);
        chunk.push('\n');
        ensure_trailing_newline(&mut addition);
        chunk.push_str(&addition);

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&dst)
            .and_then(|mut f| f.write_all(chunk.as_bytes()))
            .with_context(|| format!("Failed to append to {:?}", dst))?;
    }

    info!("Appended {} notes into {:?}", notes.len(), output_dir);
    Ok(notes.len())
}
