pub mod document;
pub mod flatten;

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::logseq::BlockSource;
use document::FrontMatter;
use flatten::Flattener;

#[derive(Debug)]
pub struct ExportSummary {
    pub front: FrontMatter,
    pub lines: usize,
}

/// Page → block tree → flattened lines → front-matter document on disk.
///
/// The destination's parent directory must already exist. Nothing is written
/// unless every API call (embeds included) succeeded.
pub fn export_page<S: BlockSource + ?Sized>(
    source: &S,
    page_name: &str,
    target: &Path,
    max_embed_depth: Option<usize>,
) -> Result<ExportSummary> {
    source
        .get_page(page_name)
        .with_context(|| format!("Page {:?} not found", page_name))?;
    let blocks = source
        .get_page_blocks_tree(page_name)
        .with_context(|| format!("Failed to fetch blocks of {:?}", page_name))?;

    let blog_date = blocks.first().and_then(|b| b.property("blogdate"));
    debug!(?blog_date, "root properties read");

    let lines = Flattener::new(source)
        .with_max_embed_depth(max_embed_depth)
        .flatten(&blocks)
        .with_context(|| format!("Failed to resolve embeds in {:?}", page_name))?;

    let front = document::front_matter(page_name, blog_date, chrono::Local::now().date_naive());
    debug!(date = %front.date, title = %front.title, "front matter");

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        bail!("Destination directory {:?} does not exist", parent);
    }

    let text = document::render(&front, &lines);
    std::fs::write(target, text).with_context(|| format!("Failed to write {:?}", target))?;
    info!("Exported {:?} ({} lines) to {:?}", page_name, lines.len(), target);

    Ok(ExportSummary {
        front,
        lines: lines.len(),
    })
}
