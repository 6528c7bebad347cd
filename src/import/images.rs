use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::Digest;
use regex::Regex;
use tracing::{debug, warn};

static INLINE_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img[^>]+src="data:image/[^;]+;base64,([^"]+)"[^>]*/>"#).unwrap()
});

/// Outcome of migrating one note.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrateStats {
    pub images: usize,
    pub rewritten: usize,
}

/// Sibling folder holding a note's attachments: `<stem> Attachments`.
pub fn attachments_dir(note: &Path) -> PathBuf {
    let stem = file_stem(note);
    note.with_file_name(format!("{} Attachments", stem))
}

/// First regular file directly inside `dir` whose MD5 equals `digest`.
///
/// A missing directory is not an error; it just never matches.
pub fn locate_attachment(dir: &Path, digest: &Digest) -> Result<Option<PathBuf>> {
    let mut index = AttachmentIndex::new(dir.to_path_buf());
    let found = index.find(digest)?.map(Path::to_path_buf);
    Ok(found)
}

/// Attachment hashes for one note, computed the first time an image asks.
struct AttachmentIndex {
    dir: PathBuf,
    entries: Option<Vec<(Digest, PathBuf)>>,
}

impl AttachmentIndex {
    fn new(dir: PathBuf) -> Self {
        AttachmentIndex { dir, entries: None }
    }

    fn find(&mut self, digest: &Digest) -> Result<Option<&Path>> {
        if self.entries.is_none() {
            self.entries = Some(hash_dir(&self.dir)?);
        }
        Ok(self
            .entries
            .iter()
            .flatten()
            .find(|(d, _)| d == digest)
            .map(|(_, p)| p.as_path()))
    }
}

fn hash_dir(dir: &Path) -> Result<Vec<(Digest, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut hashed = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        if path.is_file() {
            let bytes = fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
            hashed.push((md5::compute(&bytes), path));
        }
    }
    debug!("Hashed {} attachments in {:?}", hashed.len(), dir);
    Ok(hashed)
}

/// Decode an inline base64 payload; whitespace inside the attribute is ignored.
fn decode_payload(payload: &str) -> Option<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).ok()
}

/// Copy a file and carry over its access/modification times.
pub fn copy_preserving(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).with_context(|| format!("Failed to copy {:?} to {:?}", src, dst))?;
    let meta = fs::metadata(src)?;
    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    // Read-only handle: a copied 0444 attachment can't be reopened for writing.
    File::open(dst)
        .and_then(|f| f.set_times(times))
        .with_context(|| format!("Failed to set times on {:?}", dst))?;
    Ok(())
}

/// Replace inline base64 `<img>` tags in `text` with references to copied assets.
///
/// Each payload is hashed and matched against the note's attachments folder; a
/// match is copied into `assets` as `<stem>---<file name>`. Tags without a
/// match are left untouched.
pub fn rewrite_images(
    text: &str,
    note_stem: &str,
    attachments: &Path,
    assets: &Path,
) -> Result<(String, MigrateStats)> {
    let mut index = AttachmentIndex::new(attachments.to_path_buf());
    let mut stats = MigrateStats::default();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in INLINE_IMG_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        stats.images += 1;
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let Some(bytes) = decode_payload(&caps[1]) else {
            warn!("Skipping image with malformed base64 payload in {:?}", note_stem);
            out.push_str(whole.as_str());
            continue;
        };
        let digest = md5::compute(&bytes);

        match index.find(&digest)? {
            Some(attachment) => {
                let name = attachment
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let asset_name = format!("{}---{}", note_stem, name);
                copy_preserving(attachment, &assets.join(&asset_name))?;
                debug!(digest = %format!("{:x}", digest), %asset_name, "image matched");
                out.push_str(&format!("![image.png](../assets/{})", asset_name));
                stats.rewritten += 1;
            }
            None => {
                debug!(digest = %format!("{:x}", digest), "no attachment matches image");
                out.push_str(whole.as_str());
            }
        }
    }
    out.push_str(&text[last..]);

    Ok((out, stats))
}

/// Copy `note` into `journals` and rewrite its inline images against `assets`.
pub fn migrate_note(note: &Path, journals: &Path, assets: &Path) -> Result<MigrateStats> {
    let stem = file_stem(note);
    let file_name = note
        .file_name()
        .with_context(|| format!("{:?} has no file name", note))?;

    let dst = journals.join(file_name);
    copy_preserving(note, &dst)?;
    let text = fs::read_to_string(&dst).with_context(|| format!("Failed to read {:?}", dst))?;

    let (rewritten, stats) = rewrite_images(&text, &stem, &attachments_dir(note), assets)?;
    fs::write(&dst, rewritten).with_context(|| format!("Failed to write {:?}", dst))?;

    Ok(stats)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
