use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{LogseqError, Result};
use crate::logseq::{Block, BlockSource};

static EMBED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{embed \(\(([a-zA-Z0-9-]+)\)\)\}\}$").unwrap());

/// One rendered line of the flattened page, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatLine {
    pub level: i64,
    pub content: String,
}

/// Block id referenced by a whole-line `{{embed ((uuid))}}`; inline embeds don't count.
pub fn embed_target(content: &str) -> Option<&str> {
    EMBED_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Walks block trees depth-first, swapping embed directives for the embedded subtree.
pub struct Flattener<'a, S: BlockSource + ?Sized> {
    source: &'a S,
    max_embed_depth: Option<usize>,
}

impl<'a, S: BlockSource + ?Sized> Flattener<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Flattener {
            source,
            max_embed_depth: None,
        }
    }

    pub fn with_max_embed_depth(mut self, depth: Option<usize>) -> Self {
        self.max_embed_depth = depth;
        self
    }

    pub fn flatten(&self, blocks: &[Block]) -> Result<Vec<FlatLine>> {
        debug!(levels = ?blocks.iter().map(|b| b.level).collect::<Vec<_>>(), "flattening roots");
        let mut out = Vec::new();
        self.walk(blocks, 0, 0, &mut out)?;
        Ok(out)
    }

    fn walk(&self, blocks: &[Block], offset: i64, depth: usize, out: &mut Vec<FlatLine>) -> Result<()> {
        for block in blocks {
            match embed_target(&block.content) {
                Some(uuid) => {
                    if let Some(max) = self.max_embed_depth {
                        if depth >= max {
                            return Err(LogseqError::EmbedDepthExceeded(max, uuid.to_string()));
                        }
                    }
                    debug!(uuid, "resolving embed");
                    let embedded = self.source.get_block(uuid)?;

                    // The embedded block takes the placeholder's level, ignoring the offset.
                    out.push(FlatLine {
                        level: block.level,
                        content: embedded.content,
                    });
                    if !embedded.children.is_empty() {
                        self.walk(&embedded.children, offset + block.level, depth + 1, out)?;
                    }
                }
                None => {
                    out.push(FlatLine {
                        level: block.level + offset,
                        content: block.content.clone(),
                    });
                    if !block.children.is_empty() {
                        self.walk(&block.children, offset, depth, out)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Unguarded flatten with a zero starting offset.
pub fn flatten<S: BlockSource + ?Sized>(source: &S, blocks: &[Block]) -> Result<Vec<FlatLine>> {
    Flattener::new(source).flatten(blocks)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use serde_json::Value;

    use super::*;

    /// In-memory stand-in for the API.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub blocks: HashMap<String, Block>,
        pub pages: HashMap<String, Vec<Block>>,
        pub calls: Cell<usize>,
    }

    impl BlockSource for FakeSource {
        fn get_block(&self, uuid: &str) -> Result<Block> {
            self.calls.set(self.calls.get() + 1);
            self.blocks.get(uuid).cloned().ok_or_else(|| LogseqError::Status {
                method: "logseq.Editor.getBlock".into(),
                status: 404,
                body: uuid.into(),
            })
        }

        fn get_page(&self, name: &str) -> Result<Value> {
            if self.pages.contains_key(name) {
                Ok(serde_json::json!({ "name": name }))
            } else {
                Err(LogseqError::Empty {
                    method: "getPage".into(),
                    arg: name.into(),
                })
            }
        }

        fn get_page_blocks_tree(&self, name: &str) -> Result<Vec<Block>> {
            match self.pages.get(name) {
                Some(blocks) if !blocks.is_empty() => Ok(blocks.clone()),
                _ => Err(LogseqError::Empty {
                    method: "getPageBlocksTree".into(),
                    arg: name.into(),
                }),
            }
        }
    }

    pub(crate) fn block(uuid: &str, content: &str, level: i64, children: Vec<Block>) -> Block {
        Block {
            uuid: uuid.into(),
            content: content.into(),
            level,
            children,
            ..Default::default()
        }
    }

    fn contents(lines: &[FlatLine]) -> Vec<&str> {
        lines.iter().map(|l| l.content.as_str()).collect()
    }

    #[test]
    fn embed_pattern_is_whole_line() {
        assert_eq!(
            embed_target("{{embed ((6488a947-a217-4062-bce9-cacfc9cb0336))}}"),
            Some("6488a947-a217-4062-bce9-cacfc9cb0336")
        );
        assert_eq!(embed_target("see {{embed ((abc))}}"), None);
        assert_eq!(embed_target("{{embed ((abc))}} trailing"), None);
        assert_eq!(embed_target("{{embed [[Some Page]]}}"), None);
    }

    #[test]
    fn plain_tree_is_preorder() {
        let source = FakeSource::default();
        let tree = vec![
            block("a", "A", 1, vec![
                block("a1", "A1", 2, vec![block("a11", "A11", 3, vec![])]),
                block("a2", "A2", 2, vec![]),
            ]),
            block("b", "B", 1, vec![]),
        ];
        let lines = flatten(&source, &tree).unwrap();
        assert_eq!(contents(&lines), vec!["A", "A1", "A11", "A2", "B"]);
        let levels: Vec<i64> = lines.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 2, 1]);
        assert_eq!(source.calls.get(), 0);
    }

    #[test]
    fn offset_is_added_without_embeds() {
        let source = FakeSource::default();
        let tree = vec![block("a", "A", 1, vec![block("a1", "A1", 2, vec![])])];
        let mut out = Vec::new();
        Flattener::new(&source).walk(&tree, 3, 0, &mut out).unwrap();
        let levels: Vec<i64> = out.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![4, 5]);
    }

    #[test]
    fn embed_is_substituted_with_subtree() {
        let mut source = FakeSource::default();
        source.blocks.insert(
            "x".into(),
            block("x", "Embedded", 1, vec![
                block("x1", "Embedded child", 2, vec![]),
                block("x2", "Second child", 2, vec![]),
            ]),
        );
        let tree = vec![block("root", "Root", 1, vec![block("e", "{{embed ((x))}}", 2, vec![])])];

        let lines = flatten(&source, &tree).unwrap();
        assert_eq!(
            contents(&lines),
            vec!["Root", "Embedded", "Embedded child", "Second child"]
        );
        assert!(lines.iter().all(|l| !l.content.contains("{{embed")));
        // Embedded block sits at the placeholder's level; its children are
        // offset by that level on top of their own.
        let levels: Vec<i64> = lines.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![1, 2, 4, 4]);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn nested_embeds_resolve() {
        let mut source = FakeSource::default();
        source.blocks.insert(
            "x".into(),
            block("x", "X", 1, vec![
                block("x1", "X1", 2, vec![]),
                block("xe", "{{embed ((y))}}", 2, vec![]),
            ]),
        );
        source.blocks.insert("y".into(), block("y", "Y", 1, vec![block("y1", "Y1", 2, vec![])]));
        let tree = vec![block("e", "{{embed ((x))}}", 1, vec![])];

        let lines = flatten(&source, &tree).unwrap();
        assert_eq!(contents(&lines), vec!["X", "X1", "Y", "Y1"]);
        // The inner embed is reached under offset 1: it drops that offset for
        // itself, then hands `1 + 2` down to its children.
        let levels: Vec<i64> = lines.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![1, 3, 2, 5]);
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn embed_under_offset_keeps_placeholder_level() {
        let mut source = FakeSource::default();
        source.blocks.insert("x".into(), block("x", "X", 1, vec![block("x1", "X1", 2, vec![])]));
        let tree = vec![block("e", "{{embed ((x))}}", 2, vec![])];

        let mut out = Vec::new();
        Flattener::new(&source).walk(&tree, 3, 0, &mut out).unwrap();
        assert_eq!(contents(&out), vec!["X", "X1"]);
        let levels: Vec<i64> = out.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![2, 7]);
    }

    #[test]
    fn failed_embed_fetch_aborts() {
        let source = FakeSource::default();
        let tree = vec![
            block("a", "A", 1, vec![]),
            block("e", "{{embed ((missing))}}", 1, vec![]),
        ];
        let err = flatten(&source, &tree).unwrap_err();
        assert!(matches!(err, LogseqError::Status { status: 404, .. }));
    }

    #[test]
    fn depth_guard_stops_self_embedding() {
        let mut source = FakeSource::default();
        source.blocks.insert("loop".into(), block("loop", "L", 1, vec![block("l1", "{{embed ((loop))}}", 2, vec![])]));
        let tree = vec![block("e", "{{embed ((loop))}}", 1, vec![])];

        let err = Flattener::new(&source)
            .with_max_embed_depth(Some(5))
            .flatten(&tree)
            .unwrap_err();
        assert!(matches!(err, LogseqError::EmbedDepthExceeded(5, ref id) if id == "loop"));
        assert_eq!(source.calls.get(), 5);
    }
}
