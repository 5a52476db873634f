//! Extraction of fenced shell blocks from model replies.

use std::sync::LazyLock;

use regex::Regex;

static SH_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```sh\b([\s\S]*?)```").expect("fence pattern is valid"));

/// One fenced shell block, in the form the model wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Inner text of the block, trimmed.
    pub source_text: String,
}

impl CodeBlock {
    /// The block with every `$` doubled, for contexts that treat `$` as an
    /// escape character.
    pub fn escaped(&self) -> String {
        self.source_text.replace('$', "$$")
    }
}

/// Returns every ```` ```sh ```` block in `text`, in document order.
pub fn extract_blocks(text: &str) -> Vec<CodeBlock> {
    SH_FENCE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|inner| CodeBlock {
            source_text: inner.as_str().trim().to_string(),
        })
        .collect()
}

/// Returns the escaped inner text of every shell block in `text`.
///
/// Never fails: a reply without fences yields an empty vector.
pub fn extract_codes(text: &str) -> Vec<String> {
    extract_blocks(text).iter().map(CodeBlock::escaped).collect()
}

/// Joins blocks into the single script executed for one reply.
pub fn combine(blocks: &[CodeBlock]) -> String {
    blocks
        .iter()
        .map(|block| block.source_text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
