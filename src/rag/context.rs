//! Budgeted context assembly.
//!
//! Retrieved chunks are rendered as labelled blocks, best rank first, and
//! joined with a blank line. Blocks are taken as a prefix of the ranking: the
//! first block that would overflow the character budget stops assembly, even
//! if a later, shorter block would still fit.

use crate::rag::corpus::RetrievedChunk;

/// Separator placed between blocks; each block already ends in a newline.
const BLOCK_SEPARATOR: &str = "\n";

/// Render one retrieved chunk as a labelled context block.
pub fn format_block(hit: &RetrievedChunk) -> String {
    format!(
        "[rank {}] [source: {} | chunk: {}]\n{}\n",
        hit.rank, hit.chunk.source, hit.chunk.chunk_id, hit.chunk.text
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    /// Number of leading retrieved chunks that made it into `text`
    pub included: usize,
    /// True when at least one retrieved chunk was left out
    pub truncated: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.included == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Assemble a context whose length in characters, separators included,
    /// never exceeds the budget.
    pub fn assemble(&self, hits: &[RetrievedChunk]) -> AssembledContext {
        let separator_len = BLOCK_SEPARATOR.chars().count();
        let mut text = String::new();
        let mut total = 0usize;
        let mut included = 0usize;

        for hit in hits {
            let block = format_block(hit);
            let block_len = block.chars().count();
            let cost = if included == 0 {
                block_len
            } else {
                separator_len + block_len
            };

            if total + cost > self.max_chars {
                break;
            }

            if included > 0 {
                text.push_str(BLOCK_SEPARATOR);
            }
            text.push_str(&block);
            total += cost;
            included += 1;
        }

        AssembledContext {
            text,
            included,
            truncated: included < hits.len(),
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(3500)
    }
}
