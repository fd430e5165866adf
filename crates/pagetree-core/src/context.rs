//! Context prefix rendering.
//!
//! A chunk's text is built from three groups, joined by a blank line:
//!
//! 1. one `# title` line per ancestor node title (root-first),
//! 2. one `#`×level line per active heading (level ascending),
//! 3. the block's own content, formatted by type.
//!
//! Empty titles and empty heading texts produce no line. Heading blocks have
//! no content group of their own: their line is already present in group 2.
//!
//! ```rust
//! use pagetree_core::context::render_chunk_text;
//! use pagetree_core::heading::HeadingTracker;
//! use pagetree_core::models::{Block, BlockType};
//!
//! let text = render_chunk_text(
//!     &["Root".to_string()],
//!     &HeadingTracker::new(),
//!     &Block::new(BlockType::Paragraph, "Hello"),
//! );
//! assert_eq!(text, "# Root\n\nHello");
//! ```

use crate::heading::HeadingTracker;
use crate::models::{Block, BlockType};

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Markdown heading line at `level`.
pub fn heading_line(level: usize, text: &str) -> String {
    format!("{} {}", "#".repeat(level), text)
}

/// Format a block's own content according to its type.
///
/// Returns `None` for blocks that contribute no content line: headings,
/// subnode references, and blocks with blank content.
pub fn format_block(block: &Block) -> Option<String> {
    if block.content.trim().is_empty() {
        return None;
    }
    let c = block.content.as_str();
    let formatted = match block.block_type {
        BlockType::Paragraph => c.to_string(),
        BlockType::BulletedItem => format!("- {}", c),
        // Ordinals are not tracked; every item renders as `1.`.
        BlockType::NumberedItem => format!("1. {}", c),
        BlockType::Code => format!("```\n{}\n```", c),
        BlockType::Quote => format!("> {}", c),
        BlockType::Todo => format!("- [ ] {}", c),
        BlockType::Toggle => format!("<details><summary>{}</summary></details>", c),
        BlockType::Link => format!("[Link]({})", c),
        BlockType::Heading1
        | BlockType::Heading2
        | BlockType::Heading3
        | BlockType::SubnodeReference => return None,
    };
    Some(formatted)
}

/// Context lines for the current position: ancestor titles, then headings.
pub fn context_lines(title_path: &[String], headings: &HeadingTracker) -> Vec<String> {
    let titles = title_path
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| heading_line(1, t));
    let active = headings
        .active()
        .filter(|h| !h.text.trim().is_empty())
        .map(|h| heading_line(h.level(), &h.text));
    titles.chain(active).collect()
}

/// Render the full chunk text for `block`.
pub fn render_chunk_text(title_path: &[String], headings: &HeadingTracker, block: &Block) -> String {
    let mut parts = context_lines(title_path, headings);
    if let Some(own) = format_block(block) {
        parts.push(own);
    }
    parts.join(PARAGRAPH_SEPARATOR)
}
