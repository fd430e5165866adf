//! Active heading stack.
//!
//! Tracks up to three open heading levels while a node's block sequence is
//! scanned. Observing a level-`L` heading sets slot `L` and clears every
//! deeper slot; shallower slots are kept. Non-heading blocks leave the
//! state untouched.
//!
//! A tracker lives for exactly one node's scan. Headings never carry across
//! the parent/child node boundary.

use crate::models::{Block, BlockType};

/// Number of heading levels tracked.
pub const MAX_HEADING_LEVEL: usize = 3;

/// A heading block currently providing context.
///
/// Carries the heading's own timestamp and position so timestamp
/// aggregation can attribute it by identity rather than by text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveHeading {
    pub text: String,
    pub block_type: BlockType,
    pub last_modified: String,
    pub block_index: usize,
}

impl ActiveHeading {
    pub fn level(&self) -> usize {
        self.block_type.heading_level().unwrap_or(MAX_HEADING_LEVEL)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadingTracker {
    slots: [Option<ActiveHeading>; MAX_HEADING_LEVEL],
}

impl HeadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the block at `index`. Returns `true` if it was a heading.
    pub fn observe(&mut self, index: usize, block: &Block) -> bool {
        let Some(level) = block.block_type.heading_level() else {
            return false;
        };
        let slot = level - 1;
        self.slots[slot] = Some(ActiveHeading {
            text: block.content.clone(),
            block_type: block.block_type,
            last_modified: block.last_modified.clone(),
            block_index: index,
        });
        for deeper in self.slots.iter_mut().skip(slot + 1) {
            *deeper = None;
        }
        true
    }

    /// Currently set headings, level ascending.
    pub fn active(&self) -> impl Iterator<Item = &ActiveHeading> {
        self.slots.iter().flatten()
    }

    /// Plain texts of the active headings, level ascending.
    pub fn texts(&self) -> Vec<String> {
        self.active().map(|h| h.text.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn reset(&mut self) {
        self.slots = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(level: usize, text: &str) -> Block {
        let t = match level {
            1 => BlockType::Heading1,
            2 => BlockType::Heading2,
            _ => BlockType::Heading3,
        };
        Block::new(t, text)
    }

    #[test]
    fn test_initially_empty() {
        let t = HeadingTracker::new();
        assert!(t.is_empty());
        assert!(t.texts().is_empty());
    }

    #[test]
    fn test_level_two_clears_three_keeps_one() {
        let mut t = HeadingTracker::new();
        t.observe(0, &h(1, "Intro"));
        t.observe(1, &h(3, "Detail"));
        assert_eq!(t.texts(), vec!["Intro", "Detail"]);
        t.observe(2, &h(2, "Overview"));
        assert_eq!(t.texts(), vec!["Intro", "Overview"]);
    }

    #[test]
    fn test_level_one_clears_everything_deeper() {
        let mut t = HeadingTracker::new();
        t.observe(0, &h(1, "A"));
        t.observe(1, &h(2, "B"));
        t.observe(2, &h(3, "C"));
        t.observe(3, &h(1, "D"));
        assert_eq!(t.texts(), vec!["D"]);
    }

    #[test]
    fn test_non_heading_does_not_change_state() {
        let mut t = HeadingTracker::new();
        t.observe(0, &h(2, "Section"));
        assert!(!t.observe(1, &Block::new(BlockType::Paragraph, "body")));
        assert!(!t.observe(2, &Block::subnode("child")));
        assert_eq!(t.texts(), vec!["Section"]);
    }

    #[test]
    fn test_slot_records_identity() {
        let mut t = HeadingTracker::new();
        t.observe(4, &h(2, "Twice").modified_at("2024-01-01T00:00:00Z"));
        let active: Vec<_> = t.active().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].block_index, 4);
        assert_eq!(active[0].level(), 2);
        assert_eq!(active[0].last_modified, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_never_more_than_three() {
        let mut t = HeadingTracker::new();
        for (i, lvl) in [1, 2, 3, 3, 2, 3].iter().enumerate() {
            t.observe(i, &h(*lvl, &format!("h{}", i)));
            assert!(t.texts().len() <= MAX_HEADING_LEVEL);
        }
        assert_eq!(t.texts(), vec!["h0", "h4", "h5"]);
    }

    #[test]
    fn test_reset() {
        let mut t = HeadingTracker::new();
        t.observe(0, &h(1, "A"));
        t.reset();
        assert!(t.is_empty());
    }
}
