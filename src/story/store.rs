//! Canonical owner of the story under construction.

use crate::story::types::{AudioStory, Outline, StorySegment};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a merge-insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The segment was new and is now part of the story.
    Inserted,
    /// A segment with this index already existed; nothing changed.
    Duplicate,
}

/// Owns the story's segments and publishes immutable snapshots.
///
/// Segments are keyed by index, so the story can never hold two entries for
/// one index and always materializes in ascending order regardless of the
/// order completions arrive in. A snapshot is rebuilt only when a merge
/// actually inserts, and readers only ever see whole snapshots.
#[derive(Debug)]
pub struct StoryStore {
    total_segments: u32,
    outline: Arc<Outline>,
    segments: BTreeMap<u32, Arc<StorySegment>>,
    snapshot: Arc<AudioStory>,
}

impl StoryStore {
    /// Seed the store with the session's first completed segment.
    pub fn new(total_segments: u32, outline: Outline, first: StorySegment) -> Self {
        let outline = Arc::new(outline);
        let mut segments = BTreeMap::new();
        segments.insert(first.index, Arc::new(first));
        let snapshot = Arc::new(build_snapshot(total_segments.max(1), &outline, &segments));
        Self {
            total_segments: total_segments.max(1),
            outline,
            segments,
            snapshot,
        }
    }

    /// Insert a completed segment unless its index is already present.
    pub fn merge(&mut self, segment: StorySegment) -> MergeOutcome {
        if self.segments.contains_key(&segment.index) {
            return MergeOutcome::Duplicate;
        }
        self.segments.insert(segment.index, Arc::new(segment));
        self.snapshot = Arc::new(build_snapshot(
            self.total_segments,
            &self.outline,
            &self.segments,
        ));
        MergeOutcome::Inserted
    }

    /// Current consistent, sorted view of the story.
    pub fn snapshot(&self) -> Arc<AudioStory> {
        Arc::clone(&self.snapshot)
    }

    pub fn generated_count(&self) -> u32 {
        self.segments.len() as u32
    }

    pub fn total_segments(&self) -> u32 {
        self.total_segments
    }

    pub fn contains(&self, index: u32) -> bool {
        self.segments.contains_key(&index)
    }

    pub fn outline(&self) -> &Arc<Outline> {
        &self.outline
    }

    /// Outline beat for `index`, with generic fallbacks past the outline's end.
    pub fn beat_for(&self, index: u32) -> &str {
        self.outline.beat_or_default(index)
    }

    /// The last `max_chars` characters of all segment text, space-joined in order.
    pub fn trailing_text(&self, max_chars: usize) -> String {
        let joined = self
            .segments
            .values()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        tail_chars(&joined, max_chars).to_string()
    }
}

/// Slice off the last `max_chars` characters without splitting a code point.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((offset, _)) => &text[offset..],
        None => "",
    }
}

fn build_snapshot(
    total_segments: u32,
    outline: &Arc<Outline>,
    segments: &BTreeMap<u32, Arc<StorySegment>>,
) -> AudioStory {
    AudioStory {
        total_segments,
        outline: Arc::clone(outline),
        segments: segments.values().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::audio::AudioBuffer;

    fn segment(index: u32, text: &str) -> StorySegment {
        StorySegment::new(index, text, AudioBuffer::new(vec![0.1; 240], 24_000, 1))
    }

    fn store() -> StoryStore {
        StoryStore::new(5, Outline::filler(5), segment(1, "one"))
    }

    #[test]
    fn new_store_holds_first_segment() {
        let store = store();
        assert_eq!(store.generated_count(), 1);
        assert_eq!(store.total_segments(), 5);
        assert!(store.contains(1));
        assert_eq!(store.snapshot().indices(), vec![1]);
    }

    #[test]
    fn merge_keeps_segments_sorted() {
        let mut store = store();
        assert_eq!(store.merge(segment(3, "three")), MergeOutcome::Inserted);
        assert_eq!(store.merge(segment(2, "two")), MergeOutcome::Inserted);

        assert_eq!(store.snapshot().indices(), vec![1, 2, 3]);
        assert_eq!(store.trailing_text(100), "one two three");
    }

    #[test]
    fn duplicate_merge_is_a_noop() {
        let mut store = store();
        store.merge(segment(2, "original"));
        let before = store.snapshot();

        assert_eq!(store.merge(segment(2, "late copy")), MergeOutcome::Duplicate);

        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.segment(2).map(|s| s.text.as_str()), Some("original"));
    }

    #[test]
    fn snapshots_are_isolated_from_later_merges() {
        let mut store = store();
        let early = store.snapshot();
        store.merge(segment(2, "two"));

        assert_eq!(early.generated_count(), 1);
        assert_eq!(store.snapshot().generated_count(), 2);
    }

    #[test]
    fn any_completion_order_yields_strictly_ascending_story() {
        let orders: [&[u32]; 4] = [&[2, 3, 4, 5], &[5, 4, 3, 2], &[3, 5, 2, 4], &[4, 2, 4, 5, 3, 2]];
        for order in orders {
            let mut store = store();
            for &index in order {
                store.merge(segment(index, "x"));
            }
            let indices = store.snapshot().indices();
            assert_eq!(indices, vec![1, 2, 3, 4, 5], "order {:?}", order);
            assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn trailing_text_is_bounded() {
        let mut store = store();
        store.merge(segment(2, "abcdef"));
        assert_eq!(store.trailing_text(6), "abcdef");
        assert_eq!(store.trailing_text(8), "e abcdef");
        assert_eq!(store.trailing_text(0), "");
    }

    #[test]
    fn tail_chars_respects_code_points() {
        assert_eq!(tail_chars("café au lait", 4), "lait");
        assert_eq!(tail_chars("naïve", 3), "ïve");
        assert_eq!(tail_chars("short", 10), "short");
    }

    #[test]
    fn zero_total_is_clamped_to_one() {
        let store = StoryStore::new(0, Outline::default(), segment(1, "only"));
        assert_eq!(store.total_segments(), 1);
        assert!(store.snapshot().is_complete());
    }

    #[test]
    fn beat_for_falls_back_past_outline() {
        let store = StoryStore::new(
            3,
            Outline::new(vec!["opening".into()]),
            segment(1, "one"),
        );
        assert_eq!(store.beat_for(1), "opening");
        assert_eq!(store.beat_for(2), crate::defaults::CONTINUATION_BEAT);
    }
}
