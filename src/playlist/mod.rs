//! Playlist index manager
//!
//! Keeps the raw item list in insertion order plus two derived index layers:
//! the filtered subset (always in original order) and the playback order
//! (the filtered subset, possibly shuffled). A reverse lookup from locator to
//! playback position is rebuilt as a whole every time the playback order
//! changes.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::domain::model::MediaLocator;

/// Name matcher compiled from a filter pattern
#[derive(Debug, Clone)]
enum NameFilter {
    All,
    Pattern(Regex),
    Literal(String),
}

impl NameFilter {
    /// Compile `pattern`; an invalid regex degrades to a literal substring match
    fn compile(pattern: &str) -> Self {
        if pattern.is_empty() {
            return NameFilter::All;
        }
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => NameFilter::Pattern(regex),
            Err(e) => {
                warn!("Filter '{}' is not a valid regex, matching literally: {}", pattern, e);
                NameFilter::Literal(pattern.to_lowercase())
            }
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::All => true,
            NameFilter::Pattern(regex) => regex.is_match(name),
            NameFilter::Literal(needle) => name.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Ordered, filterable, shuffle-able view over a video collection
#[derive(Debug, Clone)]
pub struct Playlist {
    items: Vec<MediaLocator>,
    filtered: Vec<usize>,
    playback: Vec<usize>,
    cursor: Option<usize>,
    reverse: HashMap<MediaLocator, usize>,
    pattern: String,
    randomized: bool,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Playlist {
    /// Create a playlist with identity filter and playback order
    pub fn new(items: Vec<MediaLocator>) -> Self {
        let identity: Vec<usize> = (0..items.len()).collect();
        let mut playlist = Self {
            cursor: if items.is_empty() { None } else { Some(0) },
            items,
            filtered: identity.clone(),
            playback: identity,
            reverse: HashMap::new(),
            pattern: String::new(),
            randomized: false,
        };
        playlist.rebuild_lookup();
        playlist
    }

    /// All items in insertion order
    pub fn items(&self) -> &[MediaLocator] {
        &self.items
    }

    /// Number of items passing the filter
    pub fn len(&self) -> usize {
        self.playback.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playback.is_empty()
    }

    pub fn total_len(&self) -> usize {
        self.items.len()
    }

    pub fn filter_pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_randomized(&self) -> bool {
        self.randomized
    }

    /// Indices into `items`, filtered, in original order
    pub fn filtered_indices(&self) -> &[usize] {
        &self.filtered
    }

    /// Indices into `items` in the order `next`/`previous` walk
    pub fn playback_indices(&self) -> &[usize] {
        &self.playback
    }

    /// Locators in playback order
    pub fn playback_order(&self) -> impl Iterator<Item = &MediaLocator> + '_ {
        self.playback.iter().map(move |&index| &self.items[index])
    }

    /// Position of the cursor within the playback order
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    /// Currently selected locator, `None` when nothing is selectable
    pub fn current(&self) -> Option<&MediaLocator> {
        let position = self.cursor?;
        self.playback
            .get(position)
            .map(|&index| &self.items[index])
    }

    /// Playback position of `locator`, or `None` when it is not visible
    pub fn index_of(&self, locator: &MediaLocator) -> Option<usize> {
        self.reverse.get(locator).copied()
    }

    /// Move the cursor to a playback position
    pub fn set_current(&mut self, position: usize) -> bool {
        if position >= self.playback.len() {
            return false;
        }
        self.cursor = Some(position);
        true
    }

    /// Advance circularly; fails when there is nothing to move to
    pub fn next(&mut self) -> bool {
        let len = self.playback.len();
        match self.cursor {
            Some(position) if len > 1 => {
                self.cursor = Some((position + 1) % len);
                true
            }
            _ => false,
        }
    }

    /// Retreat circularly; fails when there is nothing to move to
    pub fn previous(&mut self) -> bool {
        let len = self.playback.len();
        match self.cursor {
            Some(position) if len > 1 => {
                self.cursor = Some((position + len - 1) % len);
                true
            }
            _ => false,
        }
    }

    /// Append an item; it becomes visible if it passes the active filter
    pub fn push(&mut self, locator: MediaLocator) {
        let index = self.items.len();
        let visible = NameFilter::compile(&self.pattern).matches(locator.display_name());
        self.items.push(locator);
        if visible {
            self.filtered.push(index);
            self.playback.push(index);
            self.rebuild_lookup();
            if self.cursor.is_none() {
                self.cursor = Some(0);
            }
        }
    }

    /// Recompute the filtered subset.
    ///
    /// Without `preserve_order` the playback order is reset to the (unshuffled)
    /// filtered order. With it, surviving items keep their current playback
    /// order and newly visible items are appended in original order. The
    /// current item stays selected when it survives the filter.
    pub fn set_filter(&mut self, pattern: &str, preserve_order: bool) {
        let previous = self.current().cloned();
        let filter = NameFilter::compile(pattern);

        self.filtered = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| filter.matches(item.display_name()))
            .map(|(index, _)| index)
            .collect();
        self.pattern = pattern.to_string();

        if preserve_order {
            let mut visible = vec![false; self.items.len()];
            for &index in &self.filtered {
                visible[index] = true;
            }
            let mut placed = vec![false; self.items.len()];
            let mut playback: Vec<usize> = Vec::with_capacity(self.filtered.len());
            for &index in &self.playback {
                if visible[index] {
                    placed[index] = true;
                    playback.push(index);
                }
            }
            playback.extend(self.filtered.iter().copied().filter(|&index| !placed[index]));
            self.playback = playback;
        } else {
            self.playback = self.filtered.clone();
            self.randomized = false;
        }

        self.rebuild_lookup();
        self.restore_cursor(previous.as_ref());
        debug!(
            "Filter '{}' keeps {} of {} items",
            pattern,
            self.filtered.len(),
            self.items.len()
        );
    }

    /// Rebuild the playback order from the filtered subset, shuffled when
    /// `randomize` is set
    pub fn set_order(&mut self, randomize: bool, keep_current: bool) {
        self.set_order_with_rng(randomize, keep_current, &mut rand::thread_rng());
    }

    /// [`Playlist::set_order`] with a caller-supplied random source
    pub fn set_order_with_rng<R: Rng + ?Sized>(
        &mut self,
        randomize: bool,
        keep_current: bool,
        rng: &mut R,
    ) {
        let previous = self.current().cloned();

        self.playback = self.filtered.clone();
        if randomize {
            self.playback.shuffle(rng);
        }
        self.randomized = randomize;
        self.rebuild_lookup();

        if keep_current {
            self.restore_cursor(previous.as_ref());
        } else {
            self.cursor = if self.playback.is_empty() { None } else { Some(0) };
        }
    }

    fn restore_cursor(&mut self, previous: Option<&MediaLocator>) {
        self.cursor = previous
            .and_then(|locator| self.index_of(locator))
            .or(if self.playback.is_empty() { None } else { Some(0) });
    }

    /// Replace the reverse lookup wholesale from the playback order.
    /// Duplicate locators resolve to their first playback position.
    fn rebuild_lookup(&mut self) {
        let mut reverse = HashMap::with_capacity(self.playback.len());
        for (position, &index) in self.playback.iter().enumerate() {
            reverse.entry(self.items[index].clone()).or_insert(position);
        }
        self.reverse = reverse;
        debug_assert!(self.playback.iter().all(|&index| index < self.items.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn locators(names: &[&str]) -> Vec<MediaLocator> {
        names
            .iter()
            .map(|name| MediaLocator::new(format!("/videos/{}", name)))
            .collect()
    }

    fn sample() -> Playlist {
        Playlist::new(locators(&[
            "beach.mp4",
            "Mountain.mkv",
            "beach_sunset.mp4",
            "city.mov",
            "forest.mp4",
        ]))
    }

    fn sorted(mut indices: Vec<usize>) -> Vec<usize> {
        indices.sort_unstable();
        indices
    }

    #[test]
    fn test_new_playlist_is_identity() {
        let playlist = sample();
        assert_eq!(playlist.filtered_indices(), &[0, 1, 2, 3, 4]);
        assert_eq!(playlist.playback_indices(), &[0, 1, 2, 3, 4]);
        assert_eq!(playlist.current_index(), Some(0));
        assert_eq!(playlist.current().unwrap().display_name(), "beach.mp4");
    }

    #[test]
    fn test_empty_playlist_has_no_current() {
        let mut playlist = Playlist::new(Vec::new());
        assert_eq!(playlist.current(), None);
        assert_eq!(playlist.current_index(), None);
        assert!(!playlist.next());
        assert!(!playlist.previous());
    }

    #[test]
    fn test_single_item_navigation_fails() {
        let mut playlist = Playlist::new(locators(&["only.mp4"]));
        assert!(!playlist.next());
        assert!(!playlist.previous());
        assert_eq!(playlist.current_index(), Some(0));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut playlist = sample();
        assert!(playlist.previous());
        assert_eq!(playlist.current().unwrap().display_name(), "forest.mp4");
        assert!(playlist.next());
        assert_eq!(playlist.current().unwrap().display_name(), "beach.mp4");
    }

    #[test]
    fn test_filter_is_case_insensitive_regex() {
        let mut playlist = sample();
        playlist.set_filter("^beach", false);
        assert_eq!(playlist.filtered_indices(), &[0, 2]);

        playlist.set_filter("MOUNTAIN", false);
        assert_eq!(playlist.filtered_indices(), &[1]);
    }

    #[test]
    fn test_invalid_regex_falls_back_to_substring() {
        let mut playlist = Playlist::new(locators(&["a(1).mp4", "b.mp4"]));
        playlist.set_filter("a(", false);
        assert_eq!(playlist.filtered_indices(), &[0]);
    }

    #[test]
    fn test_filter_keeps_current_when_it_survives() {
        let mut playlist = sample();
        playlist.set_current(2);
        playlist.set_filter("beach", false);
        assert_eq!(playlist.current().unwrap().display_name(), "beach_sunset.mp4");
        assert_eq!(playlist.current_index(), Some(1));
    }

    #[test]
    fn test_filter_resets_cursor_when_current_is_hidden() {
        let mut playlist = sample();
        playlist.set_current(3);
        playlist.set_filter("beach", false);
        assert_eq!(playlist.current_index(), Some(0));

        playlist.set_filter("nothing-matches", false);
        assert_eq!(playlist.current_index(), None);
        assert_eq!(playlist.current(), None);
    }

    #[test]
    fn test_filter_round_trip_restores_full_set() {
        let mut playlist = sample();
        playlist.set_filter("mp4", false);
        assert_eq!(playlist.len(), 3);
        playlist.set_filter("", false);
        assert_eq!(sorted(playlist.playback_indices().to_vec()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_filter_preserving_order_keeps_shuffle() {
        let mut playlist = sample();
        let mut rng = StdRng::seed_from_u64(7);
        playlist.set_order_with_rng(true, false, &mut rng);
        let shuffled = playlist.playback_indices().to_vec();

        playlist.set_filter("mp4", true);
        let expected: Vec<usize> = shuffled
            .iter()
            .copied()
            .filter(|index| [0, 2, 4].contains(index))
            .collect();
        assert_eq!(playlist.playback_indices(), expected.as_slice());
        assert!(playlist.is_randomized());

        playlist.set_filter("", true);
        assert_eq!(&playlist.playback_indices()[..3], expected.as_slice());
        assert_eq!(sorted(playlist.playback_indices()[3..].to_vec()), vec![1, 3]);
    }

    #[test]
    fn test_shuffle_then_unshuffle_keeps_current() {
        let mut playlist = sample();
        playlist.set_current(3);
        let current = playlist.current().cloned();

        let mut rng = StdRng::seed_from_u64(42);
        playlist.set_order_with_rng(true, true, &mut rng);
        assert_eq!(playlist.current().cloned(), current);
        assert_eq!(sorted(playlist.playback_indices().to_vec()), vec![0, 1, 2, 3, 4]);

        playlist.set_order(false, true);
        assert_eq!(playlist.current().cloned(), current);
        assert_eq!(playlist.playback_indices(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_set_order_without_keep_resets_cursor() {
        let mut playlist = sample();
        playlist.set_current(4);
        playlist.set_order(false, false);
        assert_eq!(playlist.current_index(), Some(0));
    }

    #[test]
    fn test_index_of_tracks_playback_positions() {
        let mut playlist = sample();
        let city = MediaLocator::new("/videos/city.mov");
        assert_eq!(playlist.index_of(&city), Some(3));

        playlist.set_filter("c", false);
        let position = playlist.index_of(&city).unwrap();
        assert_eq!(playlist.playback_order().nth(position), Some(&city));
    }

    #[test]
    fn test_index_of_absent_locator_is_not_found() {
        let mut playlist = sample();
        let city = MediaLocator::new("/videos/city.mov");
        playlist.set_filter("beach", false);
        assert_eq!(playlist.index_of(&city), None);
        assert_eq!(playlist.index_of(&MediaLocator::new("/nowhere.mp4")), None);
    }

    #[test]
    fn test_lookup_consistent_after_every_reorder() {
        let mut playlist = sample();
        let mut rng = StdRng::seed_from_u64(3);
        for round in 0..10 {
            playlist.set_order_with_rng(round % 2 == 0, true, &mut rng);
            for (position, locator) in playlist.playback_order().enumerate() {
                assert_eq!(playlist.index_of(locator), Some(position));
            }
        }
    }

    #[test]
    fn test_push_respects_filter() {
        let mut playlist = Playlist::default();
        playlist.set_filter("mp4", false);
        playlist.push(MediaLocator::new("/v/a.mkv"));
        assert!(playlist.is_empty());
        assert_eq!(playlist.current(), None);

        playlist.push(MediaLocator::new("/v/b.mp4"));
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.total_len(), 2);
        assert_eq!(playlist.current().unwrap().display_name(), "b.mp4");
    }
}
