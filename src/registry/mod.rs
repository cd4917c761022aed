//! Sequence registry
//!
//! Owns the marked ranges of the currently loaded video and their per-range
//! cut state. All mutation is expected from a single logical thread (the
//! session's event loop); there is no internal locking.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::domain::model::*;
use crate::domain::rules::MarkingPolicy;

/// Result of a mark toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Start recorded, waiting for the end
    Started(Time),
    /// Range inserted (or already present) as `Ready`
    Finalized(Sequence),
    /// Candidate was too short and dropped
    Discarded,
}

/// Marked ranges keyed by value, with selection and pending edit
#[derive(Debug, Clone, Default)]
pub struct SequenceRegistry {
    entries: BTreeMap<Sequence, SequenceState>,
    pending_start: Option<Time>,
    selected: Option<Sequence>,
    policy: MarkingPolicy,
}

impl SequenceRegistry {
    pub fn new(policy: MarkingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> &MarkingPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, sequence: &Sequence) -> bool {
        self.entries.contains_key(sequence)
    }

    pub fn get(&self, sequence: &Sequence) -> Option<&SequenceState> {
        self.entries.get(sequence)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sequence, &SequenceState)> {
        self.entries.iter()
    }

    /// Sequences eligible for cutting: `Ready` and not claimed by a chain
    pub fn ready(&self) -> Vec<Sequence> {
        self.entries
            .iter()
            .filter(|(_, state)| state.state == OperationState::Ready && state.owner.is_none())
            .map(|(sequence, _)| *sequence)
            .collect()
    }

    /// Whole-registry view for observers
    pub fn snapshot(&self) -> Vec<SequenceSnapshot> {
        self.entries
            .iter()
            .map(|(sequence, state)| SequenceSnapshot::new(sequence, state))
            .collect()
    }

    pub fn is_marking(&self) -> bool {
        self.pending_start.is_some()
    }

    pub fn pending_start(&self) -> Option<Time> {
        self.pending_start
    }

    /// First mark step: remember where the range starts
    pub fn begin_mark(&mut self, position: Time) {
        self.pending_start = Some(position.non_negative());
    }

    /// Second mark step: close the pending range at `position`.
    ///
    /// Returns `None` when nothing was pending or the candidate is shorter
    /// than the policy minimum. An equal range already present keeps its state.
    pub fn finalize_mark(&mut self, position: Time) -> Option<Sequence> {
        let start = self.pending_start.take()?;
        let sequence = self.policy.accept(start, position)?;
        self.entries.entry(sequence).or_default();
        debug!("Marked sequence {}", sequence);
        Some(sequence)
    }

    /// Toggle between the two mark steps
    pub fn mark(&mut self, position: Time) -> MarkOutcome {
        if self.is_marking() {
            match self.finalize_mark(position) {
                Some(sequence) => MarkOutcome::Finalized(sequence),
                None => MarkOutcome::Discarded,
            }
        } else {
            self.begin_mark(position);
            MarkOutcome::Started(position.non_negative())
        }
    }

    /// Drop a pending mark; returns whether one existed
    pub fn cancel_mark(&mut self) -> bool {
        self.pending_start.take().is_some()
    }

    /// Insert a complete range directly as `Ready`
    pub fn insert(&mut self, sequence: Sequence) -> bool {
        if self.entries.contains_key(&sequence) {
            return false;
        }
        self.entries.insert(sequence, SequenceState::default());
        true
    }

    pub fn selected(&self) -> Option<(&Sequence, &SequenceState)> {
        let sequence = self.selected.as_ref()?;
        self.entries.get_key_value(sequence)
    }

    /// Set or clear the selection. Selecting an unknown range changes nothing
    /// and returns `false`.
    pub fn select(&mut self, sequence: Option<Sequence>) -> bool {
        if let Some(target) = &sequence {
            if !self.entries.contains_key(target) {
                return false;
            }
        }
        if let Some(previous) = self.selected.take() {
            if let Some(state) = self.entries.get_mut(&previous) {
                state.selected = false;
            }
        }
        if let Some(target) = sequence {
            if let Some(state) = self.entries.get_mut(&target) {
                state.selected = true;
            }
            self.selected = Some(target);
        }
        true
    }

    pub fn set_editing(&mut self, sequence: &Sequence, editing: bool) -> bool {
        self.with_entry(sequence, |state| state.is_editing = editing)
    }

    pub fn set_state(&mut self, sequence: &Sequence, operation: OperationState) -> bool {
        self.with_entry(sequence, |state| {
            state.state = operation;
            if operation != OperationState::Processing {
                state.elapsed = Time::ZERO;
            }
        })
    }

    pub fn set_progress(&mut self, sequence: &Sequence, elapsed: Time) -> bool {
        trace!("Progress {} at {}", sequence, elapsed);
        self.with_entry(sequence, |state| state.elapsed = elapsed)
    }

    pub fn set_output_path(&mut self, sequence: &Sequence, path: PathBuf) -> bool {
        self.with_entry(sequence, |state| state.output_path = Some(path))
    }

    /// Hand the entry to `chain`; only a `Ready`, unclaimed entry can be claimed
    pub fn claim(&mut self, sequence: &Sequence, chain: ChainId) -> bool {
        match self.entries.get_mut(sequence) {
            Some(state) if state.state == OperationState::Ready && state.owner.is_none() => {
                state.owner = Some(chain);
                true
            }
            _ => false,
        }
    }

    /// Give up ownership if `chain` still holds it
    pub fn release(&mut self, sequence: &Sequence, chain: ChainId) -> bool {
        match self.entries.get_mut(sequence) {
            Some(state) if state.owner == Some(chain) => {
                state.owner = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_owned_by(&self, sequence: &Sequence, chain: ChainId) -> bool {
        self.entries
            .get(sequence)
            .map(|state| state.owner == Some(chain))
            .unwrap_or(false)
    }

    /// Force every entry back to `Ready`, dropping chain ownership
    pub fn reset(&mut self) {
        for state in self.entries.values_mut() {
            state.state = OperationState::Ready;
            state.elapsed = Time::ZERO;
            state.owner = None;
        }
    }

    /// Delete an entry, clearing the selection first if it pointed at it
    pub fn remove(&mut self, sequence: &Sequence) -> Option<SequenceState> {
        if self.selected.as_ref() == Some(sequence) {
            self.selected = None;
        }
        self.entries.remove(sequence)
    }

    /// Drop everything, including a pending mark (video switch)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected = None;
        self.pending_start = None;
    }

    fn with_entry(&mut self, sequence: &Sequence, update: impl FnOnce(&mut SequenceState)) -> bool {
        match self.entries.get_mut(sequence) {
            Some(state) => {
                update(state);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(start_ms: i64, end_ms: i64) -> Sequence {
        Sequence::new(Time::from_ms(start_ms), Time::from_ms(end_ms)).unwrap()
    }

    #[test]
    fn test_two_step_mark_inserts_ready() {
        let mut registry = SequenceRegistry::default();
        assert_eq!(registry.mark(Time::from_ms(1000)), MarkOutcome::Started(Time::from_ms(1000)));
        assert!(registry.is_marking());

        let outcome = registry.mark(Time::from_ms(4000));
        assert_eq!(outcome, MarkOutcome::Finalized(seq(1000, 4000)));
        assert!(!registry.is_marking());
        assert_eq!(registry.get(&seq(1000, 4000)).unwrap().state, OperationState::Ready);
    }

    #[test]
    fn test_short_or_inverted_mark_is_discarded() {
        let mut registry = SequenceRegistry::new(MarkingPolicy::new(Time::from_ms(500)));
        registry.begin_mark(Time::from_ms(1000));
        assert_eq!(registry.finalize_mark(Time::from_ms(1200)), None);
        assert!(registry.is_empty());

        registry.begin_mark(Time::from_ms(3000));
        assert_eq!(registry.mark(Time::from_ms(2000)), MarkOutcome::Discarded);
        assert!(registry.is_empty());
        assert!(!registry.is_marking());
    }

    #[test]
    fn test_finalize_without_begin_is_noop() {
        let mut registry = SequenceRegistry::default();
        assert_eq!(registry.finalize_mark(Time::from_secs(3)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_mark_keeps_existing_state() {
        let mut registry = SequenceRegistry::default();
        registry.insert(seq(0, 5000));
        registry.set_state(&seq(0, 5000), OperationState::Succeeded);

        registry.begin_mark(Time::ZERO);
        registry.finalize_mark(Time::from_ms(5000));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&seq(0, 5000)).unwrap().state, OperationState::Succeeded);
    }

    #[test]
    fn test_cancel_mark() {
        let mut registry = SequenceRegistry::default();
        registry.begin_mark(Time::from_secs(1));
        assert!(registry.cancel_mark());
        assert!(!registry.cancel_mark());
        assert_eq!(registry.finalize_mark(Time::from_secs(5)), None);
    }

    #[test]
    fn test_select_moves_flag() {
        let mut registry = SequenceRegistry::default();
        registry.insert(seq(0, 1000));
        registry.insert(seq(2000, 3000));

        assert!(registry.select(Some(seq(0, 1000))));
        assert!(registry.get(&seq(0, 1000)).unwrap().selected);

        assert!(registry.select(Some(seq(2000, 3000))));
        assert!(!registry.get(&seq(0, 1000)).unwrap().selected);
        assert_eq!(registry.selected().map(|(s, _)| *s), Some(seq(2000, 3000)));

        assert!(registry.select(None));
        assert!(registry.selected().is_none());
        assert!(!registry.get(&seq(2000, 3000)).unwrap().selected);
    }

    #[test]
    fn test_select_unknown_is_rejected() {
        let mut registry = SequenceRegistry::default();
        registry.insert(seq(0, 1000));
        registry.select(Some(seq(0, 1000)));
        assert!(!registry.select(Some(seq(5, 6))));
        assert_eq!(registry.selected().map(|(s, _)| *s), Some(seq(0, 1000)));
    }

    #[test]
    fn test_removing_selected_clears_selection() {
        let mut registry = SequenceRegistry::default();
        registry.insert(seq(0, 1000));
        registry.select(Some(seq(0, 1000)));

        assert!(registry.remove(&seq(0, 1000)).is_some());
        assert!(registry.selected().is_none());

        // an equal range added later is not silently selected
        registry.insert(seq(0, 1000));
        assert!(registry.selected().is_none());
        assert!(!registry.get(&seq(0, 1000)).unwrap().selected);
    }

    #[test]
    fn test_scoped_mutations_on_missing_entry() {
        let mut registry = SequenceRegistry::default();
        let missing = seq(0, 1000);
        assert!(!registry.set_state(&missing, OperationState::Failed));
        assert!(!registry.set_progress(&missing, Time::from_ms(10)));
        assert!(!registry.set_output_path(&missing, PathBuf::from("x.mp4")));
    }

    #[test]
    fn test_claim_requires_ready_and_unclaimed() {
        let mut registry = SequenceRegistry::default();
        let sequence = seq(0, 1000);
        registry.insert(sequence);

        assert!(registry.claim(&sequence, ChainId(1)));
        assert!(!registry.claim(&sequence, ChainId(2)));
        assert!(registry.ready().is_empty());
        assert!(registry.is_owned_by(&sequence, ChainId(1)));

        assert!(!registry.release(&sequence, ChainId(2)));
        assert!(registry.release(&sequence, ChainId(1)));

        registry.set_state(&sequence, OperationState::Failed);
        assert!(!registry.claim(&sequence, ChainId(3)));
    }

    #[test]
    fn test_reset_returns_everything_to_ready() {
        let mut registry = SequenceRegistry::default();
        registry.insert(seq(0, 1000));
        registry.insert(seq(2000, 3000));
        registry.claim(&seq(0, 1000), ChainId(1));
        registry.set_state(&seq(0, 1000), OperationState::Processing);
        registry.set_progress(&seq(0, 1000), Time::from_ms(300));
        registry.set_state(&seq(2000, 3000), OperationState::Failed);

        registry.reset();
        assert_eq!(registry.ready(), vec![seq(0, 1000), seq(2000, 3000)]);
        assert_eq!(registry.get(&seq(0, 1000)).unwrap().elapsed, Time::ZERO);
    }

    #[test]
    fn test_clear_drops_pending_and_selection() {
        let mut registry = SequenceRegistry::default();
        registry.insert(seq(0, 1000));
        registry.select(Some(seq(0, 1000)));
        registry.begin_mark(Time::from_secs(4));

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.is_marking());
        assert!(registry.selected().is_none());
    }
}
