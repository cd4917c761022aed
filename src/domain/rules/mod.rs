// Domain rules - Marking and seeking policies

use crate::domain::model::*;

/// Shortest range a finalized mark may cover
pub const DEFAULT_MIN_MARK_DURATION: Time = Time::from_ms(100);

/// Pre-seek distance used by re-encoding cuts
pub const DEFAULT_PRELOAD: Time = Time::from_secs(1);

/// Rules applied when a two-step mark is finalized
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkingPolicy {
    pub min_duration: Time,
}

impl Default for MarkingPolicy {
    fn default() -> Self {
        Self {
            min_duration: DEFAULT_MIN_MARK_DURATION,
        }
    }
}

impl MarkingPolicy {
    pub fn new(min_duration: Time) -> Self {
        Self {
            min_duration: min_duration.non_negative(),
        }
    }

    /// Build the candidate range, or `None` when it is too short to keep.
    ///
    /// A zero or negative length mark is discarded, never an error.
    pub fn accept(&self, start: Time, end: Time) -> Option<Sequence> {
        let sequence = Sequence::new(start, end).ok()?;
        (sequence.duration() >= self.min_duration).then_some(sequence)
    }
}

/// Seek plan for a re-encoding cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPlan {
    /// Input seek to `start - preload`, then output seek by `preload`
    Preloaded { input_seek: Time, output_seek: Time },
    /// Output seek straight to the range start
    Direct { output_seek: Time },
}

impl SeekPlan {
    /// Preload only when the range starts at least `preload` into the video
    pub fn for_start(start: Time, preload: Time) -> Self {
        if preload > Time::ZERO && start >= preload {
            SeekPlan::Preloaded {
                input_seek: start - preload,
                output_seek: preload,
            }
        } else {
            SeekPlan::Direct {
                output_seek: start.non_negative(),
            }
        }
    }
}
