// Domain models - Core types and data structures

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Millisecond-precision timestamp or duration.
///
/// Arithmetic is plain signed integer arithmetic; a difference can go
/// negative, so anything used as a seek target must be clamped first
/// (see [`Time::non_negative`] and [`Time::clamp`]).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Time(i64);

impl Time {
    pub const ZERO: Time = Time(0);

    /// Create a time from milliseconds
    pub const fn from_ms(milliseconds: i64) -> Self {
        Self(milliseconds)
    }

    /// Create a time from whole seconds
    pub const fn from_secs(seconds: i64) -> Self {
        Self(seconds * 1000)
    }

    /// Create a time from hours, minutes, seconds, milliseconds
    pub const fn from_hms(hours: i64, minutes: i64, seconds: i64, milliseconds: i64) -> Self {
        Self(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + milliseconds)
    }

    /// [`Time::from_hms`] for untrusted fields; `None` when the total
    /// does not fit in milliseconds
    pub fn checked_from_hms(hours: i64, minutes: i64, seconds: i64, milliseconds: i64) -> Option<Self> {
        hours
            .checked_mul(3_600_000)?
            .checked_add(minutes.checked_mul(60_000)?)?
            .checked_add(seconds.checked_mul(1000)?)?
            .checked_add(milliseconds)
            .map(Self)
    }

    /// Milliseconds
    pub const fn ms(&self) -> i64 {
        self.0
    }

    /// Whole seconds, truncated toward zero
    pub const fn seconds(&self) -> i64 {
        self.0 / 1000
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamp below at zero
    pub fn non_negative(self) -> Self {
        Self(self.0.max(0))
    }

    /// Clamp into `[lo, hi]`
    pub fn clamp(self, lo: Time, hi: Time) -> Self {
        Self(self.0.clamp(lo.0, hi.0.max(lo.0)))
    }

    fn components(&self) -> (i64, i64, i64, i64) {
        let total = self.0.abs();
        let hours = total / 3_600_000;
        let minutes = (total % 3_600_000) / 60_000;
        let seconds = (total % 60_000) / 1000;
        let millis = total % 1000;
        (hours, minutes, seconds, millis)
    }

    /// File-name friendly `HH.MM.SS` form
    pub fn to_file_stamp(&self) -> String {
        let (hours, minutes, seconds, _) = self.components();
        format!("{:02}.{:02}.{:02}", hours, minutes, seconds)
    }
}

/// Encoder argument form: `HH:MM:SS.mmm`
impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hours, minutes, seconds, millis) = self.components();
        if self.0 < 0 {
            write!(f, "-")?;
        }
        write!(f, "{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        Time(self.0 - rhs.0)
    }
}

impl Mul<f64> for Time {
    type Output = Time;

    fn mul(self, factor: f64) -> Time {
        Time((self.0 as f64 * factor) as i64)
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        self.0 -= rhs.0;
    }
}

/// Reference to a playable file: a local path or a URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Local filesystem path, with any `file://` prefix removed
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(self.0.strip_prefix("file://").unwrap_or(&self.0))
    }

    /// Final path segment, used for filtering and display
    pub fn display_name(&self) -> &str {
        let trimmed = self.0.trim_end_matches(['/', '\\']);
        trimmed
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(trimmed)
    }

    /// Display name without its extension
    pub fn stem(&self) -> &str {
        let name = self.display_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.display_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(dot) => Some(&name[dot + 1..]).filter(|ext| !ext.is_empty()),
        }
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed time range inside the current video. Ranges are keyed by value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Sequence {
    pub start: Time,
    pub end: Time,
}

impl Sequence {
    /// Create a sequence; `start` must be strictly before `end`
    pub fn new(start: Time, end: Time) -> Result<Self, DomainError> {
        if start.is_negative() {
            return Err(DomainError::InvalidTimeRange(format!(
                "start {} is negative",
                start
            )));
        }
        if start >= end {
            return Err(DomainError::InvalidTimeRange(format!(
                "start {} is not before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Time {
        self.end - self.start
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.start, self.end)
    }
}

/// Cut lifecycle of a sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Ready,
    Processing,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Ready => "ready",
            OperationState::Processing => "processing",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Identifier of one cut chain, unique per orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain#{}", self.0)
    }
}

/// Mutable record attached to a sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceState {
    pub state: OperationState,
    pub selected: bool,
    pub is_editing: bool,
    /// Name of the exported file at the time of cutting; it may have been
    /// moved or deleted since.
    pub output_path: Option<PathBuf>,
    /// Encoder progress, meaningful only while `Processing`
    pub elapsed: Time,
    /// Chain currently allowed to write lifecycle updates
    pub(crate) owner: Option<ChainId>,
}

impl SequenceState {
    pub fn owner(&self) -> Option<ChainId> {
        self.owner
    }
}

/// Serializable view of one registry entry, published to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSnapshot {
    pub start: Time,
    pub end: Time,
    pub state: OperationState,
    pub selected: bool,
    pub is_editing: bool,
    pub output_path: Option<PathBuf>,
    pub elapsed: Time,
}

impl SequenceSnapshot {
    pub fn new(sequence: &Sequence, state: &SequenceState) -> Self {
        Self {
            start: sequence.start,
            end: sequence.end,
            state: state.state,
            selected: state.selected,
            is_editing: state.is_editing,
            output_path: state.output_path.clone(),
            elapsed: state.elapsed,
        }
    }

    pub fn sequence(&self) -> Sequence {
        Sequence {
            start: self.start,
            end: self.end,
        }
    }
}

/// Cut policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutMethod {
    /// Stream copy, keyframe accurate
    Fast,
    /// Re-encoded trim with optional preload seek
    Precise,
    /// Precise cut, reverse, then concatenate forward/backward pairs
    Loop,
}

impl CutMethod {
    pub const ALL: [CutMethod; 3] = [CutMethod::Fast, CutMethod::Precise, CutMethod::Loop];

    /// Parse cut method from string
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_lowercase().as_str() {
            "fast" | "copy" => Ok(CutMethod::Fast),
            "precise" | "reencode" => Ok(CutMethod::Precise),
            "loop" => Ok(CutMethod::Loop),
            other => Err(DomainError::UnknownCutMethod(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CutMethod::Fast => "fast",
            CutMethod::Precise => "precise",
            CutMethod::Loop => "loop",
        }
    }
}

impl FromStr for CutMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
