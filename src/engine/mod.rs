//! Cut engine: chain builders per cut method and the orchestrator that runs them

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::model::{CutMethod, MediaLocator, Sequence, Time};
use crate::domain::rules::DEFAULT_PRELOAD;
use crate::error::ClipMarkResult;
use crate::utils::path::{output_file_name, unique_path_with};

pub mod chain;
pub mod copy;
pub mod looped;
pub mod observer;
pub mod orchestrator;
pub mod progress;
pub mod reencode;

use chain::ChainPlan;

/// Encoder settings shared by every builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Encoder binary
    pub ffmpeg_path: PathBuf,
    /// Video codec for re-encoding cuts
    pub video_codec: String,
    /// Audio codec for re-encoding cuts
    pub audio_codec: String,
    /// Pre-seek distance for precise cuts
    pub preload: Time,
    /// Forward/backward pairs in a loop export
    pub loop_count: u32,
    /// Kill a stage that runs longer than this
    pub stage_timeout: Option<Duration>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preload: DEFAULT_PRELOAD,
            loop_count: 2,
            stage_timeout: None,
        }
    }
}

/// One sequence to be cut, with everything a builder needs to name its files
pub struct CutJob<'a> {
    pub source: &'a MediaLocator,
    pub sequence: Sequence,
    pub output_dir: &'a Path,
    pub settings: &'a EncoderSettings,
    /// Paths already promised to chains that have not finished yet
    pub reserved: &'a HashSet<PathBuf>,
}

impl CutJob<'_> {
    /// Free output path for this job, disambiguated against the filesystem
    /// and against files other running chains are about to write
    pub fn output_path(&self, tag: Option<&str>) -> PathBuf {
        let candidate = self
            .output_dir
            .join(output_file_name(self.source, &self.sequence, tag));
        unique_path_with(&candidate, |path| {
            path.exists() || self.reserved.contains(path)
        })
    }

    pub fn input(&self) -> String {
        self.source.local_path().to_string_lossy().into_owned()
    }
}

/// Turns a job into a stage tree for one cut method
pub trait ChainBuilder: Send + Sync {
    fn method(&self) -> CutMethod;

    fn build(&self, job: &CutJob<'_>) -> ClipMarkResult<ChainPlan>;
}

/// Strategy table from cut method to chain builder
pub struct MethodTable {
    builders: HashMap<CutMethod, Box<dyn ChainBuilder>>,
}

impl Default for MethodTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(Box::new(copy::StreamCopyBuilder));
        table.register(Box::new(reencode::ReencodeBuilder));
        table.register(Box::new(looped::LoopBuilder));
        table
    }
}

impl MethodTable {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Add a builder, replacing any previous one for the same method
    pub fn register(&mut self, builder: Box<dyn ChainBuilder>) -> Option<Box<dyn ChainBuilder>> {
        self.builders.insert(builder.method(), builder)
    }

    pub fn get(&self, method: CutMethod) -> Option<&dyn ChainBuilder> {
        self.builders.get(&method).map(|b| b.as_ref())
    }

    pub fn methods(&self) -> Vec<CutMethod> {
        let mut methods: Vec<CutMethod> = self.builders.keys().copied().collect();
        methods.sort_by_key(|m| CutMethod::ALL.iter().position(|a| a == m));
        methods
    }
}

/// Which sequences a cut request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutScope {
    /// Every `Ready` sequence
    AllReady,
    /// The selected sequence, if it is `Ready`
    Selected,
    /// One sequence, if it is `Ready`
    Only(Sequence),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::chain::{StageKind, StageNode, StageSpec};

    struct FixedBuilder;

    impl ChainBuilder for FixedBuilder {
        fn method(&self) -> CutMethod {
            CutMethod::Fast
        }

        fn build(&self, job: &CutJob<'_>) -> ClipMarkResult<ChainPlan> {
            let output = job.output_path(Some("fixed"));
            Ok(ChainPlan {
                root: StageNode::leaf(StageSpec::new(StageKind::Cut, "true", Time::ZERO)),
                output,
                artifacts: Vec::new(),
            })
        }
    }

    #[test]
    fn test_default_table_has_all_methods() {
        let table = MethodTable::default();
        assert_eq!(table.methods(), CutMethod::ALL.to_vec());
    }

    #[test]
    fn test_register_replaces_builder() {
        let mut table = MethodTable::default();
        let previous = table.register(Box::new(FixedBuilder));
        assert!(previous.is_some());

        let source = MediaLocator::new("/v/a.mp4");
        let settings = EncoderSettings::default();
        let reserved = HashSet::new();
        let job = CutJob {
            source: &source,
            sequence: Sequence::new(Time::ZERO, Time::from_secs(2)).unwrap(),
            output_dir: Path::new("/nonexistent-out"),
            settings: &settings,
            reserved: &reserved,
        };
        let plan = table.get(CutMethod::Fast).unwrap().build(&job).unwrap();
        assert_eq!(plan.output, PathBuf::from("/nonexistent-out/a.00.00.00.2.fixed.mp4"));
    }

    #[test]
    fn test_output_path_skips_reserved() {
        let source = MediaLocator::new("/v/a.mp4");
        let settings = EncoderSettings::default();
        let reserved: HashSet<PathBuf> = [PathBuf::from("/nonexistent-out/a.00.00.00.2.mp4")]
            .into_iter()
            .collect();
        let job = CutJob {
            source: &source,
            sequence: Sequence::new(Time::ZERO, Time::from_ms(2400)).unwrap(),
            output_dir: Path::new("/nonexistent-out"),
            settings: &settings,
            reserved: &reserved,
        };
        assert_eq!(
            job.output_path(None),
            PathBuf::from("/nonexistent-out/a.00.00.00.2.1.mp4")
        );
    }
}
