//! Re-encoding cut with preload seek

use std::path::Path;

use crate::domain::model::CutMethod;
use crate::domain::rules::SeekPlan;
use crate::engine::chain::{ChainPlan, StageKind, StageNode, StageSpec};
use crate::engine::{ChainBuilder, CutJob};
use crate::error::ClipMarkResult;

/// Frame-accurate cut. Seeks on the input to one preload before the start,
/// then trims the remainder on the output side.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReencodeBuilder;

/// Re-encoding cut stage writing to `output`. Shared with the loop builder.
pub(crate) fn precise_cut_stage(job: &CutJob<'_>, output: &Path) -> StageSpec {
    let settings = job.settings;
    let duration = job.sequence.duration();
    let mut spec = StageSpec::new(StageKind::Cut, &settings.ffmpeg_path, duration);

    spec = match SeekPlan::for_start(job.sequence.start, settings.preload) {
        SeekPlan::Preloaded {
            input_seek,
            output_seek,
        } => spec
            .args(["-ss".to_string(), input_seek.to_string()])
            .args(["-i".to_string(), job.input()])
            .args(["-ss".to_string(), output_seek.to_string()]),
        SeekPlan::Direct { output_seek } => spec
            .args(["-i".to_string(), job.input()])
            .args(["-ss".to_string(), output_seek.to_string()]),
    };

    spec.args(["-t".to_string(), duration.to_string()])
        .args(["-c:v", settings.video_codec.as_str()])
        .args(["-c:a", settings.audio_codec.as_str()])
        .arg(output.to_string_lossy())
        .arg("-y")
}

impl ChainBuilder for ReencodeBuilder {
    fn method(&self) -> CutMethod {
        CutMethod::Precise
    }

    fn build(&self, job: &CutJob<'_>) -> ClipMarkResult<ChainPlan> {
        let output = job.output_path(None);
        let spec = precise_cut_stage(job, &output);
        Ok(ChainPlan {
            root: StageNode::leaf(spec),
            output,
            artifacts: Vec::new(),
        })
    }
}
