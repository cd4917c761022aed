//! Stream copy cut

use crate::domain::model::CutMethod;
use crate::engine::chain::{ChainPlan, StageKind, StageNode, StageSpec};
use crate::engine::{ChainBuilder, CutJob};
use crate::error::ClipMarkResult;

/// Single stage, no re-encode. Accuracy is bounded by the source's keyframes.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamCopyBuilder;

impl ChainBuilder for StreamCopyBuilder {
    fn method(&self) -> CutMethod {
        CutMethod::Fast
    }

    fn build(&self, job: &CutJob<'_>) -> ClipMarkResult<ChainPlan> {
        let output = job.output_path(None);
        let duration = job.sequence.duration();

        let spec = StageSpec::new(StageKind::Cut, &job.settings.ffmpeg_path, duration)
            .args(["-ss".to_string(), job.sequence.start.to_string()])
            .args(["-i".to_string(), job.input()])
            .args(["-t".to_string(), duration.to_string()])
            .args(["-async", "1", "-vcodec", "copy", "-acodec", "copy"])
            .args(["-avoid_negative_ts", "1"])
            .arg(output.to_string_lossy())
            .arg("-y");

        Ok(ChainPlan {
            root: StageNode::leaf(spec),
            output,
            artifacts: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MediaLocator, Sequence, Time};
    use crate::engine::EncoderSettings;
    use std::collections::HashSet;

    #[test]
    fn test_fast_cut_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let source = MediaLocator::new("/videos/talk.mp4");
        let settings = EncoderSettings::default();
        let reserved = HashSet::new();
        let job = CutJob {
            source: &source,
            sequence: Sequence::new(Time::from_secs(10), Time::from_ms(15_500)).unwrap(),
            output_dir: dir.path(),
            settings: &settings,
            reserved: &reserved,
        };

        let plan = StreamCopyBuilder.build(&job).unwrap();
        let output = dir.path().join("talk.00.00.10.5.mp4");
        assert_eq!(plan.output, output);
        assert_eq!(plan.root.len(), 1);
        assert!(plan.artifacts.is_empty());

        let spec = &plan.root.spec;
        assert_eq!(spec.kind, StageKind::Cut);
        assert_eq!(spec.target_duration, Time::from_ms(5500));
        let output = output.to_string_lossy().into_owned();
        assert_eq!(
            spec.args,
            vec![
                "-ss", "00:00:10.000", "-i", "/videos/talk.mp4", "-t", "00:00:05.500", "-async",
                "1", "-vcodec", "copy", "-acodec", "copy", "-avoid_negative_ts", "1",
                output.as_str(), "-y",
            ]
        );
    }
}
