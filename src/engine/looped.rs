//! Loop export: precise cut, reverse, then concatenate forward/backward pairs

use std::path::Path;

use crate::domain::model::CutMethod;
use crate::engine::chain::{ChainPlan, ScratchFile, StageKind, StageNode, StageSpec};
use crate::engine::reencode::precise_cut_stage;
use crate::engine::{ChainBuilder, CutJob};
use crate::error::{ClipMarkError, ClipMarkResult};
use crate::utils::path::unique_path_with;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoopBuilder;

impl ChainBuilder for LoopBuilder {
    fn method(&self) -> CutMethod {
        CutMethod::Loop
    }

    fn build(&self, job: &CutJob<'_>) -> ClipMarkResult<ChainPlan> {
        let settings = job.settings;
        if settings.loop_count == 0 {
            return Err(ClipMarkError::ChainBuild {
                message: "loop count must be at least 1".to_string(),
            });
        }

        let cut = job.output_path(Some("cut"));
        let reversed = job.output_path(Some("rev"));
        let output = job.output_path(Some("loop"));
        let list = unique_path_with(&output.with_extension("txt"), |path| {
            path.exists() || job.reserved.contains(path)
        });

        let duration = job.sequence.duration();
        let cut_stage = precise_cut_stage(job, &cut);

        let reverse_stage = StageSpec::new(StageKind::Reverse, &settings.ffmpeg_path, duration)
            .args(["-i".to_string(), cut.to_string_lossy().into_owned()])
            .args(["-vf", "reverse", "-af", "areverse"])
            .arg(reversed.to_string_lossy())
            .arg("-y");

        let merged_duration = duration * (2.0 * f64::from(settings.loop_count));
        let merge_stage = StageSpec::new(StageKind::Merge, &settings.ffmpeg_path, merged_duration)
            .args(["-f", "concat", "-safe", "0"])
            .args(["-i".to_string(), list.to_string_lossy().into_owned()])
            .args(["-c", "copy"])
            .arg(output.to_string_lossy())
            .arg("-y")
            .with_scratch(ScratchFile {
                path: list.clone(),
                contents: concat_list(
                    list_entry(&cut, &list),
                    list_entry(&reversed, &list),
                    settings.loop_count,
                ),
            });

        let root = StageNode::leaf(cut_stage)
            .then(StageNode::leaf(reverse_stage).then(StageNode::leaf(merge_stage)));

        Ok(ChainPlan {
            root,
            output,
            artifacts: vec![cut, reversed, list],
        })
    }
}

/// `path` as the concat demuxer will resolve it from inside `list`'s folder
fn list_entry<'a>(path: &'a Path, list: &Path) -> &'a Path {
    list.parent()
        .and_then(|dir| path.strip_prefix(dir).ok())
        .unwrap_or(path)
}

/// Concat demuxer list with `loop_count` forward/backward pairs
pub fn concat_list(forward: &Path, backward: &Path, loop_count: u32) -> String {
    let forward = quote_concat_path(forward);
    let backward = quote_concat_path(backward);
    let mut list = String::new();
    for _ in 0..loop_count {
        list.push_str(&format!("file {}\nfile {}\n", forward, backward));
    }
    list
}

/// Single-quote a path for the concat demuxer; embedded quotes become `'\''`
fn quote_concat_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}
