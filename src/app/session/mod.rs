// Cut session - One playlist, one loaded video, its marked sequences

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::model::*;
use crate::engine::observer::{PipelineEvent, StatusMessage};
use crate::engine::orchestrator::Orchestrator;
use crate::engine::CutScope;
use crate::error::ClipMarkResult;
use crate::playlist::Playlist;
use crate::registry::{MarkOutcome, SequenceRegistry};

/// Ties playlist navigation to the cut pipeline.
///
/// The registry always describes the current video: any navigation that
/// changes the current video clears it.
pub struct CutSession {
    playlist: Playlist,
    orchestrator: Orchestrator,
    output_dir: Option<PathBuf>,
}

impl CutSession {
    /// `output_dir` overrides the default of exporting next to the source
    pub fn new(orchestrator: Orchestrator, output_dir: Option<PathBuf>) -> Self {
        Self {
            playlist: Playlist::default(),
            orchestrator,
            output_dir,
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn registry(&self) -> &SequenceRegistry {
        self.orchestrator.registry()
    }

    pub fn current_video(&self) -> Option<&MediaLocator> {
        self.playlist.current()
    }

    pub fn snapshot(&self) -> Vec<SequenceSnapshot> {
        self.orchestrator.registry().snapshot()
    }

    /// Replace the playlist
    pub fn load(&mut self, items: Vec<MediaLocator>) {
        info!("Loading playlist with {} items", items.len());
        let previous = self.current_video().cloned();
        self.playlist = Playlist::new(items);
        self.after_reindex(previous, true);
    }

    pub fn set_filter(&mut self, pattern: &str, preserve_order: bool) {
        let previous = self.current_video().cloned();
        self.playlist.set_filter(pattern, preserve_order);
        self.after_reindex(previous, false);
    }

    pub fn set_order(&mut self, randomize: bool, keep_current: bool) {
        let previous = self.current_video().cloned();
        self.playlist.set_order(randomize, keep_current);
        self.after_reindex(previous, false);
    }

    pub fn next(&mut self) -> bool {
        let previous = self.current_video().cloned();
        let moved = self.playlist.next();
        if moved {
            self.after_reindex(previous, false);
        }
        moved
    }

    pub fn previous(&mut self) -> bool {
        let previous = self.current_video().cloned();
        let moved = self.playlist.previous();
        if moved {
            self.after_reindex(previous, false);
        }
        moved
    }

    /// Jump to a playback position
    pub fn select_video(&mut self, position: usize) -> bool {
        let previous = self.current_video().cloned();
        let moved = self.playlist.set_current(position);
        if moved {
            self.after_reindex(previous, false);
        }
        moved
    }

    fn after_reindex(&mut self, previous: Option<MediaLocator>, force_clear: bool) {
        let current = self.current_video().cloned();
        if force_clear || current != previous {
            debug!(
                "Current video changed to {}",
                current.as_ref().map(MediaLocator::as_str).unwrap_or("-")
            );
            self.orchestrator.clear_sequences();
        }
        self.orchestrator.hub().publish(PipelineEvent::VideoListChanged {
            total: self.playlist.total_len(),
            visible: self.playlist.len(),
            current: current.map(|c| c.as_str().to_string()),
        });
    }

    /// Two-step mark at `position` in the current video
    pub fn mark(&mut self, position: Time) -> MarkOutcome {
        if self.current_video().is_none() {
            return MarkOutcome::Discarded;
        }
        let outcome = self.orchestrator.registry_mut().mark(position);
        if let MarkOutcome::Finalized(_) = outcome {
            self.orchestrator.publish_sequences();
        }
        outcome
    }

    pub fn cancel_mark(&mut self) -> bool {
        self.orchestrator.registry_mut().cancel_mark()
    }

    pub fn select(&mut self, sequence: Option<Sequence>) -> bool {
        let changed = self.orchestrator.registry_mut().select(sequence);
        if changed {
            self.orchestrator.publish_sequences();
        }
        changed
    }

    /// Delete a sequence, stopping its cut first
    pub fn remove(&mut self, sequence: &Sequence) -> bool {
        self.orchestrator.remove(sequence).is_some()
    }

    /// Cancel running cuts and put every sequence back to `Ready`
    pub fn reset(&mut self) {
        self.orchestrator.reset_all();
    }

    /// Folder exports of `source` are written to
    pub fn output_dir_for(&self, source: &MediaLocator) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        source
            .local_path()
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Cut the sequences in `scope` out of the current video
    pub fn cut(&mut self, method: CutMethod, scope: CutScope) -> ClipMarkResult<Vec<ChainId>> {
        let Some(source) = self.current_video().cloned() else {
            self.orchestrator
                .hub()
                .status(StatusMessage::warning("no video loaded"));
            return Ok(Vec::new());
        };
        let output_dir = self.output_dir_for(&source);
        self.orchestrator.cut(method, scope, &source, &output_dir)
    }

    pub fn cancel(&mut self, sequence: &Sequence) -> bool {
        self.orchestrator.cancel(sequence)
    }

    pub async fn run_until_idle(&mut self) {
        self.orchestrator.run_until_idle().await;
    }

    /// Check, at the point of use, whether a sequence's export still exists
    pub fn output_status(&self, sequence: &Sequence) -> StatusMessage {
        let message = match self.registry().get(sequence) {
            None => StatusMessage::warning(format!("{} is not marked", sequence)),
            Some(state) => match &state.output_path {
                None => StatusMessage::info(format!("{} has not been exported", sequence)),
                Some(path) if path.exists() => {
                    StatusMessage::info(format!("{} exported to {}", sequence, path.display()))
                }
                Some(path) => StatusMessage::warning(format!(
                    "export of {} is missing: {}",
                    sequence,
                    path.display()
                )),
            },
        };
        self.orchestrator.hub().status(message.clone());
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::MarkingPolicy;
    use crate::engine::chain::{StageControl, StageEventSender, StageSpec, StageTicket};
    use crate::engine::observer::{CollectingObserver, EventHub};
    use crate::engine::EncoderSettings;
    use crate::ports::StageLauncher;
    use std::sync::Arc;

    struct Idle;

    impl StageLauncher for Idle {
        fn launch(&self, _ticket: StageTicket, _spec: &StageSpec, _events: StageEventSender) -> StageControl {
            StageControl::detached()
        }
    }

    fn session() -> (CutSession, Arc<CollectingObserver>) {
        let hub = EventHub::new();
        let collector = CollectingObserver::new();
        hub.subscribe(collector.clone());
        let orchestrator = Orchestrator::new(
            Arc::new(Idle),
            EncoderSettings::default(),
            MarkingPolicy::default(),
            hub,
        );
        (CutSession::new(orchestrator, None), collector)
    }

    fn videos() -> Vec<MediaLocator> {
        ["/v/a.mp4", "/v/b.mp4", "/v/c.mp4"]
            .into_iter()
            .map(MediaLocator::new)
            .collect()
    }

    #[test]
    fn test_mark_requires_a_video() {
        let (mut session, _) = session();
        assert_eq!(session.mark(Time::from_secs(1)), MarkOutcome::Discarded);
    }

    #[test]
    fn test_two_step_mark() {
        let (mut session, collector) = session();
        session.load(videos());
        assert_eq!(
            session.mark(Time::from_secs(1)),
            MarkOutcome::Started(Time::from_secs(1))
        );
        let outcome = session.mark(Time::from_secs(3));
        let sequence = Sequence::new(Time::from_secs(1), Time::from_secs(3)).unwrap();
        assert_eq!(outcome, MarkOutcome::Finalized(sequence));
        assert_eq!(collector.last_snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_video_switch_clears_sequences() {
        let (mut session, _) = session();
        session.load(videos());
        session.mark(Time::from_secs(1));
        session.mark(Time::from_secs(2));
        assert_eq!(session.snapshot().len(), 1);

        assert!(session.next());
        assert!(session.snapshot().is_empty());
        assert_eq!(session.current_video().unwrap().as_str(), "/v/b.mp4");
    }

    #[test]
    fn test_filter_keeping_current_video_keeps_sequences() {
        let (mut session, _) = session();
        session.load(videos());
        session.mark(Time::from_secs(1));
        session.mark(Time::from_secs(2));

        session.set_filter("a", false);
        assert_eq!(session.snapshot().len(), 1);

        session.set_filter("c", false);
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn test_output_dir_defaults_to_source_folder() {
        let (session, _) = session();
        assert_eq!(
            session.output_dir_for(&MediaLocator::new("/v/a.mp4")),
            PathBuf::from("/v")
        );
        assert_eq!(
            session.output_dir_for(&MediaLocator::new("a.mp4")),
            PathBuf::from(".")
        );
    }

    #[test]
    fn test_output_status_is_lazy() {
        let (mut session, collector) = session();
        session.load(videos());
        let sequence = Sequence::new(Time::ZERO, Time::from_secs(1)).unwrap();
        assert_eq!(
            session.output_status(&sequence).level,
            crate::engine::observer::StatusLevel::Warning
        );

        session.orchestrator_mut().registry_mut().insert(sequence);
        let dir = tempfile::tempdir().unwrap();
        let exported = dir.path().join("x.mp4");
        session
            .orchestrator_mut()
            .registry_mut()
            .set_output_path(&sequence, exported.clone());
        assert_eq!(
            session.output_status(&sequence).level,
            crate::engine::observer::StatusLevel::Warning
        );

        std::fs::write(&exported, b"x").unwrap();
        assert_eq!(
            session.output_status(&sequence).level,
            crate::engine::observer::StatusLevel::Info
        );
        assert_eq!(collector.statuses().len(), 3);
    }
}
