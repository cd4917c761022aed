use std::sync::Arc;

use crate::adapters::{FfmpegLauncher, PlaylistFileReader, TomlConfigAdapter, TracingObserver};
use crate::adapters::toml_config::AppConfig;
use crate::app::session::CutSession;
use crate::engine::observer::{EventHub, EventObserver};
use crate::engine::orchestrator::Orchestrator;
use crate::error::ClipMarkResult;
use crate::ports::{PlaylistSource, StageLauncher};

/// Wires adapters into application services
pub trait AppContainer {
    fn config(&self) -> &AppConfig;
    fn hub(&self) -> &EventHub;
    fn playlist_source(&self) -> Arc<dyn PlaylistSource>;
    fn cut_session(&self) -> CutSession;
}

pub struct DefaultAppContainer {
    config: AppConfig,
    hub: EventHub,
    launcher: Arc<dyn StageLauncher>,
    playlist_source: Arc<dyn PlaylistSource>,
}

impl DefaultAppContainer {
    /// Validate `config` and build the production adapters. Every event is
    /// mirrored into tracing; `observers` receive them as well.
    pub fn new(config: AppConfig, observers: Vec<Arc<dyn EventObserver>>) -> ClipMarkResult<Self> {
        config.validate()?;

        let hub = EventHub::new();
        hub.subscribe(Arc::new(TracingObserver::new()));
        for observer in observers {
            hub.subscribe(observer);
        }

        let settings = config.encoder_settings();
        let launcher = Arc::new(FfmpegLauncher::with_timeout(settings.stage_timeout));

        Ok(Self {
            config,
            hub,
            launcher,
            playlist_source: Arc::new(PlaylistFileReader::new()),
        })
    }

    /// Build from an already resolved adapter
    pub fn from_adapter(
        adapter: TomlConfigAdapter,
        observers: Vec<Arc<dyn EventObserver>>,
    ) -> ClipMarkResult<Self> {
        Self::new(adapter.into_config(), observers)
    }

    /// Replace the stage launcher (tests, embedding)
    pub fn with_launcher(mut self, launcher: Arc<dyn StageLauncher>) -> Self {
        self.launcher = launcher;
        self
    }
}

impl AppContainer for DefaultAppContainer {
    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn hub(&self) -> &EventHub {
        &self.hub
    }

    fn playlist_source(&self) -> Arc<dyn PlaylistSource> {
        Arc::clone(&self.playlist_source)
    }

    fn cut_session(&self) -> CutSession {
        let orchestrator = Orchestrator::new(
            Arc::clone(&self.launcher),
            self.config.encoder_settings(),
            self.config.marking_policy(),
            self.hub.clone(),
        );
        CutSession::new(orchestrator, self.config.output.directory.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.encoder.loop_count = 0;
        assert!(DefaultAppContainer::new(config, Vec::new()).is_err());
    }

    #[test]
    fn test_session_uses_configured_output_dir() {
        let mut config = AppConfig::default();
        config.output.directory = Some("/exports".into());
        let container = DefaultAppContainer::new(config, Vec::new()).unwrap();
        let session = container.cut_session();
        assert_eq!(
            session.output_dir_for(&crate::domain::model::MediaLocator::new("/v/a.mp4")),
            std::path::PathBuf::from("/exports")
        );
    }
}
