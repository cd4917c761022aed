// Ports - Interface definitions (contracts)

use std::path::Path;

use crate::domain::model::*;
use crate::engine::chain::{StageControl, StageEventSender, StageSpec, StageTicket};
use crate::error::ClipMarkResult;

/// Port for starting external stage processes.
///
/// `launch` must not block: it starts the stage in the background and
/// returns at once. Every launch eventually reports exactly one
/// `StageEvent::Finished` for its ticket on `events`, preceded by
/// `Started` when the process actually spawned. Cancelling or dropping the
/// returned control stops the process.
pub trait StageLauncher: Send + Sync {
    fn launch(&self, ticket: StageTicket, spec: &StageSpec, events: StageEventSender) -> StageControl;
}

/// Port for turning a playlist source (list file, folder, single file)
/// into media locators
pub trait PlaylistSource: Send + Sync {
    fn read(&self, source: &Path) -> ClipMarkResult<Vec<MediaLocator>>;
}
