//! Cut pipeline orchestration
//!
//! The orchestrator owns the sequence registry and every running chain. It
//! is driven from a single task: stage lifecycle events arrive on one
//! channel and are applied to the registry in [`Orchestrator::handle_event`].
//! Each chain holds an ownership token on its sequence's registry entry;
//! events from a chain whose token is gone (entry removed, registry cleared
//! or reset) still drive the chain's processes but never touch the registry.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::errors::DomainError;
use crate::domain::model::{ChainId, CutMethod, MediaLocator, OperationState, Sequence, SequenceState, Time};
use crate::domain::rules::MarkingPolicy;
use crate::engine::chain::{
    ChainPlan, StageControl, StageEvent, StageEventReceiver, StageEventSender, StageExit,
    StageNode, StageSpec, StageTicket,
};
use crate::engine::observer::{EventHub, PipelineEvent, StatusMessage};
use crate::engine::progress::parse_progress;
use crate::engine::{CutJob, CutScope, EncoderSettings, MethodTable};
use crate::error::ClipMarkResult;
use crate::ports::StageLauncher;
use crate::registry::SequenceRegistry;

struct FlatStage {
    spec: StageSpec,
    children: Vec<usize>,
}

struct ActiveChain {
    sequence: Sequence,
    stages: Vec<FlatStage>,
    running: HashMap<usize, StageControl>,
    output: PathBuf,
    artifacts: Vec<PathBuf>,
    failed: bool,
}

impl ActiveChain {
    fn new(sequence: Sequence, plan: ChainPlan) -> Self {
        let mut stages = Vec::with_capacity(plan.root.len());
        flatten(plan.root, &mut stages);
        Self {
            sequence,
            stages,
            running: HashMap::new(),
            output: plan.output,
            artifacts: plan.artifacts,
            failed: false,
        }
    }

    fn written_paths(&self) -> impl Iterator<Item = &PathBuf> + '_ {
        self.artifacts.iter().chain(std::iter::once(&self.output))
    }
}

/// Arena layout of a stage tree; the root lands at index 0
fn flatten(node: StageNode, stages: &mut Vec<FlatStage>) -> usize {
    let index = stages.len();
    stages.push(FlatStage {
        spec: node.spec,
        children: Vec::new(),
    });
    for child in node.children {
        let child_index = flatten(child, stages);
        stages[index].children.push(child_index);
    }
    index
}

pub struct Orchestrator {
    launcher: Arc<dyn StageLauncher>,
    methods: MethodTable,
    settings: EncoderSettings,
    registry: SequenceRegistry,
    hub: EventHub,
    chains: HashMap<ChainId, ActiveChain>,
    reserved: HashSet<PathBuf>,
    next_chain: u64,
    events_tx: StageEventSender,
    events_rx: StageEventReceiver,
}

impl Orchestrator {
    pub fn new(
        launcher: Arc<dyn StageLauncher>,
        settings: EncoderSettings,
        policy: MarkingPolicy,
        hub: EventHub,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            launcher,
            methods: MethodTable::default(),
            settings,
            registry: SequenceRegistry::new(policy),
            hub,
            chains: HashMap::new(),
            reserved: HashSet::new(),
            next_chain: 1,
            events_tx,
            events_rx,
        }
    }

    pub fn registry(&self) -> &SequenceRegistry {
        &self.registry
    }

    /// Direct registry access for user edits (mark, select, ...). Callers
    /// publish the change with [`Orchestrator::publish_sequences`].
    pub fn registry_mut(&mut self) -> &mut SequenceRegistry {
        &mut self.registry
    }

    pub fn methods_mut(&mut self) -> &mut MethodTable {
        &mut self.methods
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Chains with at least one stage still running
    pub fn active_chains(&self) -> usize {
        self.chains.len()
    }

    pub fn is_idle(&self) -> bool {
        self.chains.is_empty()
    }

    /// Chain currently cutting `sequence`
    pub fn chain_for(&self, sequence: &Sequence) -> Option<ChainId> {
        self.registry.get(sequence).and_then(SequenceState::owner)
    }

    pub fn publish_sequences(&self) {
        self.hub.publish(PipelineEvent::SequencesChanged {
            sequences: self.registry.snapshot(),
        });
    }

    fn status(&self, message: StatusMessage) {
        self.hub.status(message);
    }

    /// Start one chain per eligible sequence in `scope`.
    ///
    /// Sequences that are not `Ready` (or already being cut) are skipped.
    /// A sequence whose chain cannot be built is marked `Failed`; the
    /// others still start. Only an unknown method or an output directory
    /// that cannot be created is an error.
    pub fn cut(
        &mut self,
        method: CutMethod,
        scope: CutScope,
        source: &MediaLocator,
        output_dir: &Path,
    ) -> ClipMarkResult<Vec<ChainId>> {
        if self.methods.get(method).is_none() {
            return Err(DomainError::UnknownCutMethod(method.name().to_string()).into());
        }

        let targets = self.targets(scope);
        if targets.is_empty() {
            debug!("nothing to cut for {:?}", scope);
            return Ok(Vec::new());
        }
        if source.is_empty() {
            return Err(DomainError::BadArgs("no video loaded".to_string()).into());
        }
        std::fs::create_dir_all(output_dir)?;

        let mut started = Vec::with_capacity(targets.len());
        for sequence in targets {
            let plan = {
                let builder = match self.methods.get(method) {
                    Some(builder) => builder,
                    None => break,
                };
                builder.build(&CutJob {
                    source,
                    sequence,
                    output_dir,
                    settings: &self.settings,
                    reserved: &self.reserved,
                })
            };

            let plan = match plan {
                Ok(plan) => plan,
                Err(e) => {
                    warn!("cannot build {} chain for {}: {}", method, sequence, e);
                    self.registry.set_state(&sequence, OperationState::Failed);
                    self.status(StatusMessage::error(format!(
                        "{} cut of {} failed: {}",
                        method, sequence, e
                    )));
                    continue;
                }
            };

            let id = ChainId(self.next_chain);
            self.next_chain += 1;
            if !self.registry.claim(&sequence, id) {
                continue;
            }

            info!(
                "{}: {} cut of {} from {} -> {}",
                id,
                method,
                sequence,
                source,
                plan.output.display()
            );
            self.reserved.extend(plan.written_paths().cloned());
            self.chains.insert(id, ActiveChain::new(sequence, plan));
            self.launch(id, 0);
            started.push(id);
        }

        self.publish_sequences();
        Ok(started)
    }

    fn targets(&self, scope: CutScope) -> Vec<Sequence> {
        let eligible = |sequence: &Sequence| {
            self.registry
                .get(sequence)
                .map(|state| state.state == OperationState::Ready && state.owner().is_none())
                .unwrap_or(false)
        };
        match scope {
            CutScope::AllReady => self.registry.ready(),
            CutScope::Selected => self
                .registry
                .selected()
                .map(|(sequence, _)| *sequence)
                .filter(eligible)
                .into_iter()
                .collect(),
            CutScope::Only(sequence) => {
                if eligible(&sequence) {
                    vec![sequence]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn launch(&mut self, chain: ChainId, stage: usize) {
        let ticket = StageTicket { chain, stage };
        let Some(active) = self.chains.get_mut(&chain) else {
            return;
        };
        let Some(flat) = active.stages.get(stage) else {
            return;
        };
        debug!("{}: launching {}", ticket, flat.spec.command_line());
        let control = self.launcher.launch(ticket, &flat.spec, self.events_tx.clone());
        active.running.insert(stage, control);
    }

    /// Apply one stage lifecycle event
    pub fn handle_event(&mut self, event: StageEvent) {
        let ticket = event.ticket();
        let (sequence, kind, target) = match self.chains.get(&ticket.chain) {
            Some(active) => match active.stages.get(ticket.stage) {
                Some(flat) => (active.sequence, flat.spec.kind, flat.spec.target_duration),
                None => return,
            },
            None => {
                debug!("{}: event for a finished chain ignored", ticket);
                return;
            }
        };
        let owned = self.registry.is_owned_by(&sequence, ticket.chain);

        match event {
            StageEvent::Started { .. } => {
                self.status(StatusMessage::info(format!("{} started for {}", kind, sequence)));
                if owned {
                    self.registry.set_state(&sequence, OperationState::Processing);
                    self.registry.set_progress(&sequence, Time::ZERO);
                    self.publish_sequences();
                }
            }
            StageEvent::Output { chunk, .. } => {
                if !owned {
                    return;
                }
                if let Some(elapsed) = parse_progress(&chunk, target) {
                    self.registry.set_progress(&sequence, elapsed);
                    self.publish_sequences();
                }
            }
            StageEvent::Finished { exit, .. } => self.stage_finished(ticket, sequence, owned, exit),
        }
    }

    fn stage_finished(&mut self, ticket: StageTicket, sequence: Sequence, owned: bool, exit: StageExit) {
        let Some(active) = self.chains.get_mut(&ticket.chain) else {
            return;
        };
        active.running.remove(&ticket.stage);
        let kind = active.stages[ticket.stage].spec.kind;

        let mut next = Vec::new();
        if exit.is_success() {
            if !active.failed {
                next = active.stages[ticket.stage].children.clone();
            }
            self.status(StatusMessage::info(format!("{} finished for {}", kind, sequence)));
        } else {
            active.failed = true;
            warn!("{}: {} failed for {}: {}", ticket, kind, sequence, exit);
            self.status(StatusMessage::error(format!(
                "{} failed for {}: {}",
                kind, sequence, exit
            )));
            if owned {
                self.registry.set_state(&sequence, OperationState::Failed);
                self.publish_sequences();
            }
        }

        for child in next {
            self.launch(ticket.chain, child);
        }

        let finished = self
            .chains
            .get(&ticket.chain)
            .map(|active| active.running.is_empty())
            .unwrap_or(false);
        if finished {
            self.complete_chain(ticket.chain);
        }
    }

    fn complete_chain(&mut self, id: ChainId) {
        let Some(active) = self.chains.remove(&id) else {
            return;
        };
        for path in active.written_paths() {
            self.reserved.remove(path);
        }
        let sequence = active.sequence;
        let owned = self.registry.is_owned_by(&sequence, id);

        if !active.failed {
            for artifact in &active.artifacts {
                remove_artifact(artifact);
            }
            info!("{}: exported {}", id, active.output.display());
            self.status(StatusMessage::info(format!(
                "{} exported to {}",
                sequence,
                active.output.display()
            )));
            if owned {
                self.registry.set_output_path(&sequence, active.output.clone());
                self.registry.set_state(&sequence, OperationState::Succeeded);
            }
        }

        if owned {
            self.registry.release(&sequence, id);
            self.publish_sequences();
        }
    }

    /// Stop the chain cutting `sequence` and mark the sequence `Failed`.
    /// Returns false when nothing was running for it.
    pub fn cancel(&mut self, sequence: &Sequence) -> bool {
        if !self.stop_chain_of(sequence) {
            return false;
        }
        self.registry.set_state(sequence, OperationState::Failed);
        self.status(StatusMessage::warning(format!("cut of {} cancelled", sequence)));
        self.publish_sequences();
        true
    }

    /// Cancel every chain, including ones whose sequence is gone
    pub fn cancel_all(&mut self) -> usize {
        let ids: Vec<ChainId> = self.chains.keys().copied().collect();
        let count = ids.len();
        for id in ids {
            if let Some(active) = self.drop_chain(id) {
                let sequence = active.sequence;
                if self.registry.release(&sequence, id) {
                    self.registry.set_state(&sequence, OperationState::Failed);
                }
            }
        }
        if count > 0 {
            self.status(StatusMessage::warning(format!("{} cut(s) cancelled", count)));
            self.publish_sequences();
        }
        count
    }

    /// Cancel everything, then force every sequence back to `Ready`
    pub fn reset_all(&mut self) {
        self.cancel_all();
        self.registry.reset();
        self.publish_sequences();
    }

    /// Delete a sequence, stopping its chain first
    pub fn remove(&mut self, sequence: &Sequence) -> Option<SequenceState> {
        self.stop_chain_of(sequence);
        let removed = self.registry.remove(sequence);
        if removed.is_some() {
            self.publish_sequences();
        }
        removed
    }

    /// Drop every sequence (video switch). Running chains keep exporting
    /// but no longer report into the registry.
    pub fn clear_sequences(&mut self) {
        self.registry.clear();
        self.publish_sequences();
    }

    fn stop_chain_of(&mut self, sequence: &Sequence) -> bool {
        let Some(id) = self.chain_for(sequence) else {
            return false;
        };
        self.drop_chain(id);
        self.registry.release(sequence, id);
        true
    }

    fn drop_chain(&mut self, id: ChainId) -> Option<ActiveChain> {
        let mut active = self.chains.remove(&id)?;
        for (stage, control) in active.running.drain() {
            debug!("{}: stopping stage#{}", id, stage);
            control.cancel();
        }
        for path in active.written_paths() {
            self.reserved.remove(path);
        }
        Some(active)
    }

    /// Apply events already queued, without waiting
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for and apply the next stage event
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Drive events until every chain has finished
    pub async fn run_until_idle(&mut self) {
        while !self.chains.is_empty() {
            if !self.next_event().await {
                break;
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for (_, mut active) in self.chains.drain() {
            for (_, control) in active.running.drain() {
                control.cancel();
            }
        }
    }
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("cannot remove {}: {}", path.display(), e),
    }
}
