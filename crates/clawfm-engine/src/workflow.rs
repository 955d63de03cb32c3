//! Simulated tool-call sequence run once per track selection.
//!
//! Each sequence walks `Searching → Injecting → Resolving → Executing →
//! Playing`, one stage per timer tick, narrating into the log as it goes.
//! Sequences are tagged with a generation; a tick carrying any other
//! generation belongs to a cancelled sequence and is dropped.

use std::time::Duration;

use clawfm_proto::config::WorkflowConfig;
use clawfm_proto::protocol::{LogKind, Track, WorkflowStage, WorkflowView};
use rand::Rng;
use tracing::debug;

use crate::log::{LogDraft, AUTHOR_AGENT, AUTHOR_TOOL};

const LIBRARY_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const LIBRARY_ID_LEN: usize = 6;
const CATALOG_ID_MAX: u64 = 1_000_000_000;

/// How long each stage lingers before the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowTiming {
    pub search: Duration,
    pub inject: Duration,
    pub resolve: Duration,
    pub execute: Duration,
}

impl Default for WorkflowTiming {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

impl WorkflowTiming {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            search: Duration::from_millis(config.search_delay_ms),
            inject: Duration::from_millis(config.inject_delay_ms),
            resolve: Duration::from_millis(config.resolve_delay_ms),
            execute: Duration::from_millis(config.execute_delay_ms),
        }
    }

    /// Delay spent in `stage` before advancing, `None` for stages that
    /// never advance on a timer.
    pub fn dwell(&self, stage: WorkflowStage) -> Option<Duration> {
        match stage {
            WorkflowStage::Searching => Some(self.search),
            WorkflowStage::Injecting => Some(self.inject),
            WorkflowStage::Resolving => Some(self.resolve),
            WorkflowStage::Executing => Some(self.execute),
            WorkflowStage::Idle | WorkflowStage::Playing => None,
        }
    }
}

/// Identifiers fabricated by one sequence.  Recreated for every sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowContext {
    pub catalog_id: Option<u64>,
    pub library_id: Option<String>,
    pub compiled_command: Option<String>,
}

/// What a stage transition produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStep {
    pub entry: LogDraft,
    /// When to tick again.  `None` once the sequence is terminal.
    pub next_delay: Option<Duration>,
    /// The sequence reached `Playing` and wants audio started.
    pub start_playback: bool,
}

#[derive(Debug, Default)]
pub struct WorkflowMachine {
    generation: u64,
    stage: WorkflowStage,
    context: WorkflowContext,
}

impl WorkflowMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Abandon any running sequence.  Pending ticks become stale.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.stage = WorkflowStage::Idle;
        self.context = WorkflowContext::default();
    }

    /// Cancel whatever is running and open a new sequence for `track`.
    pub fn begin(&mut self, track: &Track, timing: &WorkflowTiming) -> StageStep {
        self.cancel();
        self.stage = WorkflowStage::Searching;
        debug!(
            "Workflow: generation {} started for \"{}\"",
            self.generation, track.title
        );
        StageStep {
            entry: LogDraft::new(
                AUTHOR_AGENT,
                LogKind::Agent,
                format!(
                    "Curation logic selected: \"{}\" by {}. Initiating MCP workflow.",
                    track.title, track.artist
                ),
            ),
            next_delay: timing.dwell(WorkflowStage::Searching),
            start_playback: false,
        }
    }

    /// A stage timer fired.  Returns `None` for ticks from a superseded
    /// generation or when the sequence has nowhere left to go.
    pub fn on_due<R: Rng + ?Sized>(
        &mut self,
        generation: u64,
        rng: &mut R,
        timing: &WorkflowTiming,
    ) -> Option<StageStep> {
        if generation != self.generation {
            debug!(
                "Workflow: dropping tick for generation {} (current {})",
                generation, self.generation
            );
            return None;
        }
        let Some(next) = self.stage.next() else {
            debug!("Workflow: tick in terminal stage {:?}", self.stage);
            return None;
        };

        let entry = match next {
            WorkflowStage::Injecting => {
                let id = rng.gen_range(1..CATALOG_ID_MAX);
                self.context.catalog_id = Some(id);
                LogDraft::new(
                    AUTHOR_TOOL,
                    LogKind::Tool,
                    format!("[Library-First Constraint] Searching catalog... Found Catalog_ID: {id}"),
                )
            }
            WorkflowStage::Resolving => LogDraft::new(
                AUTHOR_TOOL,
                LogKind::System,
                format!(
                    "Injecting Catalog_ID {} into User Library via POST /v1/me/library...",
                    self.catalog_label()
                ),
            ),
            WorkflowStage::Executing => {
                let id = library_id(rng);
                let content =
                    format!("Added to User Library. Resolved persistent Database_ID: {id}");
                self.context.compiled_command = Some(compile_command(&id));
                self.context.library_id = Some(id);
                LogDraft::new(AUTHOR_TOOL, LogKind::Tool, content)
            }
            WorkflowStage::Playing => LogDraft::new(
                AUTHOR_TOOL,
                LogKind::Success,
                format!(
                    "Executed AppleScript playback via macOS bridge: {}. AirPlay active.",
                    self.context.compiled_command.as_deref().unwrap_or_default()
                ),
            ),
            WorkflowStage::Idle | WorkflowStage::Searching => return None,
        };

        self.stage = next;
        Some(StageStep {
            entry,
            next_delay: timing.dwell(next),
            start_playback: next == WorkflowStage::Playing,
        })
    }

    fn catalog_label(&self) -> String {
        self.context
            .catalog_id
            .map(|id| id.to_string())
            .unwrap_or_default()
    }

    /// Human-readable line for the current stage.
    pub fn action(&self) -> String {
        match self.stage {
            WorkflowStage::Idle => "IDLE".to_string(),
            WorkflowStage::Searching => "GET /v1/catalog/us/search...".to_string(),
            WorkflowStage::Injecting => {
                format!("POST /v1/me/library (ids: {})", self.catalog_label())
            }
            WorkflowStage::Resolving => {
                format!("GET /v1/catalog/us/songs/{}/library", self.catalog_label())
            }
            WorkflowStage::Executing => self.context.compiled_command.clone().unwrap_or_default(),
            WorkflowStage::Playing => "PLAYING".to_string(),
        }
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            stage: self.stage,
            generation: self.generation,
            catalog_id: self.context.catalog_id,
            library_id: self.context.library_id.clone(),
            compiled_command: self.context.compiled_command.clone(),
            action: self.action(),
        }
    }
}

fn library_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let token: String = (0..LIBRARY_ID_LEN)
        .map(|_| LIBRARY_ID_CHARSET[rng.gen_range(0..LIBRARY_ID_CHARSET.len())] as char)
        .collect();
    format!("i.{token}")
}

fn compile_command(library_id: &str) -> String {
    format!("osascript -e 'tell application \"Music\" to play track id \"{library_id}\"'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;

    fn track(title: &str) -> Track {
        Track {
            title: title.to_string(),
            artist: "Stellardrone".to_string(),
            genre: "AMBIENT".to_string(),
            url: "https://audio.test/a.mp3".to_string(),
            frequency: "88.4 Hz".to_string(),
            is_agent: false,
        }
    }

    fn run_to_end(machine: &mut WorkflowMachine, rng: &mut StdRng) -> Vec<StageStep> {
        let timing = WorkflowTiming::default();
        let mut steps = vec![machine.begin(&track("Airglow"), &timing)];
        let generation = machine.generation();
        while let Some(step) = machine.on_due(generation, rng, &timing) {
            steps.push(step);
        }
        steps
    }

    #[test]
    fn test_full_sequence_order_and_wording() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut machine = WorkflowMachine::new();
        let steps = run_to_end(&mut machine, &mut rng);

        let kinds: Vec<LogKind> = steps.iter().map(|s| s.entry.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LogKind::Agent,
                LogKind::Tool,
                LogKind::System,
                LogKind::Tool,
                LogKind::Success
            ]
        );
        assert_eq!(
            steps[0].entry.content,
            "Curation logic selected: \"Airglow\" by Stellardrone. Initiating MCP workflow."
        );

        let catalog = Regex::new(r"Found Catalog_ID: (\d+)$").unwrap();
        let caps = catalog.captures(&steps[1].entry.content).unwrap();
        let id: u64 = caps[1].parse().unwrap();
        assert!((1..CATALOG_ID_MAX).contains(&id));
        assert!(steps[2].entry.content.contains(&format!("Catalog_ID {id} ")));

        let resolved = Regex::new(r"Database_ID: i\.[A-Z0-9]{6}$").unwrap();
        assert!(resolved.is_match(&steps[3].entry.content));

        let lib = machine.context().library_id.clone().unwrap();
        assert!(steps[4].entry.content.contains(&format!(
            "osascript -e 'tell application \"Music\" to play track id \"{lib}\"'"
        )));

        assert_eq!(machine.stage(), WorkflowStage::Playing);
        assert!(steps[4].start_playback);
        assert_eq!(steps[4].next_delay, None);
        assert!(steps[..4].iter().all(|s| !s.start_playback));
    }

    #[test]
    fn test_delays_follow_stage() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut machine = WorkflowMachine::new();
        let steps = run_to_end(&mut machine, &mut rng);
        let delays: Vec<Option<u64>> = steps
            .iter()
            .map(|s| s.next_delay.map(|d| d.as_millis() as u64))
            .collect();
        assert_eq!(
            delays,
            vec![Some(1000), Some(1200), Some(1500), Some(1500), None]
        );
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let timing = WorkflowTiming::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut machine = WorkflowMachine::new();
        machine.begin(&track("A"), &timing);
        let old = machine.generation();
        machine.on_due(old, &mut rng, &timing);

        machine.begin(&track("B"), &timing);
        assert_eq!(machine.context(), &WorkflowContext::default());
        assert_eq!(machine.on_due(old, &mut rng, &timing), None);
        assert_eq!(machine.stage(), WorkflowStage::Searching);
    }

    #[test]
    fn test_terminal_stage_ignores_ticks() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut machine = WorkflowMachine::new();
        run_to_end(&mut machine, &mut rng);
        let generation = machine.generation();
        assert_eq!(
            machine.on_due(generation, &mut rng, &WorkflowTiming::default()),
            None
        );
        assert_eq!(machine.stage(), WorkflowStage::Playing);
    }

    #[test]
    fn test_action_descriptor_tracks_stage() {
        let timing = WorkflowTiming::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut machine = WorkflowMachine::new();
        assert_eq!(machine.action(), "IDLE");
        machine.begin(&track("A"), &timing);
        assert_eq!(machine.action(), "GET /v1/catalog/us/search...");
        let generation = machine.generation();
        machine.on_due(generation, &mut rng, &timing);
        let id = machine.context().catalog_id.unwrap();
        assert_eq!(machine.action(), format!("POST /v1/me/library (ids: {id})"));
        machine.on_due(generation, &mut rng, &timing);
        assert_eq!(
            machine.action(),
            format!("GET /v1/catalog/us/songs/{id}/library")
        );
        machine.on_due(generation, &mut rng, &timing);
        assert!(machine.action().starts_with("osascript -e"));
        machine.on_due(generation, &mut rng, &timing);
        assert_eq!(machine.action(), "PLAYING");
        assert_eq!(machine.view().stage, WorkflowStage::Playing);
    }

    #[test]
    fn test_same_seed_same_identifiers() {
        let mut a = WorkflowMachine::new();
        let mut b = WorkflowMachine::new();
        run_to_end(&mut a, &mut StdRng::seed_from_u64(99));
        run_to_end(&mut b, &mut StdRng::seed_from_u64(99));
        assert_eq!(a.context(), b.context());
    }
}
