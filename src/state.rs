//! Pipeline state owned by the controller task.
//!
//! Every scheduled run request bumps a monotonically increasing generation.
//! A run carries the generation it was started for, and its completion is only
//! applied if that generation is newer than the last one applied. Stale
//! completions are dropped without touching the artifact or the actions.

use std::sync::Arc;

use log::warn;

use crate::language::HighlightResult;
use crate::rendering::RenderArtifact;

/// Step of a run in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Highlighting,
    Settling,
    Capturing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Debounce window open
    Pending,
    Running(RunPhase),
    Succeeded,
    Failed,
}

/// Actions that need a valid artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actions {
    pub copy: bool,
    pub share: bool,
}

impl Actions {
    fn tracking(enabled: bool) -> Self {
        Self {
            copy: enabled,
            share: enabled,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Image captured
    Captured {
        highlight: HighlightResult,
        artifact: RenderArtifact,
    },
    /// Blank source; nothing to capture
    Blank { highlight: HighlightResult },
    /// The capture engine failed
    CaptureFailed {
        highlight: HighlightResult,
        message: String,
    },
}

/// Read-only view of the pipeline, published after every transition.
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub run: RunState,
    /// Latest requested generation
    pub requested: u64,
    /// Generation of the last applied completion
    pub applied: u64,
    /// Source text the pipeline is working from
    pub source: Arc<str>,
    pub highlight: Option<HighlightResult>,
    pub artifact: Option<Arc<RenderArtifact>>,
    pub actions: Actions,
    pub last_error: Option<String>,
}

impl PipelineSnapshot {
    /// Label for the language display, if a run has completed
    pub fn language_label(&self) -> Option<String> {
        self.highlight.as_ref().map(|h| h.label())
    }
}

#[derive(Debug)]
pub struct PipelineState {
    run: RunState,
    requested: u64,
    applied: u64,
    /// Generation of the run in flight, if any
    in_flight: Option<u64>,
    highlight: Option<HighlightResult>,
    artifact: Option<Arc<RenderArtifact>>,
    actions: Actions,
    last_error: Option<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            run: RunState::Idle,
            requested: 0,
            applied: 0,
            in_flight: None,
            highlight: None,
            artifact: None,
            actions: Actions::default(),
            last_error: None,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn artifact(&self) -> Option<&Arc<RenderArtifact>> {
        self.artifact.as_ref()
    }

    pub fn actions(&self) -> Actions {
        self.actions
    }

    /// Record a new run request and return its generation.
    ///
    /// A request made while a run is in flight leaves the state `Running`;
    /// the follow-up run is picked up once the current one completes.
    pub fn request(&mut self) -> u64 {
        self.requested += 1;
        if !matches!(self.run, RunState::Running(_)) {
            self.run = RunState::Pending;
        }
        self.requested
    }

    /// Start serving the latest request; returns the generation of the run.
    pub fn begin(&mut self) -> u64 {
        self.run = RunState::Running(RunPhase::Highlighting);
        self.in_flight = Some(self.requested);
        self.requested
    }

    /// Generation of the run in flight.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Advance the phase of the run for `generation`.
    ///
    /// Only the run in flight moves the phase, even when newer requests have
    /// been made since it began. Returns whether the phase was taken.
    pub fn phase(&mut self, generation: u64, phase: RunPhase) -> bool {
        if self.in_flight != Some(generation) || !matches!(self.run, RunState::Running(_)) {
            return false;
        }
        self.run = RunState::Running(phase);
        true
    }

    /// Apply the completion of the run for `generation`.
    ///
    /// Returns `false` and changes nothing if a completion of the same or a
    /// newer generation was already applied.
    pub fn apply(&mut self, generation: u64, outcome: RunOutcome) -> bool {
        if self.in_flight == Some(generation) {
            self.in_flight = None;
        }
        if generation <= self.applied {
            warn!(
                "discarding stale completion for generation {} (applied {})",
                generation, self.applied
            );
            return false;
        }
        self.applied = generation;

        let finished = match outcome {
            RunOutcome::Captured { highlight, artifact } => {
                self.highlight = Some(highlight);
                self.artifact = Some(Arc::new(artifact));
                self.last_error = None;
                RunState::Succeeded
            }
            RunOutcome::Blank { highlight } => {
                self.highlight = Some(highlight);
                self.artifact = None;
                self.last_error = None;
                RunState::Succeeded
            }
            RunOutcome::CaptureFailed { highlight, message } => {
                self.highlight = Some(highlight);
                self.artifact = None;
                self.last_error = Some(message);
                RunState::Failed
            }
        };
        self.actions = Actions::tracking(self.artifact.is_some());

        self.run = if self.requested > generation {
            RunState::Pending
        } else {
            finished
        };
        true
    }

    pub fn snapshot(&self, source: Arc<str>) -> PipelineSnapshot {
        PipelineSnapshot {
            run: self.run,
            requested: self.requested,
            applied: self.applied,
            source,
            highlight: self.highlight.clone(),
            artifact: self.artifact.clone(),
            actions: self.actions,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::Bitmap;

    fn artifact(generation: u64, byte: u8) -> RenderArtifact {
        RenderArtifact::from_bitmap(
            generation,
            Bitmap { width: 1, height: 1, png: vec![byte] },
        )
    }

    fn captured(generation: u64, byte: u8) -> RunOutcome {
        RunOutcome::Captured {
            highlight: HighlightResult::empty(),
            artifact: artifact(generation, byte),
        }
    }

    #[test]
    fn request_begin_apply_cycle() {
        let mut s = PipelineState::new();
        assert_eq!(s.run_state(), RunState::Idle);
        let g = s.request();
        assert_eq!(s.run_state(), RunState::Pending);
        assert_eq!(s.begin(), g);
        s.phase(g, RunPhase::Capturing);
        assert_eq!(s.run_state(), RunState::Running(RunPhase::Capturing));
        assert!(s.apply(g, captured(g, 1)));
        assert_eq!(s.run_state(), RunState::Succeeded);
        assert!(s.actions().copy && s.actions().share);
    }

    #[test]
    fn request_during_run_stays_running_then_pending() {
        let mut s = PipelineState::new();
        s.request();
        let g = s.begin();
        s.request();
        assert_eq!(s.run_state(), RunState::Running(RunPhase::Highlighting));
        assert!(s.apply(g, captured(g, 1)));
        assert_eq!(s.run_state(), RunState::Pending);
        assert_eq!(s.in_flight(), None);
    }

    #[test]
    fn phases_advance_after_a_request_during_the_run() {
        let mut s = PipelineState::new();
        s.request();
        let g = s.begin();
        assert!(s.phase(g, RunPhase::Settling));
        let next = s.request();
        assert!(next > g);

        assert!(s.phase(g, RunPhase::Capturing));
        assert_eq!(s.run_state(), RunState::Running(RunPhase::Capturing));
        // a generation that is not in flight never moves the phase
        assert!(!s.phase(next, RunPhase::Settling));
        assert_eq!(s.run_state(), RunState::Running(RunPhase::Capturing));

        assert!(s.apply(g, captured(g, 1)));
        assert!(!s.phase(g, RunPhase::Settling));
        assert_eq!(s.run_state(), RunState::Pending);
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut s = PipelineState::new();
        let a = s.request();
        let b = s.request();
        // B completes first
        assert!(s.apply(b, captured(b, 2)));
        let current = s.artifact().cloned().unwrap();

        // A completes late, with a failure: nothing changes
        let applied = s.apply(
            a,
            RunOutcome::CaptureFailed {
                highlight: HighlightResult::empty(),
                message: "late".into(),
            },
        );
        assert!(!applied);
        assert_eq!(s.artifact().unwrap().png, current.png);
        assert!(s.actions().copy);
        assert_eq!(s.applied(), b);

        // and a late success does not replace B's artifact either
        assert!(!s.apply(a, captured(a, 9)));
        assert_eq!(s.artifact().unwrap().png, vec![2]);
    }

    #[test]
    fn failure_disables_previously_enabled_actions() {
        let mut s = PipelineState::new();
        let g = s.request();
        s.apply(g, captured(g, 1));
        assert!(s.actions().share);

        let g = s.request();
        s.apply(
            g,
            RunOutcome::CaptureFailed {
                highlight: HighlightResult::empty(),
                message: "boom".into(),
            },
        );
        assert_eq!(s.run_state(), RunState::Failed);
        assert!(s.artifact().is_none());
        assert_eq!(s.actions(), Actions::default());
        assert_eq!(s.snapshot("x".into()).last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn blank_run_clears_artifact() {
        let mut s = PipelineState::new();
        let g = s.request();
        s.apply(g, captured(g, 1));
        let g = s.request();
        s.apply(g, RunOutcome::Blank { highlight: HighlightResult::empty() });
        assert!(s.artifact().is_none());
        assert!(!s.actions().copy);
        assert_eq!(s.run_state(), RunState::Succeeded);
    }
}
