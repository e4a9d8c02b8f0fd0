//! Async pipeline handle and the controller task behind it.
//!
//! A [`SnippetPipeline`] is a cheap, cloneable handle. All state lives in a
//! single controller task that processes commands, debounce timer fires and
//! run completions one at a time. Runs themselves execute on a spawned task
//! so edits keep flowing while a capture is in flight; at most one run exists
//! at any moment.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::debounce::{Debouncer, Trigger};
use crate::highlight::{HighlightEngine, Highlighter, SyntectEngine};
use crate::language::LanguageSelection;
use crate::rendering::layout::PreviewSurface;
use crate::rendering::raster::{CaptureEngine, PixmapCapture, Rasterizer};
use crate::rendering::theme::ThemeCatalog;
use crate::rendering::RenderArtifact;
use crate::state::{PipelineSnapshot, PipelineState, RunOutcome, RunPhase};
use crate::store::{self, MemoryStore, SnippetStore};
use crate::{Error, PipelineConfig, RenderSettings, Result};

const EVENT_CAPACITY: usize = 64;

enum Command {
    Edit(String),
    SetSettings(RenderSettings),
    SetLanguage(LanguageSelection),
    Flush(oneshot::Sender<PipelineSnapshot>),
    Close(oneshot::Sender<()>),
}

/// Progress reported by a run task back to the controller.
enum Progress {
    Phase(u64, RunPhase),
}

/// Notifications emitted as runs progress.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A run started for `generation`
    RunStarted { generation: u64 },
    /// The run for `generation` moved on to `phase`
    PhaseChanged { generation: u64, phase: RunPhase },
    /// Highlighting for `generation` finished
    Highlighted { generation: u64, language: String, label: String },
    /// A new artifact is current
    Captured { generation: u64, digest: String },
    /// The source was blank; the artifact was cleared
    Cleared { generation: u64 },
    /// The capture engine failed; the artifact was cleared
    CaptureFailed { generation: u64, message: String },
    /// A completion arrived for a generation older than the applied one
    Discarded { generation: u64 },
}

/// Builder for [`SnippetPipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    highlight_engine: Option<Arc<dyn HighlightEngine>>,
    capture_engine: Option<Arc<dyn CaptureEngine>>,
    store: Option<Arc<dyn SnippetStore>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            highlight_engine: None,
            capture_engine: None,
            store: None,
        }
    }

    /// Use a custom highlighting engine instead of [`SyntectEngine`].
    pub fn highlight_engine(mut self, engine: Arc<dyn HighlightEngine>) -> Self {
        self.highlight_engine = Some(engine);
        self
    }

    /// Use a custom capture engine instead of [`PixmapCapture`].
    pub fn capture_engine(mut self, engine: Arc<dyn CaptureEngine>) -> Self {
        self.capture_engine = Some(engine);
        self
    }

    /// Persist the source in `store` (defaults to an in-memory store).
    pub fn store(mut self, store: Arc<dyn SnippetStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start the controller task on the current tokio runtime.
    ///
    /// A source previously saved in the store is loaded and, if not blank,
    /// rendered right away.
    pub fn spawn(self) -> Result<SnippetPipeline> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Other(format!("no tokio runtime: {}", e)))?;

        let config = self.config;
        let highlight_engine = self.highlight_engine.unwrap_or_else(|| {
            Arc::new(SyntectEngine::with_candidates(config.candidate_languages.clone()))
        });
        let capture_engine = self
            .capture_engine
            .unwrap_or_else(|| Arc::new(PixmapCapture));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let source: Arc<str> = store::load_quietly(store.as_ref(), &config.store_key)
            .unwrap_or_default()
            .into();
        let state = PipelineState::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot(source.clone()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();

        let controller = Controller {
            debouncer: Debouncer::new(config.edit_debounce(), config.style_debounce()),
            rasterizer: Rasterizer::new(capture_engine, config.settle(), config.capture_scale),
            highlighter: Highlighter::new(highlight_engine),
            themes: Arc::new(ThemeCatalog::load()),
            settings: config.settings.clone(),
            store_key: config.store_key.clone(),
            store,
            state,
            source,
            snapshot_tx,
            events: events.clone(),
            progress_tx,
            flush_waiters: Vec::new(),
        };
        runtime.spawn(controller.run(cmd_rx, progress_rx));

        Ok(SnippetPipeline {
            cmd_tx,
            snapshot_rx,
            events,
        })
    }
}

/// Handle to a running highlight-and-capture pipeline.
#[derive(Clone)]
pub struct SnippetPipeline {
    cmd_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<PipelineSnapshot>,
    events: broadcast::Sender<PipelineEvent>,
}

impl SnippetPipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Spawn a pipeline with default engines and an in-memory store.
    pub fn spawn(config: PipelineConfig) -> Result<Self> {
        PipelineBuilder::new(config).spawn()
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| Error::Closed)
    }

    /// Replace the source text; schedules an edit-triggered run.
    pub fn edit(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::Edit(text.into()))
    }

    /// Replace the render settings; schedules a style-triggered run.
    pub fn set_settings(&self, settings: RenderSettings) -> Result<()> {
        settings.validate()?;
        self.send(Command::SetSettings(settings))
    }

    /// Change the language selection; schedules a style-triggered run.
    pub fn set_language(&self, language: LanguageSelection) -> Result<()> {
        self.send(Command::SetLanguage(language))
    }

    /// Fire any pending debounce window now and wait until the pipeline is
    /// idle, returning the resulting snapshot.
    pub async fn flush(&self) -> Result<PipelineSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// The current artifact, if the last applied run produced one.
    pub fn artifact(&self) -> Option<Arc<RenderArtifact>> {
        self.snapshot_rx.borrow().artifact.clone()
    }

    /// Receiver that observes every snapshot transition.
    pub fn watch(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Stop the controller. A run in flight is abandoned.
    pub async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await.map_err(|_| Error::Closed)
    }
}

type InFlight = Option<(u64, JoinHandle<RunOutcome>)>;

struct Controller {
    debouncer: Debouncer,
    highlighter: Highlighter,
    rasterizer: Rasterizer,
    themes: Arc<ThemeCatalog>,
    settings: RenderSettings,
    store_key: String,
    store: Arc<dyn SnippetStore>,
    state: PipelineState,
    source: Arc<str>,
    snapshot_tx: watch::Sender<PipelineSnapshot>,
    events: broadcast::Sender<PipelineEvent>,
    progress_tx: mpsc::UnboundedSender<Progress>,
    flush_waiters: Vec<oneshot::Sender<PipelineSnapshot>>,
}

impl Controller {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut progress_rx: mpsc::UnboundedReceiver<Progress>,
    ) {
        let mut in_flight: InFlight = None;

        if !self.source.trim().is_empty() {
            self.state.request();
            in_flight = Some(self.start_run());
        }

        loop {
            let timer = self.debouncer.wait();
            let idle = in_flight.is_none();

            tokio::select! {
                biased;

                Some(progress) = progress_rx.recv() => self.on_progress(progress),

                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Close(resp)) => {
                        if let Some((generation, handle)) = in_flight.take() {
                            debug!("abandoning run for generation {}", generation);
                            handle.abort();
                        }
                        self.release_flush_waiters();
                        let _ = resp.send(());
                        break;
                    }
                    Some(cmd) => self.on_command(cmd),
                    None => break,
                },

                joined = join_run(&mut in_flight) => {
                    if let Some((generation, _)) = in_flight.take() {
                        let outcome = joined.unwrap_or_else(|e| RunOutcome::CaptureFailed {
                            highlight: crate::language::HighlightResult::empty(),
                            message: format!("run task failed: {}", e),
                        });
                        self.complete(generation, outcome);
                    }
                },

                _ = timer, if idle => {
                    self.debouncer.take();
                    debug!("debounce window closed");
                    in_flight = Some(self.start_run());
                },
            }

            if in_flight.is_none() && !self.flush_waiters.is_empty() {
                if self.debouncer.take().is_some() {
                    in_flight = Some(self.start_run());
                } else {
                    self.release_flush_waiters();
                }
            }
        }
        debug!("pipeline controller stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Edit(text) => {
                self.source = text.into();
                self.schedule(Trigger::Edit);
            }
            Command::SetSettings(settings) => {
                self.settings = settings;
                self.schedule(Trigger::Style);
            }
            Command::SetLanguage(language) => {
                self.settings.language = language;
                self.schedule(Trigger::Style);
            }
            Command::Flush(resp) => self.flush_waiters.push(resp),
            Command::Close(resp) => {
                let _ = resp.send(());
            }
        }
    }

    fn on_progress(&mut self, progress: Progress) {
        match progress {
            Progress::Phase(generation, phase) => {
                if self.state.phase(generation, phase) {
                    self.publish();
                    self.emit(PipelineEvent::PhaseChanged { generation, phase });
                }
            }
        }
    }

    fn schedule(&mut self, trigger: Trigger) {
        let generation = self.state.request();
        self.debouncer.schedule(trigger);
        debug!("{:?} scheduled generation {}", trigger, generation);
        self.publish();
    }

    fn start_run(&mut self) -> (u64, JoinHandle<RunOutcome>) {
        store::save_quietly(self.store.as_ref(), &self.store_key, &self.source);

        let generation = self.state.begin();
        self.publish();
        self.emit(PipelineEvent::RunStarted { generation });
        debug!("run started for generation {}", generation);

        let job = RunJob {
            generation,
            source: self.source.clone(),
            language: self.settings.language.clone(),
            surface: PreviewSurface::new(
                self.settings.container_style(),
                self.themes.resolve(&self.settings.theme),
            ),
            highlighter: self.highlighter.clone(),
            rasterizer: self.rasterizer.clone(),
            progress: self.progress_tx.clone(),
        };
        (generation, tokio::spawn(job.execute()))
    }

    fn complete(&mut self, generation: u64, outcome: RunOutcome) {
        let highlight = match &outcome {
            RunOutcome::Captured { highlight, .. }
            | RunOutcome::Blank { highlight }
            | RunOutcome::CaptureFailed { highlight, .. } => highlight.clone(),
        };
        let event = match &outcome {
            RunOutcome::Captured { artifact, .. } => PipelineEvent::Captured {
                generation,
                digest: artifact.digest.clone(),
            },
            RunOutcome::Blank { .. } => PipelineEvent::Cleared { generation },
            RunOutcome::CaptureFailed { message, .. } => PipelineEvent::CaptureFailed {
                generation,
                message: message.clone(),
            },
        };

        if !self.state.apply(generation, outcome) {
            self.emit(PipelineEvent::Discarded { generation });
            return;
        }
        self.publish();
        self.emit(PipelineEvent::Highlighted {
            generation,
            language: highlight.resolved_language.clone(),
            label: highlight.label(),
        });
        self.emit(event);
    }

    fn publish(&self) {
        self.snapshot_tx
            .send_replace(self.state.snapshot(self.source.clone()));
    }

    fn emit(&self, event: PipelineEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn release_flush_waiters(&mut self) {
        let snapshot = self.state.snapshot(self.source.clone());
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(snapshot.clone());
        }
    }
}

async fn join_run(
    in_flight: &mut InFlight,
) -> std::result::Result<RunOutcome, tokio::task::JoinError> {
    match in_flight {
        Some((_, handle)) => handle.await,
        None => std::future::pending().await,
    }
}

/// Everything one run needs, detached from the controller.
struct RunJob {
    generation: u64,
    source: Arc<str>,
    language: LanguageSelection,
    surface: PreviewSurface,
    highlighter: Highlighter,
    rasterizer: Rasterizer,
    progress: mpsc::UnboundedSender<Progress>,
}

impl RunJob {
    async fn execute(mut self) -> RunOutcome {
        let highlight = self.highlighter.highlight(&self.source, &self.language);
        if self.source.trim().is_empty() {
            return RunOutcome::Blank { highlight };
        }

        let generation = self.generation;
        let progress = self.progress.clone();
        let captured = self
            .rasterizer
            .capture(&mut self.surface, &highlight, generation, |phase| {
                let _ = progress.send(Progress::Phase(generation, phase));
            })
            .await;

        match captured {
            Ok(artifact) => RunOutcome::Captured { highlight, artifact },
            Err(message) => {
                warn!("capture failed for generation {}", generation);
                RunOutcome::CaptureFailed { highlight, message }
            }
        }
    }
}
