//! End-to-end pipeline behaviour through the public API

use std::sync::Arc;
use std::time::Duration;

use snipshot::highlight::EngineOutput;
use snipshot::{
    FileStore, HighlightEngine, LanguageSelection, PipelineConfig, PipelineEvent, Resolution,
    RunPhase, RunState, SnippetPipeline, SnippetStore,
};

/// Engine that only knows one language and never guesses.
struct OneLanguage;

impl HighlightEngine for OneLanguage {
    fn is_language_supported(&self, language: &str) -> bool {
        language == "toy"
    }

    fn highlight(&self, text: &str, _language: &str) -> snipshot::Result<EngineOutput> {
        Ok(EngineOutput {
            markup: format!("<span class=\"source toy\">{}</span>", text),
            language: Some("toy".into()),
        })
    }

    fn highlight_auto(&self, text: &str) -> snipshot::Result<EngineOutput> {
        Ok(EngineOutput {
            markup: text.to_string(),
            language: None,
        })
    }

    fn languages(&self) -> Vec<String> {
        vec!["toy".into()]
    }
}

/// Engine whose every call fails.
struct Broken;

impl HighlightEngine for Broken {
    fn is_language_supported(&self, _: &str) -> bool {
        true
    }
    fn highlight(&self, _: &str, _: &str) -> snipshot::Result<EngineOutput> {
        Err(snipshot::Error::HighlightError("grammar missing".into()))
    }
    fn highlight_auto(&self, _: &str) -> snipshot::Result<EngineOutput> {
        Err(snipshot::Error::HighlightError("grammar missing".into()))
    }
    fn languages(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Store that refuses every write.
struct ReadOnlyStore;

impl SnippetStore for ReadOnlyStore {
    fn load(&self, _: &str) -> snipshot::Result<Option<String>> {
        Ok(None)
    }
    fn save(&self, _: &str, _: &str) -> snipshot::Result<()> {
        Err(snipshot::Error::StorageError("quota exceeded".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn unsupported_language_falls_back_to_detection() {
    let pipeline = SnippetPipeline::builder(PipelineConfig::default())
        .highlight_engine(Arc::new(OneLanguage))
        .spawn()
        .unwrap();

    pipeline.edit("a b c").unwrap();
    pipeline.set_language(LanguageSelection::explicit("cobol")).unwrap();
    let snapshot = pipeline.flush().await.unwrap();
    let highlight = snapshot.highlight.unwrap();
    assert_eq!(highlight.resolution, Resolution::Fallback);
    assert_eq!(highlight.markup, "a b c");
    assert_eq!(highlight.label(), "Detected: auto (Fallback)");

    pipeline.set_language(LanguageSelection::explicit("toy")).unwrap();
    let snapshot = pipeline.flush().await.unwrap();
    assert_eq!(snapshot.language_label().as_deref(), Some("Language: toy (Forced)"));
}

#[tokio::test(start_paused = true)]
async fn highlight_errors_still_capture_plain_text() {
    let pipeline = SnippetPipeline::builder(PipelineConfig::default())
        .highlight_engine(Arc::new(Broken))
        .spawn()
        .unwrap();

    pipeline.edit("1 < 2").unwrap();
    let snapshot = pipeline.flush().await.unwrap();
    let highlight = snapshot.highlight.clone().unwrap();
    assert_eq!(highlight.resolution, Resolution::Error);
    assert_eq!(highlight.markup, "1 &lt; 2");
    assert_eq!(snapshot.language_label().as_deref(), Some("Highlighting Error"));
    assert!(snapshot.artifact.is_some());
}

#[tokio::test(start_paused = true)]
async fn storage_failures_do_not_block_runs() {
    let pipeline = SnippetPipeline::builder(PipelineConfig::default())
        .store(Arc::new(ReadOnlyStore))
        .spawn()
        .unwrap();
    pipeline.edit("x = 1").unwrap();
    let snapshot = pipeline.flush().await.unwrap();
    assert_eq!(snapshot.run, RunState::Succeeded);
    assert!(snapshot.actions.copy);
}

#[tokio::test(start_paused = true)]
async fn file_store_survives_restart() {
    let path = std::env::temp_dir()
        .join(format!("snipshot-it-{}", std::process::id()))
        .join("store.json");
    let store = Arc::new(FileStore::new(&path));

    let first = SnippetPipeline::builder(PipelineConfig::default())
        .store(store.clone())
        .spawn()
        .unwrap();
    first.edit("puts 'hi'").unwrap();
    let before = first.flush().await.unwrap().artifact.unwrap();
    first.close().await.unwrap();

    let second = SnippetPipeline::builder(PipelineConfig::default())
        .store(Arc::new(FileStore::new(&path)))
        .spawn()
        .unwrap();
    let snapshot = second.flush().await.unwrap();
    assert_eq!(&*snapshot.source, "puts 'hi'");
    assert_eq!(snapshot.artifact.unwrap().digest, before.digest);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test(start_paused = true)]
async fn observers_see_the_phases_in_order() {
    let pipeline = SnippetPipeline::spawn(PipelineConfig::default()).unwrap();
    let mut watch = pipeline.watch();
    let mut events = pipeline.subscribe();

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while watch.changed().await.is_ok() {
            let run = watch.borrow_and_update().run;
            if seen.last() != Some(&run) {
                seen.push(run);
            }
            if matches!(run, RunState::Succeeded | RunState::Failed) {
                break;
            }
        }
        seen
    });

    pipeline.edit("let x = 1;").unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(5), observer)
        .await
        .unwrap()
        .unwrap();
    // watch only keeps the latest value, so fast transitions may be skipped,
    // but the observed ones must follow the state machine order
    let order = [
        RunState::Pending,
        RunState::Running(RunPhase::Highlighting),
        RunState::Running(RunPhase::Settling),
        RunState::Running(RunPhase::Capturing),
        RunState::Succeeded,
    ];
    let positions: Vec<usize> = seen
        .iter()
        .map(|s| order.iter().position(|o| o == s).expect("unexpected state"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", seen);
    assert_eq!(seen.first(), Some(&RunState::Pending));
    assert_eq!(seen.last(), Some(&RunState::Succeeded));

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            PipelineEvent::RunStarted { .. } => "started",
            PipelineEvent::PhaseChanged { .. } => continue,
            PipelineEvent::Highlighted { .. } => "highlighted",
            PipelineEvent::Captured { .. } => "captured",
            PipelineEvent::Cleared { .. } => "cleared",
            PipelineEvent::CaptureFailed { .. } => "failed",
            PipelineEvent::Discarded { .. } => "discarded",
        });
    }
    assert_eq!(kinds, vec!["started", "highlighted", "captured"]);
}
