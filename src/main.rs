use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snipshot::highlight::HighlightEngine;
use snipshot::rendering::theme::ThemeCatalog;
use snipshot::{
    FileStore, LanguageSelection, MemoryStore, PipelineConfig, PipelineSnapshot, Rgba,
    SnippetPipeline, SnippetStore, SyntectEngine,
};

#[derive(Parser)]
#[command(name = "snipshot", version, about = "Render code snippets as highlighted PNG images")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snippet store file (defaults to the user data dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Do not persist the snippet
    #[arg(long, global = true)]
    no_store: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a snippet to a PNG file
    Render {
        #[command(flatten)]
        render: RenderArgs,

        /// Output PNG path
        #[arg(short, long, default_value = "snippet.png")]
        output: PathBuf,

        /// Print the data URL instead of writing a file
        #[arg(long)]
        data_url: bool,
    },
    /// Render a snippet and copy the image to the clipboard
    #[cfg(feature = "clipboard")]
    Copy {
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Render a snippet and publish it to a creation service
    #[cfg(feature = "publish")]
    Publish {
        #[command(flatten)]
        render: RenderArgs,

        /// Title of the creation
        #[arg(long)]
        title: String,
    },
    /// Fetch a creation by id or URL and make it the current snippet
    #[cfg(feature = "publish")]
    Fetch {
        id: String,

        /// Also render it to this PNG path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List highlightable languages
    Languages,
    /// List bundled themes
    Themes,
}

#[derive(Args)]
struct RenderArgs {
    /// Source file; `-` reads stdin, omitted uses the stored snippet
    input: Option<PathBuf>,

    /// Language tag, or `auto`
    #[arg(short, long)]
    language: Option<LanguageSelection>,

    #[arg(long)]
    theme: Option<String>,

    /// Background colour (`#rrggbb`, `#rrggbbaa` or `transparent`)
    #[arg(long)]
    background: Option<Rgba>,

    /// Padding in px
    #[arg(long)]
    padding: Option<u32>,

    /// Font size in px
    #[arg(long)]
    font_size: Option<f32>,

    /// Font family, passed on to the capture engine
    #[arg(long)]
    font_family: Option<String>,
}

impl RenderArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        let settings = &mut config.settings;
        if let Some(language) = &self.language {
            settings.language = language.clone();
        }
        if let Some(theme) = &self.theme {
            settings.theme = theme.clone();
        }
        if let Some(background) = self.background {
            settings.background = (background != Rgba::TRANSPARENT).then_some(background);
        }
        if let Some(padding) = self.padding {
            settings.padding = padding;
        }
        if let Some(font_size) = self.font_size {
            settings.font_size = font_size;
        }
        if let Some(font_family) = &self.font_family {
            settings.font_family = font_family.clone();
        }
    }

    fn read_source(&self) -> anyhow::Result<Option<String>> {
        match self.input.as_deref() {
            None => Ok(None),
            Some(p) if p == Path::new("-") => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("reading stdin")?;
                Ok(Some(text))
            }
            Some(p) => Ok(Some(
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?,
            )),
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "snipshot=info",
        1 => "snipshot=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(cli: &Cli) -> Arc<dyn SnippetStore> {
    if cli.no_store {
        return Arc::new(MemoryStore::new());
    }
    match cli.store.clone().or_else(FileStore::default_path) {
        Some(path) => Arc::new(FileStore::new(path)),
        None => {
            log::warn!("no data directory available, snippet will not be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    match &cli.config {
        Some(path) => Ok(PipelineConfig::from_json_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

/// Run the pipeline once over `source` (or the stored snippet) and return
/// the settled snapshot.
async fn render_once(
    config: PipelineConfig,
    store: Arc<dyn SnippetStore>,
    source: Option<String>,
) -> anyhow::Result<PipelineSnapshot> {
    let pipeline = SnippetPipeline::builder(config).store(store).spawn()?;
    if let Some(source) = source {
        pipeline.edit(source)?;
    }
    let snapshot = pipeline.flush().await?;
    pipeline.close().await?;

    if let Some(label) = snapshot.language_label() {
        log::info!("{}", label);
    }
    if snapshot.artifact.is_none() {
        match &snapshot.last_error {
            Some(e) => bail!("could not render snippet: {}", e),
            None => bail!("nothing to render: the snippet is empty"),
        }
    }
    Ok(snapshot)
}

fn write_png(snapshot: &PipelineSnapshot, output: &Path) -> anyhow::Result<()> {
    if let Some(artifact) = &snapshot.artifact {
        std::fs::write(output, &artifact.png)
            .with_context(|| format!("writing {}", output.display()))?;
        println!("{} ({}x{})", output.display(), artifact.width, artifact.height);
    }
    Ok(())
}

/// Log why a fetched snippet did not render; its source is printed anyway.
#[cfg(feature = "publish")]
fn warn_unrendered(rendered: &anyhow::Result<PipelineSnapshot>) -> Option<String> {
    let message = format!("{:#}", rendered.as_ref().err()?);
    log::warn!("fetched snippet did not render: {}", message);
    Some(message)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(&cli)?;
    let store = open_store(&cli);

    match &cli.command {
        Command::Render { render, output, data_url } => {
            render.apply(&mut config);
            let snapshot = render_once(config, store, render.read_source()?).await?;
            if *data_url {
                if let Some(artifact) = &snapshot.artifact {
                    println!("{}", artifact.data_url);
                }
            } else {
                write_png(&snapshot, output)?;
            }
        }
        #[cfg(feature = "clipboard")]
        Command::Copy { render } => {
            render.apply(&mut config);
            let snapshot = render_once(config, store, render.read_source()?).await?;
            let sink = snipshot::clipboard::SystemClipboard::new()?;
            let copier = snipshot::ImageCopier::new(Arc::new(sink));
            copier.copy(snapshot.artifact.as_deref())?;
            println!("Image copied to clipboard");
        }
        #[cfg(feature = "publish")]
        Command::Publish { render, title } => {
            render.apply(&mut config);
            let endpoints = snipshot::publish::PublishEndpoints::new(&config.instance_url)?;
            let snapshot = render_once(config, store, render.read_source()?).await?;
            let client = snipshot::publish::PublishClient::new(endpoints);
            client
                .publish(title, &snapshot.source, snapshot.artifact.as_deref())
                .await?;
            println!("Published {:?}", title);
        }
        #[cfg(feature = "publish")]
        Command::Fetch { id, output } => {
            let endpoints = snipshot::publish::PublishEndpoints::new(&config.instance_url)?;
            let client = snipshot::publish::PublishClient::new(endpoints);
            let creation = client.fetch_creation(id).await?;
            if let Some(title) = &creation.title {
                log::info!("fetched {:?}", title);
            }
            // rendering persists the fetched source as the current snippet
            let snapshot = render_once(config, store, Some(creation.data.clone())).await;
            match (output, snapshot) {
                (Some(output), snapshot) => write_png(&snapshot?, output)?,
                (None, snapshot) => {
                    warn_unrendered(&snapshot);
                    print!("{}", creation.data);
                }
            }
        }
        Command::Languages => {
            for language in SyntectEngine::new().languages() {
                println!("{}", language);
            }
        }
        Command::Themes => {
            for theme in ThemeCatalog::load().names() {
                println!("{}", theme);
            }
        }
    }
    Ok(())
}
