use std::path::{Path, PathBuf};

use adstudio::{
    BackgroundStripper, CampaignRunner, ChromaKeyStripper, GeminiPromptSynthesizer,
    ImagenSceneGenerator, PassthroughStripper, RetryPolicy, StudioConfig, ThemeCatalog,
    ThemeOutcome, VertexForegroundStripper,
};
use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "adstudio",
    version,
    about = "Generate themed marketing images from one product photo"
)]
struct Cli {
    /// Product photo. Defaults to the first file in `--assets`.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory scanned for the product photo when `--input` is absent.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Output directory for composites and `manifest.txt`.
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON theme catalog. Defaults to the built-in themes.
    #[arg(long)]
    themes: Option<PathBuf>,

    /// Background removal method. Defaults to `vertex` on Vertex AI, `chroma-key` otherwise.
    #[arg(long, value_enum)]
    stripper: Option<StripperChoice>,

    /// Gemini model used to write scene prompts.
    #[arg(long)]
    prompt_model: Option<String>,

    /// Imagen model used to render scenes.
    #[arg(long)]
    image_model: Option<String>,

    /// Imagen aspect ratio.
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Attempts per theme (1 = no retry).
    #[arg(long, default_value_t = 1)]
    attempts: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StripperChoice {
    Vertex,
    ChromaKey,
    Passthrough,
}

impl Cli {
    fn apply(&self, config: &mut StudioConfig) {
        if let Some(output) = &self.output {
            config.output_dir.clone_from(output);
        }
        if let Some(themes) = &self.themes {
            config.themes_file = Some(themes.clone());
        }
        if let Some(model) = &self.prompt_model {
            config.prompt_model.clone_from(model);
        }
        if let Some(model) = &self.image_model {
            config.image_model.clone_from(model);
        }
        if let Some(ratio) = &self.aspect_ratio {
            config.aspect_ratio.clone_from(ratio);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adstudio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = StudioConfig::from_env();
    cli.apply(&mut config);

    let input = resolve_input(cli.input.as_deref(), &cli.assets)?;
    let catalog = match &config.themes_file {
        Some(path) => ThemeCatalog::from_json_file(path)
            .with_context(|| format!("loading themes from {}", path.display()))?,
        None => ThemeCatalog::default(),
    };

    let client = config.build_client().context("initialising cloud client")?;
    client
        .ensure_auth()
        .await
        .context("initialising cloud client")?;
    let stripper_choice = cli.stripper.unwrap_or(if config.project.is_some() {
        StripperChoice::Vertex
    } else {
        StripperChoice::ChromaKey
    });
    let stripper: Box<dyn BackgroundStripper> = match stripper_choice {
        StripperChoice::Vertex => Box::new(VertexForegroundStripper::new(client.clone())),
        StripperChoice::ChromaKey => Box::new(ChromaKeyStripper::default()),
        StripperChoice::Passthrough => Box::new(PassthroughStripper),
    };
    let synthesizer =
        GeminiPromptSynthesizer::new(client.clone()).with_model(config.prompt_model.clone());
    let scenes = ImagenSceneGenerator::new(client)
        .with_model(config.image_model.clone())
        .with_aspect_ratio(config.aspect_ratio.clone());

    let runner = CampaignRunner::new(
        stripper,
        Box::new(synthesizer),
        Box::new(scenes),
        config.output_dir.clone(),
    )
    .with_retry(RetryPolicy {
        attempts: cli.attempts,
        ..RetryPolicy::default()
    });

    info!(
        input = %input.display(),
        themes = catalog.len(),
        stripper = ?stripper_choice,
        "starting campaign"
    );
    let report = runner
        .run(&input, &catalog)
        .await
        .with_context(|| format!("processing {}", input.display()))?;

    for outcome in &report.outcomes {
        if let ThemeOutcome::Failed {
            index,
            theme,
            stage,
            error,
        } = outcome
        {
            error!(index, theme = %theme.name, %stage, %error, "no asset for theme");
        }
    }
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        output = %runner.output_dir().display(),
        manifest = %report.manifest_path.display(),
        "campaign finished"
    );
    Ok(())
}

/// `--input` wins; otherwise the first regular, non-hidden file in `assets`, by name.
fn resolve_input(input: Option<&Path>, assets: &Path) -> anyhow::Result<PathBuf> {
    if let Some(path) = input {
        anyhow::ensure!(path.is_file(), "input {} is not a file", path.display());
        return Ok(path.to_path_buf());
    }
    let mut files = std::fs::read_dir(assets)
        .with_context(|| format!("reading assets directory {}", assets.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    files.sort();
    files
        .into_iter()
        .next()
        .with_context(|| format!("no input image found in {}", assets.display()))
}
