//! Batch orchestration: one cutout, every theme, one manifest.
//!
//! The background is stripped exactly once. Each theme then runs
//! prompt synthesis, scene generation, compositing and persisting in order;
//! a failure at any stage ends that theme only and the loop moves on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use tracing::{error, info, warn};

use crate::compositor::{self, CompositeLayout};
use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::prompt::PromptSynthesizer;
use crate::scene::SceneGenerator;
use crate::strip::{BackgroundStripper, ProductCutout};
use crate::themes::{Theme, ThemeCatalog};

/// 单个主题内的处理阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PromptSynthesis,
    SceneGeneration,
    Compositing,
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PromptSynthesis => "prompt_synthesis",
            Self::SceneGeneration => "scene_generation",
            Self::Compositing => "compositing",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// 单个主题的处理结果。
#[derive(Debug)]
pub enum ThemeOutcome {
    Succeeded {
        index: usize,
        theme: Theme,
        entry: ManifestEntry,
    },
    Failed {
        index: usize,
        theme: Theme,
        stage: Stage,
        error: Error,
    },
}

impl ThemeOutcome {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Succeeded { index, .. } | Self::Failed { index, .. } => *index,
        }
    }

    #[must_use]
    pub fn theme(&self) -> &Theme {
        match self {
            Self::Succeeded { theme, .. } | Self::Failed { theme, .. } => theme,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// 整批运行的结果。
#[derive(Debug)]
pub struct CampaignReport {
    pub outcomes: Vec<ThemeOutcome>,
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
}

impl CampaignReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// 主题级重试策略。默认只尝试一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// 第 `retry` 次重试（从 0 开始）前的等待时间。
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

type StageResult<T> = std::result::Result<T, (Stage, Error)>;

/// 批量生成营销图。
pub struct CampaignRunner {
    stripper: Box<dyn BackgroundStripper>,
    synthesizer: Box<dyn PromptSynthesizer>,
    scenes: Box<dyn SceneGenerator>,
    output_dir: PathBuf,
    layout: CompositeLayout,
    retry: RetryPolicy,
}

impl CampaignRunner {
    pub fn new(
        stripper: Box<dyn BackgroundStripper>,
        synthesizer: Box<dyn PromptSynthesizer>,
        scenes: Box<dyn SceneGenerator>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stripper,
            synthesizer,
            scenes,
            output_dir: output_dir.into(),
            layout: CompositeLayout::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: CompositeLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 处理整批主题。
    ///
    /// # Errors
    /// 读取输入、抠图、创建输出目录或写清单失败时返回错误；
    /// 单个主题的失败记录在 [`CampaignReport::outcomes`] 中。
    pub async fn run(&self, input: &Path, catalog: &ThemeCatalog) -> Result<CampaignReport> {
        let raw = tokio::fs::read(input).await?;
        info!(input = %input.display(), bytes = raw.len(), "removing background");
        let cutout = ProductCutout::new(self.stripper.strip(&raw).await?)?;
        let (width, height) = cutout.dimensions();
        info!(width, height, "product cutout ready");

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut outcomes = Vec::with_capacity(catalog.len());
        let mut manifest = Manifest::new();
        for (index, theme) in catalog.iter() {
            let outcome = self.run_theme(&cutout, index, theme).await;
            if let ThemeOutcome::Succeeded { entry, .. } = &outcome {
                manifest.push(entry.clone());
            }
            outcomes.push(outcome);
        }

        let manifest_path = manifest.write_to_dir(&self.output_dir).await?;
        info!(
            entries = manifest.len(),
            path = %manifest_path.display(),
            "manifest written"
        );
        Ok(CampaignReport {
            outcomes,
            manifest,
            manifest_path,
        })
    }

    async fn run_theme(
        &self,
        cutout: &ProductCutout,
        index: usize,
        theme: &Theme,
    ) -> ThemeOutcome {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.produce_asset(cutout, index, theme).await {
                Ok(entry) => {
                    info!(index, theme = %theme.name, file = %entry.filename, "theme succeeded");
                    return ThemeOutcome::Succeeded {
                        index,
                        theme: theme.clone(),
                        entry,
                    };
                }
                Err((stage, err)) if attempt < attempts => {
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        index,
                        theme = %theme.name,
                        %stage,
                        error = %err,
                        attempt,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "theme attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err((stage, err)) => {
                    error!(index, theme = %theme.name, %stage, error = %err, "theme failed");
                    return ThemeOutcome::Failed {
                        index,
                        theme: theme.clone(),
                        stage,
                        error: err,
                    };
                }
            }
        }
    }

    async fn produce_asset(
        &self,
        cutout: &ProductCutout,
        index: usize,
        theme: &Theme,
    ) -> StageResult<ManifestEntry> {
        info!(index, theme = %theme.name, "synthesizing prompt");
        let prompt = self
            .synthesizer
            .synthesize(cutout, theme)
            .await
            .map_err(|err| (Stage::PromptSynthesis, err))?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err((
                Stage::PromptSynthesis,
                Error::EmptyPrompt {
                    message: format!("empty prompt for theme '{}'", theme.name),
                },
            ));
        }

        info!(index, theme = %theme.name, prompt, "generating scene");
        let scene = self
            .scenes
            .generate(prompt)
            .await
            .map_err(|err| (Stage::SceneGeneration, err))?;

        let asset = self
            .compose(&scene, cutout)
            .map_err(|err| (Stage::Compositing, err))?;

        let filename = theme.output_filename(index);
        self.persist(&asset, &filename)
            .await
            .map_err(|err| (Stage::Persisting, err))?;

        Ok(ManifestEntry::new(filename, prompt))
    }

    /// Writes `<filename>` via a staging file so a failed write never leaves
    /// a truncated asset under the final name.
    async fn persist(&self, asset: &RgbImage, filename: &str) -> Result<()> {
        let mut png = Vec::new();
        asset.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let path = self.output_dir.join(filename);
        let staging = self.output_dir.join(format!(".{filename}.partial"));
        let written = match tokio::fs::write(&staging, &png).await {
            Ok(()) => tokio::fs::rename(&staging, &path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %staging.display(), error = %cleanup, "staging file left behind");
                }
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn compose(&self, scene: &DynamicImage, cutout: &ProductCutout) -> Result<RgbImage> {
        if scene.width() == 0 || scene.height() == 0 {
            return Err(Error::NoImageGenerated);
        }
        Ok(compositor::composite_with(&self.layout, scene, cutout.image()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn default_policy_is_single_attempt() {
        assert_eq!(RetryPolicy::default().attempts, 1);
    }

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(Stage::SceneGeneration.to_string(), "scene_generation");
        assert_eq!(Stage::Persisting.to_string(), "persisting");
    }
}
