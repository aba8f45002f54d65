#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures_util::future::BoxFuture;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use adstudio::{
    BackgroundStripper, Client, Credentials, Error, ProductCutout, PromptSynthesizer, Result,
    SceneGenerator, Theme,
};

pub const TEST_TOKEN: &str = "test-token";

pub fn build_gemini_client(base_url: &str) -> Client {
    Client::builder()
        .api_key("test-key")
        .base_url(base_url)
        .build()
        .unwrap()
}

pub fn build_vertex_client(base_url: &str) -> Client {
    Client::builder()
        .vertex_project("proj")
        .vertex_location("us-central1")
        .credentials(Credentials::AccessToken(TEST_TOKEN.into()))
        .base_url(base_url)
        .build()
        .unwrap()
}

pub fn vertex_model_path(model: &str, method: &str) -> String {
    format!("/v1beta1/projects/proj/locations/us-central1/publishers/google/models/{model}:{method}")
}

pub fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn encode_png_base64(image: DynamicImage) -> String {
    STANDARD.encode(encode_png(image))
}

/// A bottle-ish product: opaque green rectangle on a transparent background.
pub fn product_rgba() -> RgbaImage {
    RgbaImage::from_fn(40, 80, |x, y| {
        if (10..30).contains(&x) && (5..75).contains(&y) {
            Rgba([20, 160, 60, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

pub fn product_png() -> Vec<u8> {
    encode_png(DynamicImage::ImageRgba8(product_rgba()))
}

/// Writes the product photo into `dir` and returns its path.
pub fn write_product(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("product.png");
    std::fs::write(&path, product_png()).unwrap();
    path
}

/// Scene colour derived from the prompt so different themes render differently.
pub fn scene_for(prompt: &str) -> DynamicImage {
    let seed = prompt.bytes().fold(7u8, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte));
    DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, move |x, y| {
        Rgb([seed, (x as u8).wrapping_mul(3), (y as u8).wrapping_add(seed)])
    }))
}

pub fn theme_prompt(theme: &Theme) -> String {
    format!(
        "The product, {} backdrop, {}, eye-level, photorealistic 8k",
        theme.name, theme.mood
    )
}

pub struct CountingStripper {
    pub calls: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingStripper {
    pub fn new(calls: Arc<AtomicUsize>) -> Self {
        Self { calls, fail: false }
    }

    pub fn failing(calls: Arc<AtomicUsize>) -> Self {
        Self { calls, fail: true }
    }
}

impl BackgroundStripper for CountingStripper {
    fn strip<'a>(&'a self, raw: &'a [u8]) -> BoxFuture<'a, Result<RgbaImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.fail {
                return Err(Error::NoMask);
            }
            Ok(image::load_from_memory(raw)?.to_rgba8())
        })
    }
}

type SynthesizeFn = dyn Fn(&Theme, usize) -> Result<String> + Send + Sync;

/// Prompt synthesizer driven by a closure of `(theme, call_number)`.
pub struct ScriptedSynthesizer {
    pub calls: Arc<AtomicUsize>,
    script: Box<SynthesizeFn>,
}

impl ScriptedSynthesizer {
    pub fn new(
        calls: Arc<AtomicUsize>,
        script: impl Fn(&Theme, usize) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls,
            script: Box::new(script),
        }
    }

    pub fn always_ok(calls: Arc<AtomicUsize>) -> Self {
        Self::new(calls, |theme, _| Ok(theme_prompt(theme)))
    }
}

impl PromptSynthesizer for ScriptedSynthesizer {
    fn synthesize<'a>(
        &'a self,
        _cutout: &'a ProductCutout,
        theme: &'a Theme,
    ) -> BoxFuture<'a, Result<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.script)(theme, call);
        Box::pin(async move { result })
    }
}

type GenerateFn = dyn Fn(&str) -> Result<DynamicImage> + Send + Sync;

/// Scene generator driven by a closure of the prompt.
pub struct ScriptedScenes {
    pub calls: Arc<AtomicUsize>,
    script: Box<GenerateFn>,
}

impl ScriptedScenes {
    pub fn new(
        calls: Arc<AtomicUsize>,
        script: impl Fn(&str) -> Result<DynamicImage> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls,
            script: Box::new(script),
        }
    }

    pub fn always_ok(calls: Arc<AtomicUsize>) -> Self {
        Self::new(calls, |prompt| Ok(scene_for(prompt)))
    }
}

impl SceneGenerator for ScriptedScenes {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<DynamicImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.script)(prompt);
        Box::pin(async move { result })
    }
}

pub fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

pub fn count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
