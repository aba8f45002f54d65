//! Product-photo ad studio.
//!
//! Strips the background from one product photo, asks Gemini to write a scene
//! prompt per creative theme, renders the scene with Imagen, composites the
//! product on top and records every result in a manifest.

pub mod client;
pub mod compositor;
pub mod config;
pub mod error;
pub mod manifest;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod scene;
pub mod strip;
pub mod themes;

#[cfg(test)]
mod test_support;

pub use adstudio_types as types;

pub use client::{Backend, Client, ClientBuilder, Credentials, HttpOptions, VertexConfig};
pub use compositor::{composite, composite_with, CompositeLayout, ProductPlacement};
pub use config::StudioConfig;
pub use error::{Error, Result};
pub use manifest::{Manifest, ManifestEntry};
pub use pipeline::{CampaignReport, CampaignRunner, RetryPolicy, Stage, ThemeOutcome};
pub use prompt::{GeminiPromptSynthesizer, PromptSynthesizer};
pub use scene::{ImagenSceneGenerator, SceneGenerator};
pub use strip::{
    BackgroundStripper, ChromaKeyStripper, PassthroughStripper, ProductCutout,
    VertexForegroundStripper,
};
pub use themes::{Theme, ThemeCatalog};
