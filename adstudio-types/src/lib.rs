//! Wire types for the Gemini `generateContent`, Imagen `predict` and
//! segmentation `predict` calls used by adstudio.

mod base64_serde;

pub mod config;
pub mod content;
pub mod enums;
pub mod http;
pub mod models;
pub mod response;
