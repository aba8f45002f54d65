//! Run manifest: which prompt produced which asset.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// 清单文件名。
pub const MANIFEST_FILENAME: &str = "manifest.txt";

/// 一个成功主题的记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub filename: String,
    pub prompt: String,
}

impl ManifestEntry {
    pub fn new(filename: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            prompt: prompt.into(),
        }
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FILE: {}", self.filename)?;
        writeln!(f, "PROMPT: {}", self.prompt)
    }
}

/// 按主题顺序累积的清单。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 渲染为文本：条目之间以空行分隔，无条目时为空字符串。
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 写入 `dir/manifest.txt`，返回文件路径。
    ///
    /// # Errors
    /// 写文件失败时返回错误。
    pub async fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(MANIFEST_FILENAME);
        tokio::fs::write(&path, self.render()).await?;
        Ok(path)
    }
}
