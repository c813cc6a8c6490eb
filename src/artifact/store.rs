//! ArtifactStore：产物落盘
//!
//! - 文本：同一内容写入 `<base>.txt` 与 `<base>.md`（md 多一个结尾换行），两者都成功才算完成
//! - 图片：内联 base64 解码后写入 `<base>.png`，或按 URL 下载（有超时，非 2xx 直接失败）
//!
//! 所有写入先落到输出目录内的临时文件，再 rename 到最终路径，不会留下写了一半的产物。

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::AppConfig;
use crate::core::GenerationError;

const ARTIFACT_EXTENSIONS: [&str; 3] = ["txt", "md", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Text,
    Markdown,
    Image,
}

/// 已落盘的产物（写入后不再修改）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// 文本产物对：.txt 与 .md
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedText {
    pub text: Artifact,
    pub markdown: Artifact,
}

/// 产物存储：单一输出目录 + 下载用 HTTP 客户端
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    client: Client,
}

impl ArtifactStore {
    /// download_timeout 覆盖整个下载（连接 + 读取 body）；HTTP 客户端构建失败返回 InvalidConfig
    pub fn new(
        output_dir: impl Into<PathBuf>,
        download_timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(download_timeout)
            .build()
            .map_err(|e| GenerationError::InvalidConfig(format!("download client: {e}")))?;
        Ok(Self {
            output_dir: output_dir.into(),
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GenerationError> {
        Self::new(
            config.app.output_dir.clone(),
            Duration::from_secs(config.artifacts.download_timeout_secs),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn ensure_dir(&self) -> Result<(), GenerationError> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    fn path_for(&self, base_name: &str, ext: &str) -> PathBuf {
        self.output_dir.join(format!("{base_name}.{ext}"))
    }

    /// `<prefix>_<unix 秒>`；同一秒内已有同名产物时追加 `_1`、`_2`…
    pub fn base_name(&self, prefix: &str) -> String {
        let stem = format!("{}_{}", prefix, chrono::Utc::now().timestamp());
        let taken = |name: &str| {
            ARTIFACT_EXTENSIONS
                .iter()
                .any(|ext| self.path_for(name, ext).exists())
        };
        if !taken(&stem) {
            return stem;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{stem}_{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// 写入临时文件（同目录），尚未 rename
    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile, GenerationError> {
        use std::io::Write;
        let mut tmp = NamedTempFile::new_in(&self.output_dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn commit(tmp: NamedTempFile, path: &Path) -> Result<(), GenerationError> {
        tmp.persist(path).map_err(|e| GenerationError::Io(e.error))?;
        Ok(())
    }

    pub fn save_text(&self, content: &str, base_name: &str) -> Result<SavedText, GenerationError> {
        self.ensure_dir()?;
        let text_path = self.path_for(base_name, "txt");
        let md_path = self.path_for(base_name, "md");

        let text_tmp = self.stage(content.as_bytes())?;
        let md_tmp = self.stage(format!("{content}\n").as_bytes())?;

        Self::commit(text_tmp, &text_path)?;
        if let Err(e) = Self::commit(md_tmp, &md_path) {
            let _ = std::fs::remove_file(&text_path);
            return Err(e);
        }

        tracing::info!(txt = %text_path.display(), md = %md_path.display(), "lesson plan saved");
        Ok(SavedText {
            text: Artifact {
                path: text_path,
                kind: ArtifactKind::Text,
            },
            markdown: Artifact {
                path: md_path,
                kind: ArtifactKind::Markdown,
            },
        })
    }

    pub fn save_image_from_inline_bytes(
        &self,
        payload: &str,
        base_name: &str,
    ) -> Result<Artifact, GenerationError> {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        self.write_image(&bytes, base_name)
    }

    pub async fn download_image(&self, url: &str, base_name: &str) -> Result<Artifact, GenerationError> {
        tracing::info!(url = %url, "downloading image");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GenerationError::DownloadFailure(format!("Request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(GenerationError::DownloadFailure(format!(
                "HTTP {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GenerationError::DownloadFailure(format!("Read body: {e}")))?;
        self.write_image(&bytes, base_name)
    }

    fn write_image(&self, bytes: &[u8], base_name: &str) -> Result<Artifact, GenerationError> {
        self.ensure_dir()?;
        let path = self.path_for(base_name, "png");
        let tmp = self.stage(bytes)?;
        Self::commit(tmp, &path)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "image saved");
        Ok(Artifact {
            path,
            kind: ArtifactKind::Image,
        })
    }
}
