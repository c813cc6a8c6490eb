//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `LESSONSMITH__*` 覆盖（双下划线表示嵌套，如 `LESSONSMITH__RETRY__MAX_ATTEMPTS=5`）。
//! 配置构建后不可变，按需传入各组件（RetryExecutor、PromptBuilder、ArtifactStore、Orchestrator）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::GenerationError;

/// 凭证所在的环境变量
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// 图片接口接受的正方形尺寸
pub const SUPPORTED_IMAGE_SIZES: [&str; 3] = ["256x256", "512x512", "1024x1024"];

/// 校验 [llm.image].size；不支持的尺寸在构建组件时即报 InvalidConfig，而不是静默改成其它尺寸
pub fn validate_image_size(size: &str) -> Result<&str, GenerationError> {
    let size = size.trim();
    if SUPPORTED_IMAGE_SIZES.contains(&size) {
        Ok(size)
    } else {
        Err(GenerationError::InvalidConfig(format!(
            "llm.image.size must be one of {}, got {:?}",
            SUPPORTED_IMAGE_SIZES.join(", "),
            size
        )))
    }
}

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub retry: RetrySection,
    pub artifacts: ArtifactsSection,
    pub lesson: LessonSection,
}

/// [app] 段：产物输出目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub output_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
        }
    }
}

/// [llm] 段：端点、system prompt、文本/图片模型参数与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI 兼容端点；未设置时走官方地址
    pub base_url: Option<String>,
    pub system_prompt: String,
    pub text: LlmTextSection,
    pub image: LlmImageSection,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            system_prompt: default_system_prompt(),
            text: LlmTextSection::default(),
            image: LlmImageSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are an artificial intelligence assistant dedicated to creating lesson \
     delivery plans for primary and secondary school educators and teachers."
        .to_string()
}

/// [llm.text] 段：课程计划生成参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTextSection {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for LlmTextSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.4,
            max_tokens: 900,
            top_p: 0.95,
        }
    }
}

/// [llm.image] 段：配图生成参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmImageSection {
    pub model: String,
    /// 正方形尺寸，如 1024x1024
    pub size: String,
    /// b64_json / url；未设置时由后端决定
    pub response_format: Option<String>,
}

impl Default for LlmImageSection {
    fn default() -> Self {
        Self {
            model: "gpt-image-1".to_string(),
            size: "1024x1024".to_string(),
            response_format: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次远程调用超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [retry] 段：最大尝试次数与退避基数（秒），延迟依次为 base、2·base、4·base…
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 4.0,
        }
    }
}

/// [artifacts] 段：远程图片下载超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsSection {
    pub download_timeout_secs: u64,
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            download_timeout_secs: 60,
        }
    }
}

/// [lesson] 段：默认学段与课时长度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LessonSection {
    pub level: String,
    pub duration_minutes: u32,
}

impl Default for LessonSection {
    fn default() -> Self {
        Self {
            level: "Secondary".to_string(),
            duration_minutes: 40,
        }
    }
}

/// 从 config 目录加载配置，环境变量 LESSONSMITH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 LESSONSMITH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("LESSONSMITH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 读取 API Key（先加载 .env）；缺失或为空即 MissingCredential，调用方应在任何编排开始前终止
pub fn resolve_api_key() -> Result<String, GenerationError> {
    let _ = dotenvy::dotenv();
    api_key_from(std::env::var(API_KEY_ENV).ok())
}

fn api_key_from(value: Option<String>) -> Result<String, GenerationError> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(GenerationError::MissingCredential),
    }
}
