//! 生成编排器：课程计划流程与配图流程
//!
//! 两条线性流水线：PromptBuilder 渲染 → RetryExecutor 包裹后端调用 → （文本）结构校验 → ArtifactStore 落盘。
//! 两个流程互不依赖；任一致命错误在落盘前结束该流程。

use std::sync::Arc;

use serde::Serialize;

use crate::artifact::{Artifact, ArtifactStore, SavedText};
use crate::config::{AppConfig, LessonSection};
use crate::core::retry::{RetryExecutor, RetryPolicy};
use crate::core::state::{Flow, FlowStage, FlowTracker};
use crate::core::validator::{ContentValidator, ValidationReport};
use crate::core::GenerationError;
use crate::llm::{GenerationBackend, ImagePayload, ImageRequest};
use crate::prompt::PromptBuilder;

/// 文本产物的基名前缀
pub const LESSON_PLAN_PREFIX: &str = "lesson_plan";
/// 图片产物的基名前缀
pub const LESSON_IMAGE_PREFIX: &str = "lesson_image";

/// 课程计划请求；level / duration 缺省时取配置 [lesson]
#[derive(Debug, Clone)]
pub struct LessonRequest {
    pub topic: String,
    pub level: Option<String>,
    pub duration_minutes: Option<u32>,
}

impl LessonRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            level: None,
            duration_minutes: None,
        }
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }
}

/// 课程计划流程结果
#[derive(Debug, Clone, Serialize)]
pub struct LessonPlanResult {
    pub content: String,
    pub files: SavedText,
    pub validation: ValidationReport,
}

/// 图片来源：内联数据或远程 URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Inline,
    Remote,
}

/// 配图流程结果
#[derive(Debug, Clone, Serialize)]
pub struct IllustrationResult {
    pub artifact: Artifact,
    pub source: ImageSource,
}

/// 编排器：组合后端、Prompt、重试、校验与存储
pub struct GenerationOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    prompts: PromptBuilder,
    retry: RetryExecutor,
    validator: ContentValidator,
    store: ArtifactStore,
    lesson_defaults: LessonSection,
}

impl GenerationOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        prompts: PromptBuilder,
        retry: RetryExecutor,
        store: ArtifactStore,
        lesson_defaults: LessonSection,
    ) -> Self {
        Self {
            backend,
            prompts,
            retry,
            validator: ContentValidator::new(),
            store,
            lesson_defaults,
        }
    }

    /// 由配置组装；重试策略、图片尺寸或 HTTP 客户端非法时返回 InvalidConfig
    pub fn from_config(
        config: &AppConfig,
        backend: Arc<dyn GenerationBackend>,
    ) -> Result<Self, GenerationError> {
        let policy = RetryPolicy::from_config(&config.retry)?;
        Ok(Self::new(
            backend,
            PromptBuilder::from_config(config)?,
            RetryExecutor::new(policy),
            ArtifactStore::from_config(config)?,
            config.lesson.clone(),
        ))
    }

    /// 课程计划流程：prompt → 重试调用 → trim → 校验（仅警告）→ 保存 .txt/.md
    pub async fn produce_lesson_plan(
        &self,
        request: &LessonRequest,
    ) -> Result<LessonPlanResult, GenerationError> {
        let level = request
            .level
            .as_deref()
            .unwrap_or(&self.lesson_defaults.level);
        let duration = request
            .duration_minutes
            .unwrap_or(self.lesson_defaults.duration_minutes);

        let mut tracker = FlowTracker::start(Flow::LessonPlan);
        let messages = self
            .prompts
            .build_text_prompt(&request.topic, level, duration);

        tracker.advance(FlowStage::Requested);
        tracing::info!(topic = %request.topic.trim(), level, duration, "generating lesson plan");
        let backend = &self.backend;
        let messages = &messages;
        let raw = self
            .retry
            .execute(move || async move { backend.generate_text(messages).await })
            .await?;
        tracker.advance(FlowStage::Succeeded);

        let content = raw.trim().to_string();
        let validation = self.validator.report(&content);
        if validation.is_valid() {
            tracker.advance(FlowStage::Validated);
        } else {
            tracing::warn!(
                missing = ?validation.missing,
                "lesson plan does not follow the expected outline; consider retrying"
            );
        }

        let base_name = self.store.base_name(LESSON_PLAN_PREFIX);
        let files = self.store.save_text(&content, &base_name)?;
        tracker.advance(FlowStage::Persisted);

        Ok(LessonPlanResult {
            content,
            files,
            validation,
        })
    }

    /// 配图流程：prompt → 重试调用 → 内联优先，其次 URL，二者皆无则 MissingImageData
    pub async fn produce_illustration(
        &self,
        theme_description: &str,
    ) -> Result<IllustrationResult, GenerationError> {
        let mut tracker = FlowTracker::start(Flow::Illustration);
        let request = ImageRequest {
            prompt: self.prompts.build_image_prompt(theme_description),
            size: self.prompts.image_size().to_string(),
        };

        tracker.advance(FlowStage::Requested);
        tracing::info!(theme = %theme_description.trim(), size = %request.size, "generating illustration");
        let backend = &self.backend;
        let request = &request;
        let payload = self
            .retry
            .execute(move || async move { backend.generate_image(request).await })
            .await?;
        tracker.advance(FlowStage::Succeeded);

        let payload = payload.ok_or(GenerationError::MissingImageData)?;
        let base_name = self.store.base_name(LESSON_IMAGE_PREFIX);
        let result = match payload {
            ImagePayload::Inline(b64) => IllustrationResult {
                artifact: self.store.save_image_from_inline_bytes(&b64, &base_name)?,
                source: ImageSource::Inline,
            },
            ImagePayload::Remote(url) => IllustrationResult {
                artifact: self.store.download_image(&url, &base_name).await?,
                source: ImageSource::Remote,
            },
        };
        tracker.advance(FlowStage::Persisted);
        tracing::info!(source = ?result.source, path = %result.artifact.path.display(), "illustration saved");

        Ok(result)
    }
}
