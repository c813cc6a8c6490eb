//! 核心编排层：错误类型、重试执行、结构校验、流程状态与编排器

pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod state;
pub mod validator;

pub use error::GenerationError;
pub use orchestrator::{
    GenerationOrchestrator, IllustrationResult, ImageSource, LessonPlanResult, LessonRequest,
    LESSON_IMAGE_PREFIX, LESSON_PLAN_PREFIX,
};
pub use retry::{RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
pub use state::{Flow, FlowStage, FlowTracker};
pub use validator::{ContentValidator, ValidationReport};
