//! Lessonsmith - Rust 教案生成器
//!
//! 模块划分：
//! - **artifact**: 产物落盘（.txt / .md / .png，临时文件 + rename）
//! - **config**: 应用配置加载（TOML + 环境变量）与 API Key 解析
//! - **core**: 错误类型、重试退避、结构校验、流程状态、生成编排器
//! - **llm**: 生成后端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 日志初始化
//! - **prompt**: 消息类型与结构化 prompt 渲染

pub mod artifact;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod prompt;

pub use crate::core::{GenerationError, GenerationOrchestrator, LessonRequest};
