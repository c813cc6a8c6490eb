//! Prompt 层：消息类型与结构化 prompt 渲染（课程计划 / 配图）

pub mod builder;
pub mod message;

pub use builder::{PacingPlan, PromptBuilder, REQUIRED_SECTIONS};
pub use message::{Message, Role};
