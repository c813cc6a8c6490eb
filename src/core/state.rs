//! 流程状态：每个生成流程按 Built → Requested → Succeeded → [Validated] → Persisted 单向推进
//!
//! 任一致命错误都会在 Persisted 之前结束流程；状态只用于日志与结果描述。

use std::fmt;

use serde::Serialize;

/// 两个独立流程
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    LessonPlan,
    Illustration,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::LessonPlan => write!(f, "lesson_plan"),
            Flow::Illustration => write!(f, "illustration"),
        }
    }
}

/// 流程阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum FlowStage {
    Built,
    Requested,
    Succeeded,
    Validated,
    Persisted,
}

/// 单个流程的阶段记录：只允许向前推进
#[derive(Debug)]
pub struct FlowTracker {
    flow: Flow,
    stage: FlowStage,
}

impl FlowTracker {
    pub fn start(flow: Flow) -> Self {
        tracing::debug!(flow = %flow, stage = ?FlowStage::Built, "flow stage");
        Self {
            flow,
            stage: FlowStage::Built,
        }
    }

    pub fn advance(&mut self, next: FlowStage) {
        debug_assert!(next > self.stage, "flow stages only move forward");
        self.stage = next;
        tracing::debug!(flow = %self.flow, stage = ?next, "flow stage");
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }
}
