//! ContentValidator：课程计划的章节结构校验
//!
//! 只检查六个必需章节标题是否原样出现（顺序不限），不判断内容质量。
//! 校验失败只是提示，编排器记录警告后照常落盘。

use crate::prompt::REQUIRED_SECTIONS;

/// 校验报告：缺失的章节标题（为空即通过）
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationReport {
    pub missing: Vec<&'static str>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContentValidator;

impl ContentValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_text_schema(&self, document: &str) -> bool {
        self.report(document).is_valid()
    }

    pub fn report(&self, document: &str) -> ValidationReport {
        ValidationReport {
            missing: REQUIRED_SECTIONS
                .iter()
                .copied()
                .filter(|section| !document.contains(section))
                .collect(),
        }
    }
}
