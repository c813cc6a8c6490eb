//! PromptBuilder：确定性渲染课程计划与配图的结构化 prompt
//!
//! 两种 prompt 都由六个语义段依次拼接：Context、Role、Action、Format、Tone，再加上
//! 文本侧的 Constraints 或图片侧的主题与风格说明。纯函数，无 IO，便于测试。

use crate::config::{validate_image_size, AppConfig};
use crate::core::GenerationError;
use crate::prompt::Message;

/// 课程计划必须包含的章节标题（Format 段的骨架与 ContentValidator 共用）
pub const REQUIRED_SECTIONS: [&str; 6] = [
    "## Learning Objectives",
    "## Key Content",
    "## Activities",
    "## Formative Assessment",
    "## Materials & Resources",
    "## Accommodations",
];

/// 评估问题数量（写入 Format 与 Constraints 段）
const ASSESSMENT_QUESTIONS: u32 = 3;

const IMAGE_STYLE_GUIDE: &str = "Minimal, textbook-style educational illustration, neutral colors, \
clear lines, uncluttered composition, didactic tone, no text.";

/// 按总时长推导的课堂节奏（分钟），仅作为建议写入 prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPlan {
    pub opening: u32,
    pub core: u32,
    pub closing: u32,
}

impl PacingPlan {
    /// opening = max(5, d/5)，core = max(15, d/2)，closing = max(5, d/6)
    pub fn from_duration(duration_minutes: u32) -> Self {
        Self {
            opening: (duration_minutes / 5).max(5),
            core: (duration_minutes / 2).max(15),
            closing: (duration_minutes / 6).max(5),
        }
    }
}

/// Prompt 渲染器：持有 system prompt 与配图尺寸
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    image_size: String,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>, image_size: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            image_size: image_size.into(),
        }
    }

    /// 由配置构建；图片尺寸不受支持时返回 InvalidConfig
    pub fn from_config(config: &AppConfig) -> Result<Self, GenerationError> {
        let size = validate_image_size(&config.llm.image.size)?;
        Ok(Self::new(config.llm.system_prompt.clone(), size))
    }

    pub fn image_size(&self) -> &str {
        &self.image_size
    }

    /// 课程计划 prompt：[system, user]
    pub fn build_text_prompt(&self, topic: &str, level: &str, duration_minutes: u32) -> Vec<Message> {
        let topic = topic.trim();
        let pacing = PacingPlan::from_duration(duration_minutes);

        let segments = [
            text_context(topic, level, duration_minutes),
            format!("Role: You are an educational assistant specialised in lesson planning for {level}."),
            "Action: Write a complete lesson plan that can be applied in the classroom, with \
             feasible tasks and formative assessment."
                .to_string(),
            text_format(topic, pacing),
            "Tone: clear, inclusive, didactic and appropriate for the level. \
             Avoid unnecessary technical jargon."
                .to_string(),
            format!(
                "Constraints: coherent timings; {ASSESSMENT_QUESTIONS} assessment questions; \
                 include at least 1 accommodation; do not invent bibliography or links."
            ),
        ];

        vec![
            Message::system(self.system_prompt.clone()),
            Message::user(segments.join("\n")),
        ]
    }

    /// 配图 prompt：六段说明 + 主题 + 风格
    pub fn build_image_prompt(&self, theme_description: &str) -> String {
        let context = "Context: Educational material to accompany a lesson plan.";
        let role = "Role: You are an assistant that designs neutral, didactic illustrations.";
        let action = "Action: Generate a clean, uncluttered illustration that helps students \
                      understand the theme without including any text.";
        let format = format!(
            "Format: {} PNG. Composition centered, clear lines, minimal elements.",
            self.image_size
        );
        let tone = "Tone: neutral, textbook-style, suitable for classroom use.";

        format!(
            "{context}\n{role}\n{action}\n{format}\n{tone}\n\n\
             Theme/subject: {}\n\n\
             Style guide: {IMAGE_STYLE_GUIDE}",
            theme_description.trim()
        )
    }
}

fn text_context(topic: &str, level: &str, duration_minutes: u32) -> String {
    format!(
        "Context: {level} class on \"{topic}\" with a total duration of {duration_minutes} \
         minutes in a standard classroom, without special equipment."
    )
}

/// Format 段：字面章节骨架，Activities 下写入三个时间分配
fn text_format(topic: &str, pacing: PacingPlan) -> String {
    let [objectives, key_content, activities, assessment, materials, accommodations] =
        REQUIRED_SECTIONS;
    format!(
        "Format: Answer in Markdown strictly following this outline:\n\n\
         # Lesson plan: {topic}\n\
         {objectives}\n\
         {key_content}\n\
         {activities}\n\
         - Opening (~{} min):\n\
         - Core (~{} min):\n\
         - Closing (~{} min):\n\
         {assessment} ({ASSESSMENT_QUESTIONS} questions)\n\
         {materials}\n\
         {accommodations}\n",
        pacing.opening, pacing.core, pacing.closing
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Role;

    fn builder() -> PromptBuilder {
        PromptBuilder::new("You plan lessons.", "1024x1024")
    }

    #[test]
    fn test_pacing_floors() {
        assert_eq!(
            PacingPlan::from_duration(40),
            PacingPlan { opening: 8, core: 20, closing: 6 }
        );
        assert_eq!(
            PacingPlan::from_duration(10),
            PacingPlan { opening: 5, core: 15, closing: 5 }
        );
        assert_eq!(
            PacingPlan::from_duration(90),
            PacingPlan { opening: 18, core: 45, closing: 15 }
        );
    }

    #[test]
    fn test_text_prompt_embeds_pacing_literally() {
        let messages = builder().build_text_prompt("Photosynthesis", "Secondary", 40);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You plan lessons.");

        let user = &messages[1].content;
        assert_eq!(messages[1].role, Role::User);
        assert!(user.contains("Opening (~8 min)"));
        assert!(user.contains("Core (~20 min)"));
        assert!(user.contains("Closing (~6 min)"));
        assert!(user.contains("# Lesson plan: Photosynthesis"));
        assert!(user.contains("40 minutes"));
    }

    #[test]
    fn test_text_prompt_segment_order_and_skeleton() {
        let messages = builder().build_text_prompt("  Fractions ", "Primary", 45);
        let user = &messages[1].content;

        let order = ["Context:", "Role:", "Action:", "Format:", "Tone:", "Constraints:"];
        let positions: Vec<usize> = order.iter().map(|s| user.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        for section in REQUIRED_SECTIONS {
            assert!(user.contains(section), "missing {section}");
        }
        assert!(user.contains("(3 questions)"));
        assert!(user.contains("\"Fractions\""));
        assert!(user.contains("at least 1 accommodation"));
    }

    #[test]
    fn test_text_prompt_is_deterministic() {
        let b = builder();
        assert_eq!(
            b.build_text_prompt("Volcanoes", "Secondary", 50),
            b.build_text_prompt("Volcanoes", "Secondary", 50)
        );
    }

    #[test]
    fn test_from_config_rejects_unsupported_image_size() {
        let mut config = AppConfig::default();
        config.llm.image.size = "512x512".to_string();
        assert_eq!(PromptBuilder::from_config(&config).unwrap().image_size(), "512x512");

        config.llm.image.size = "1792x1024".to_string();
        assert!(matches!(
            PromptBuilder::from_config(&config),
            Err(GenerationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_image_prompt_layout() {
        let prompt = builder().build_image_prompt(" water cycle: evaporation, condensation ");
        assert!(prompt.starts_with("Context:"));
        assert!(prompt.contains("without including any text"));
        assert!(prompt.contains("Format: 1024x1024 PNG"));
        assert!(prompt.contains("Theme/subject: water cycle: evaporation, condensation\n"));
        assert!(prompt.ends_with(IMAGE_STYLE_GUIDE));
        assert!(prompt.find("Tone:").unwrap() < prompt.find("Theme/subject:").unwrap());
    }
}
