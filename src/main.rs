//! Lessonsmith - 命令行入口
//!
//! 初始化日志、加载配置与 API Key，先生成课程计划，再（可选）生成配图。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dialoguer::Input;
use lessonsmith::config::{load_config, resolve_api_key, AppConfig};
use lessonsmith::llm::OpenAiBackend;
use lessonsmith::{observability, GenerationOrchestrator, LessonRequest};

/// Lessonsmith - 生成课程计划与配图
#[derive(Parser, Debug)]
#[command(name = "lessonsmith")]
#[command(about = "Generate a lesson plan and an illustration with an OpenAI-compatible backend")]
struct Cli {
    /// Configuration file path (merged over config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lesson topic (asked interactively when omitted)
    #[arg(long)]
    topic: Option<String>,

    /// Concepts/theme for the illustration (asked interactively when omitted)
    #[arg(long)]
    theme: Option<String>,

    /// Education level, e.g. Primary or Secondary
    #[arg(long)]
    level: Option<String>,

    /// Total lesson duration in minutes
    #[arg(long)]
    duration: Option<u32>,

    /// Only generate the lesson plan
    #[arg(long, default_value = "false")]
    skip_image: bool,

    /// Print result descriptors as JSON instead of text
    #[arg(long, default_value = "false")]
    json: bool,
}

fn ask(prompt: &str, given: Option<String>) -> anyhow::Result<String> {
    match given {
        Some(v) => Ok(v.trim().to_string()),
        None => {
            let v: String = Input::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .context("Failed to read input")?;
            Ok(v.trim().to_string())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let api_key = match resolve_api_key() {
        Ok(key) => key,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let backend = Arc::new(OpenAiBackend::new(&cfg.llm, &api_key).context("Invalid configuration")?);
    let orchestrator =
        GenerationOrchestrator::from_config(&cfg, backend).context("Invalid configuration")?;

    // 1) 课程计划
    let topic = ask("Topic for the lesson plan", cli.topic)?;
    if topic.is_empty() {
        eprintln!("❌ A topic is required.");
        std::process::exit(1);
    }

    let mut request = LessonRequest::new(topic);
    if let Some(level) = cli.level {
        request = request.level(level);
    }
    if let Some(duration) = cli.duration {
        request = request.duration_minutes(duration);
    }

    let plan = match orchestrator.produce_lesson_plan(&request).await {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("❌ Error generating the lesson plan: {e}");
            std::process::exit(1);
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("\n--- Lesson plan (Markdown) ---\n");
        println!("{}", plan.content);
        let dir = plan
            .files
            .text
            .path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        println!("\n✅ Plan saved in: {}", dir.display());
    }

    // 2) 配图
    if cli.skip_image {
        return Ok(());
    }
    let theme = ask("Concepts/theme for the lesson image", cli.theme)?;
    if theme.is_empty() {
        println!("ℹ️ Skipping image generation (no concepts entered).");
        return Ok(());
    }

    match orchestrator.produce_illustration(&theme).await {
        Ok(image) if cli.json => println!("{}", serde_json::to_string_pretty(&image)?),
        Ok(image) => println!("\n✅ Image saved at: {}", image.artifact.path.display()),
        Err(e) => eprintln!("❌ Error generating the image: {e}"),
    }

    Ok(())
}
