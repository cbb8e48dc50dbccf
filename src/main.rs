//! 程序入口：初始化日志、读取配置、加载项目并输出覆盖率，可选执行单键修改并保存

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::fmt::SubscriberBuilder;

use lazyi18n::config::{self, ProjectConfig};
use lazyi18n::model::project::TranslationProject;
use lazyi18n::vm::bridge::*;

/// lazyi18n - 多语言 JSON 翻译文件的缺失键分析与编辑
#[derive(Parser, Debug)]
#[command(name = "lazyi18n")]
#[command(version)]
#[command(about = "多语言 JSON 翻译文件的缺失键分析与编辑", long_about = None)]
struct Args {
    /// 项目目录（包含每个语言一个 JSON 文件）
    dir: PathBuf,

    /// 配置文件路径（默认 <DIR>/.lazyi18n/config.toml）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 语言文件匹配模式，覆盖配置文件
    #[arg(long)]
    pattern: Option<String>,

    /// 写回时的缩进空格数，覆盖配置文件
    #[arg(long)]
    indent: Option<usize>,

    /// 要设置的键（需同时给出 --locale 和 --value）
    #[arg(long, requires_all = ["locale", "value"])]
    set: Option<String>,

    /// --set 的目标语言
    #[arg(long, requires = "set")]
    locale: Option<String>,

    /// --set 的新值
    #[arg(long, requires = "set")]
    value: Option<String>,

    /// 从所有语言中删除键
    #[arg(long)]
    delete: Option<String>,

    /// 列出所有缺失的键
    #[arg(long)]
    missing: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<ProjectConfig> {
    let mut config = match &args.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load_for_project(&args.dir)?,
    };
    if let Some(pattern) = &args.pattern {
        config.pattern = pattern.clone();
    }
    if let Some(indent) = args.indent {
        config.indent = indent;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志输出
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = SubscriberBuilder::default().with_max_level(level).try_init();

    let config = load_config(&args)?;
    let mut project = TranslationProject::open(&args.dir, config)
        .with_context(|| format!("无法打开项目: {}", args.dir.display()))?;
    println!("{}", STATUS_LOADED);

    for error in project.load_errors() {
        println!("{}{}", STATUS_ERROR_PREFIX, error);
    }

    if let (Some(key), Some(locale), Some(value)) = (&args.set, &args.locale, &args.value) {
        if !project.set_value(key, locale, value.as_str())? {
            tracing::info!("{} [{}] 的值未变化", key, locale);
        }
    }
    if let Some(key) = &args.delete {
        let removed = project.delete_key(key)?;
        tracing::info!("已从 {} 个语言中删除 {}", removed, key);
    }

    for row in coverage_rows(&project) {
        println!("{}", format_coverage_row(&row));
    }
    println!("{}", coverage_summary(project.coverage()));

    if args.missing {
        let gaps = gap_rows(project.gap_analysis());
        if gaps.is_empty() {
            println!("{}", STATUS_NO_GAPS);
        }
        for row in &gaps {
            println!("{}", format_gap_row(row));
        }
    }

    if project.has_unsaved_changes() {
        let report = project.save();
        println!("{}", save_status(&report));
        if !report.is_complete() {
            bail!("{} 个语言保存失败", report.failures.len());
        }
    }

    Ok(())
}
