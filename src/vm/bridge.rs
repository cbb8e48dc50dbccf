//! VM桥接层：把 TranslationProject 的分析结果投影为展示用的行
//!
//! 这里不做任何终端输出，调用方（CLI 或 UI）自行渲染。

use crate::model::analyzer::{CoverageReport, GapAnalysis};
use crate::model::project::{SaveReport, TranslationProject};

// === 常量定义（消除魔法值） ===
pub const STATUS_LOADED: &str = "项目加载完成";
pub const STATUS_SAVED: &str = "保存成功";
pub const STATUS_PARTIAL_SAVE: &str = "部分语言保存失败";
pub const STATUS_NOTHING_TO_SAVE: &str = "没有需要保存的修改";
pub const STATUS_NO_GAPS: &str = "所有键均已翻译";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";

/// 覆盖率表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRow {
    pub locale: String,
    pub present: usize,
    pub total: usize,
    pub percent: u32,
    /// 有未保存的修改
    pub dirty: bool,
}

/// 缺口列表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapRow {
    pub key: String,
    pub missing_in: String,
    pub present_in: String,
}

pub fn coverage_rows(project: &TranslationProject) -> Vec<CoverageRow> {
    project
        .coverage()
        .locales
        .iter()
        .map(|c| CoverageRow {
            locale: c.locale.clone(),
            present: c.present,
            total: c.total,
            percent: c.percent(),
            dirty: project.locale(&c.locale).is_some_and(|f| f.dirty),
        })
        .collect()
}

pub fn gap_rows(analysis: &GapAnalysis) -> Vec<GapRow> {
    analysis
        .gaps
        .iter()
        .map(|g| GapRow {
            key: g.key.clone(),
            missing_in: g.missing_in.join(", "),
            present_in: g.present_in.join(", "),
        })
        .collect()
}

/// 文本进度条，例如 `[#######---] 67%`
pub fn progress_bar(percent: u32, width: usize) -> String {
    let filled = (percent.min(100) as usize * width + 50) / 100;
    format!("[{}{}] {:>3}%", "#".repeat(filled), "-".repeat(width - filled), percent)
}

pub fn format_coverage_row(row: &CoverageRow) -> String {
    format!(
        "{:<8} {} {:>6}/{:<6}{}",
        row.locale,
        progress_bar(row.percent, 20),
        row.present,
        row.total,
        if row.dirty { " *" } else { "" }
    )
}

/// 覆盖率汇总行
pub fn coverage_summary(report: &CoverageReport) -> String {
    format!(
        "{} 个语言，{} 个键，{} 个完整，总体覆盖率 {}%",
        report.locales.len(),
        report.total_keys,
        report.complete_keys,
        report.overall_percent()
    )
}

pub fn format_gap_row(row: &GapRow) -> String {
    format!("{}  缺失: {}", row.key, row.missing_in)
}

pub fn save_status(report: &SaveReport) -> String {
    if !report.is_complete() {
        let errors: Vec<String> = report.failures.iter().map(|e| e.to_string()).collect();
        format!("{}: {}", STATUS_PARTIAL_SAVE, errors.join("; "))
    } else if report.written.is_empty() {
        STATUS_NOTHING_TO_SAVE.to_string()
    } else {
        format!("{}: {}", STATUS_SAVED, report.written.join(", "))
    }
}
