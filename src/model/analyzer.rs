//! 缺口分析：缺失键与各语言覆盖率
//!
//! 键全集严格等于所有语言扁平键的并集，不会凭空增加或丢失键。
//! 复数/上下文后缀键（如 `item_one` / `item_other`）按独立键处理。

use indexmap::IndexSet;
use serde::Deserialize;

use crate::model::loader::LocaleFile;
use crate::model::tree_codec::Scalar;

/// 什么算作"缺失"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// 只有键不存在才算缺失
    Absent,
    /// 键不存在或值为空字符串
    #[default]
    AbsentOrEmpty,
    /// 键不存在或值只含空白
    AbsentOrBlank,
}

impl MissingPolicy {
    pub fn is_missing(self, value: Option<&Scalar>) -> bool {
        match (self, value) {
            (_, None) => true,
            (MissingPolicy::Absent, Some(_)) => false,
            (MissingPolicy::AbsentOrEmpty, Some(v)) => v.as_str().is_some_and(str::is_empty),
            (MissingPolicy::AbsentOrBlank, Some(v)) => {
                v.as_str().is_some_and(|s| s.trim().is_empty())
            }
        }
    }
}

/// 至少在一个语言中缺失的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationGap {
    pub key: String,
    pub missing_in: Vec<String>,
    pub present_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleCoverage {
    pub locale: String,
    /// 存在且非空的键数
    pub present: usize,
    /// 键全集大小
    pub total: usize,
}

impl LocaleCoverage {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.present as f64 / self.total as f64
        }
    }

    /// 四舍五入（半数进位）到整数百分比，用于展示
    pub fn percent(&self) -> u32 {
        round_percent(self.present, self.total)
    }
}

fn round_percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 100;
    }
    ((part * 200 + whole) / (whole * 2)) as u32
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    /// 按语言代码排序
    pub locales: Vec<LocaleCoverage>,
    pub total_keys: usize,
    /// 在所有语言中都存在且非空的键数
    pub complete_keys: usize,
    /// 所有 语言×键 单元格中存在且非空的数量
    pub present_cells: usize,
}

impl CoverageReport {
    pub fn get(&self, locale: &str) -> Option<&LocaleCoverage> {
        self.locales.iter().find(|c| c.locale == locale)
    }

    pub fn overall_percent(&self) -> u32 {
        round_percent(self.present_cells, self.total_keys * self.locales.len())
    }
}

/// 一次完整分析的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapAnalysis {
    /// 键全集，按首次出现顺序
    pub keys: Vec<String>,
    pub gaps: Vec<TranslationGap>,
    pub coverage: CoverageReport,
}

impl GapAnalysis {
    pub fn gap_for(&self, key: &str) -> Option<&TranslationGap> {
        self.gaps.iter().find(|g| g.key == key)
    }

    pub fn missing_keys_for(&self, locale: &str) -> Vec<&str> {
        self.gaps
            .iter()
            .filter(|g| g.missing_in.iter().any(|l| l == locale))
            .map(|g| g.key.as_str())
            .collect()
    }

    /// 没有任何缺口的键
    pub fn complete_keys(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|k| self.gap_for(k).is_none())
            .map(String::as_str)
            .collect()
    }
}

/// 计算缺口与覆盖率，代价 O(键数 × 语言数)
pub fn compute<'a, I>(locales: I, policy: MissingPolicy) -> GapAnalysis
where
    I: IntoIterator<Item = &'a LocaleFile>,
{
    let mut files: Vec<&LocaleFile> = locales.into_iter().collect();
    files.sort_by(|a, b| a.locale.cmp(&b.locale));

    let mut universe: IndexSet<&str> = IndexSet::new();
    for file in &files {
        universe.extend(file.entries.keys());
    }

    let mut present_counts = vec![0usize; files.len()];
    let mut gaps = Vec::new();
    let mut complete_keys = 0;

    for key in &universe {
        let mut missing_in = Vec::new();
        let mut present_in = Vec::new();
        for (idx, file) in files.iter().enumerate() {
            if policy.is_missing(file.entries.get(key)) {
                missing_in.push(file.locale.clone());
            } else {
                present_counts[idx] += 1;
                present_in.push(file.locale.clone());
            }
        }
        if missing_in.is_empty() {
            complete_keys += 1;
        } else {
            gaps.push(TranslationGap {
                key: key.to_string(),
                missing_in,
                present_in,
            });
        }
    }

    let total = universe.len();
    let coverage = CoverageReport {
        locales: files
            .iter()
            .zip(&present_counts)
            .map(|(file, present)| LocaleCoverage {
                locale: file.locale.clone(),
                present: *present,
                total,
            })
            .collect(),
        total_keys: total,
        complete_keys,
        present_cells: present_counts.iter().sum(),
    };

    GapAnalysis {
        keys: universe.into_iter().map(str::to_string).collect(),
        gaps,
        coverage,
    }
}
