//! 多语言翻译数据引擎
//!
//! 提供语言文件发现与加载、嵌套树与扁平键的互转、缺失键与覆盖率分析，
//! 以及带备份的原子回写。所有修改只在内存中进行，直到显式保存。

pub mod config;
pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use config::ProjectConfig;
pub use model::analyzer::{CoverageReport, GapAnalysis, LocaleCoverage, MissingPolicy, TranslationGap};
pub use model::loader::LocaleFile;
pub use model::project::{ProjectChange, ProjectError, SaveReport, TranslationProject};
pub use model::tree_codec::{flatten, unflatten, FlatMap, Scalar, TreeNode};
pub use model::writer::AtomicWriter;
