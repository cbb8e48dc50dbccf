//! 项目配置：缩进、文件匹配模式、缺失判定策略、备份开关、期望的语言列表
//!
//! 从项目目录下的 `.lazyi18n/config.toml` 读取，文件不存在时使用默认值。
//!
//! ```toml
//! indent = 4
//! pattern = "locales/*.json"
//! missing = "absent-or-blank"
//! backup = true
//! locales = ["en", "de", "fr"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::analyzer::MissingPolicy;
use crate::model::loader::DEFAULT_PATTERN;
use crate::model::project::ProjectError;
use crate::model::writer::DEFAULT_INDENT;

const CONFIG_DIR: &str = ".lazyi18n";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// 写回时的缩进空格数（0 为紧凑输出）
    pub indent: usize,
    /// 相对项目根目录的 glob
    pub pattern: String,
    pub missing: MissingPolicy,
    /// 写入前是否保留 `.bak` 备份
    pub backup: bool,
    /// 必须存在的语言；没有文件时以空语言创建
    pub locales: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            pattern: DEFAULT_PATTERN.to_string(),
            missing: MissingPolicy::default(),
            backup: true,
            locales: Vec::new(),
        }
    }
}

pub fn local_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(CONFIG_FILE)
}

pub fn load_from_path(path: &Path) -> Result<ProjectConfig, ProjectError> {
    let to_config_error = |cause: String| ProjectError::Config {
        path: path.to_path_buf(),
        cause,
    };
    let content = fs::read_to_string(path).map_err(|e| to_config_error(e.to_string()))?;
    toml::from_str(&content).map_err(|e| to_config_error(e.to_string()))
}

/// 读取项目本地配置，没有配置文件时返回默认值
pub fn load_for_project(root: &Path) -> Result<ProjectConfig, ProjectError> {
    let path = local_config_path(root);
    if path.exists() {
        tracing::info!("使用项目配置: {}", path.display());
        load_from_path(&path)
    } else {
        Ok(ProjectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();

        let config = load_for_project(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.indent, 2);
        assert_eq!(config.pattern, "**/*.json");
        assert_eq!(config.missing, MissingPolicy::AbsentOrEmpty);
        assert!(config.backup);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = local_config_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "indent = 4\nmissing = \"absent\"\nlocales = [\"en\", \"fr\"]\n").unwrap();

        let config = load_for_project(dir.path()).unwrap();
        assert_eq!(config.indent, 4);
        assert_eq!(config.missing, MissingPolicy::Absent);
        assert_eq!(config.locales, vec!["en", "fr"]);
        assert_eq!(config.pattern, DEFAULT_PATTERN, "未设置的字段使用默认值");
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "indent = \"wide\"\n").unwrap();

        match load_from_path(&path) {
            Err(ProjectError::Config { path: p, .. }) => assert_eq!(p, path),
            other => panic!("应该返回配置错误，实际: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "indnet = 4\n").unwrap();

        assert!(load_from_path(&path).is_err(), "拼写错误的字段应被拒绝");
    }
}
