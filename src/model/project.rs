//! TranslationProject：多语言翻译项目的核心状态
//!
//! 持有所有已加载语言的扁平映射与修改日志，修改只在内存中进行，
//! 直到显式 `save()` 才通过原子写入落盘。单线程、同步，不是全局单例。

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ProjectConfig;
use crate::model::analyzer::{self, CoverageReport, GapAnalysis};
use crate::model::loader::{self, is_locale_code, LocaleFile};
use crate::model::tree_codec::{validate_key, Scalar};
use crate::model::writer::AtomicWriter;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("读取失败 {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON解析失败 {}: {cause}", path.display())]
    Parse { path: PathBuf, cause: String },
    #[error("非法键 '{key}': {reason}")]
    MalformedKey { key: String, reason: String },
    #[error("键已存在: {key}")]
    DuplicateKey { key: String },
    #[error("未知语言: {locale}")]
    UnknownLocale { locale: String },
    #[error("无法创建语言 '{locale}': {reason}")]
    InvalidLocale { locale: String, reason: String },
    #[error("写入失败 [{locale}] {}: {source}", path.display())]
    Write {
        locale: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("存在未保存的修改: {}", locales.join(", "))]
    StaleState { locales: Vec<String> },
    #[error("配置错误 {}: {cause}", path.display())]
    Config { path: PathBuf, cause: String },
    #[error("文件匹配模式无效 '{pattern}': {cause}")]
    Pattern { pattern: String, cause: String },
}

/// 一次修改记录；`None` 表示键不存在（新建前 / 删除后）
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectChange {
    pub key: String,
    pub locale: String,
    pub previous: Option<Scalar>,
    pub new: Option<Scalar>,
}

/// `save()` 的结果：成功写入的语言与失败的错误
#[derive(Debug, Default)]
pub struct SaveReport {
    pub written: Vec<String>,
    pub failures: Vec<ProjectError>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct TranslationProject {
    root: PathBuf,
    config: ProjectConfig,
    writer: AtomicWriter,
    locales: BTreeMap<String, LocaleFile>,
    changes: Vec<ProjectChange>,
    load_errors: Vec<ProjectError>,
    /// 缺口分析缓存；键增删或值的空/非空状态变化时失效
    analysis: OnceCell<GapAnalysis>,
}

impl TranslationProject {
    /// 打开项目目录并加载全部语言文件
    pub fn open(root: impl Into<PathBuf>, config: ProjectConfig) -> Result<Self, ProjectError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ProjectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("目录不存在: {}", root.display()),
            )));
        }
        let mut project = Self {
            writer: AtomicWriter::from_config(&config),
            root,
            config,
            locales: BTreeMap::new(),
            changes: Vec::new(),
            load_errors: Vec::new(),
            analysis: OnceCell::new(),
        };
        project.load_from_disk()?;
        Ok(project)
    }

    /// 从磁盘重建全部状态；发现阶段失败时保留原状态
    fn load_from_disk(&mut self) -> Result<(), ProjectError> {
        let outcome = loader::load_all(&self.root, &self.config.pattern, &self.config.locales)?;
        self.locales = outcome.locales;
        self.load_errors = outcome.failures;
        self.changes.clear();
        self.invalidate_analysis();

        let analysis = self.gap_analysis();
        tracing::info!(
            "项目加载完成: {} 个语言，{} 个键，{} 个缺口，{} 个文件失败",
            analysis.coverage.locales.len(),
            analysis.keys.len(),
            analysis.gaps.len(),
            self.load_errors.len()
        );
        Ok(())
    }

    fn invalidate_analysis(&mut self) {
        self.analysis.take();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// 语言代码（排序）
    pub fn locales(&self) -> Vec<&str> {
        self.locales.keys().map(String::as_str).collect()
    }

    pub fn locale(&self, locale: &str) -> Option<&LocaleFile> {
        self.locales.get(locale)
    }

    /// 最近一次加载中失败的文件
    pub fn load_errors(&self) -> &[ProjectError] {
        &self.load_errors
    }

    /// 所有语言键的并集，按首次出现顺序
    pub fn keys(&self) -> Vec<&str> {
        self.gap_analysis().keys.iter().map(String::as_str).collect()
    }

    pub fn value(&self, key: &str, locale: &str) -> Option<&Scalar> {
        self.locales.get(locale)?.entries.get(key)
    }

    pub fn gap_analysis(&self) -> &GapAnalysis {
        self.analysis
            .get_or_init(|| analyzer::compute(self.locales.values(), self.config.missing))
    }

    pub fn coverage(&self) -> &CoverageReport {
        &self.gap_analysis().coverage
    }

    /// 设置某语言下键的值；值未变化时不记录修改，返回 false
    pub fn set_value(
        &mut self,
        key: &str,
        locale: &str,
        value: impl Into<Scalar>,
    ) -> Result<bool, ProjectError> {
        validate_key(key)?;
        let policy = self.config.missing;
        let file = self
            .locales
            .get_mut(locale)
            .ok_or_else(|| ProjectError::UnknownLocale {
                locale: locale.to_string(),
            })?;

        let value = value.into();
        let previous = file.entries.get(key).cloned();
        if previous.as_ref() == Some(&value) {
            return Ok(false);
        }
        if previous.is_none() {
            if let Some(conflict) = file.entries.conflicting_key(key) {
                return Err(ProjectError::MalformedKey {
                    key: key.to_string(),
                    reason: format!("与 {} 中已有的键 '{}' 结构冲突", locale, conflict),
                });
            }
        }

        let structure_changed = previous.is_none()
            || policy.is_missing(previous.as_ref()) != policy.is_missing(Some(&value));
        file.entries.insert(key.to_string(), value.clone());
        file.dirty = true;
        self.changes.push(ProjectChange {
            key: key.to_string(),
            locale: locale.to_string(),
            previous,
            new: Some(value),
        });
        if structure_changed {
            self.invalidate_analysis();
        }
        tracing::debug!("修改 {} [{}]", key, locale);
        Ok(true)
    }

    /// 从所有语言中删除键，返回实际删除的语言数
    pub fn delete_key(&mut self, key: &str) -> Result<usize, ProjectError> {
        validate_key(key)?;
        let mut removed = 0;
        for file in self.locales.values_mut() {
            if let Some(previous) = file.entries.remove(key) {
                file.dirty = true;
                self.changes.push(ProjectChange {
                    key: key.to_string(),
                    locale: file.locale.clone(),
                    previous: Some(previous),
                    new: None,
                });
                removed += 1;
            }
        }
        if removed > 0 {
            self.invalidate_analysis();
            tracing::debug!("删除键 {}（{} 个语言）", key, removed);
        }
        Ok(removed)
    }

    /// 在所有语言中新建键；未给出值的语言使用空字符串
    pub fn create_key<I, L, V>(&mut self, key: &str, values: I) -> Result<(), ProjectError>
    where
        I: IntoIterator<Item = (L, V)>,
        L: Into<String>,
        V: Into<Scalar>,
    {
        validate_key(key)?;
        if self.locales.values().any(|f| f.entries.contains_key(key)) {
            return Err(ProjectError::DuplicateKey {
                key: key.to_string(),
            });
        }
        let mut values: BTreeMap<String, Scalar> = values
            .into_iter()
            .map(|(l, v)| (l.into(), v.into()))
            .collect();
        if let Some(unknown) = values.keys().find(|l| !self.locales.contains_key(*l)) {
            return Err(ProjectError::UnknownLocale {
                locale: unknown.clone(),
            });
        }
        for file in self.locales.values() {
            if let Some(conflict) = file.entries.conflicting_key(key) {
                return Err(ProjectError::MalformedKey {
                    key: key.to_string(),
                    reason: format!("与 {} 中已有的键 '{}' 结构冲突", file.locale, conflict),
                });
            }
        }

        for file in self.locales.values_mut() {
            let value = values
                .remove(&file.locale)
                .unwrap_or_else(|| Scalar::String(String::new()));
            file.entries.insert(key.to_string(), value.clone());
            file.dirty = true;
            self.changes.push(ProjectChange {
                key: key.to_string(),
                locale: file.locale.clone(),
                previous: None,
                new: Some(value),
            });
        }
        self.invalidate_analysis();
        tracing::debug!("新建键 {}", key);
        Ok(())
    }

    /// 新建一个空语言（保存时创建文件）
    pub fn add_locale(&mut self, locale: &str) -> Result<(), ProjectError> {
        let invalid = |reason: &str| ProjectError::InvalidLocale {
            locale: locale.to_string(),
            reason: reason.to_string(),
        };
        if !is_locale_code(locale) {
            return Err(invalid("不是有效的语言代码"));
        }
        if self.locales.contains_key(locale) {
            return Err(invalid("语言已存在"));
        }
        let dir = self
            .locales
            .values()
            .find_map(|f| f.path.parent())
            .unwrap_or(self.root.as_path())
            .to_path_buf();
        let mut file = LocaleFile::empty(locale, dir.join(format!("{}.json", locale)));
        file.dirty = true;
        self.locales.insert(locale.to_string(), file);
        self.invalidate_analysis();
        tracing::info!("新建语言 {}", locale);
        Ok(())
    }

    /// 撤销某个键的全部未保存修改，返回是否有修改被撤销
    ///
    /// 每个语言恢复到该键第一条修改之前的值。恢复的叶子若与之后新建的键结构冲突
    /// （例如删除 `a.b` 后又新建了 `a.b.c`），返回 `MalformedKey` 且不做任何修改。
    pub fn discard_key_changes(&mut self, key: &str) -> Result<bool, ProjectError> {
        let mut restore: BTreeMap<&str, Option<&Scalar>> = BTreeMap::new();
        for change in self.changes.iter().filter(|c| c.key == key) {
            restore
                .entry(change.locale.as_str())
                .or_insert(change.previous.as_ref());
        }
        if restore.is_empty() {
            return Ok(false);
        }
        for (locale, previous) in &restore {
            let Some(file) = self.locales.get(*locale) else {
                continue;
            };
            if previous.is_none() || file.entries.contains_key(key) {
                continue;
            }
            if let Some(conflict) = file.entries.conflicting_key(key) {
                return Err(ProjectError::MalformedKey {
                    key: key.to_string(),
                    reason: format!("无法恢复：与 {} 中的键 '{}' 结构冲突", locale, conflict),
                });
            }
        }
        let restore: Vec<(String, Option<Scalar>)> = restore
            .into_iter()
            .map(|(locale, previous)| (locale.to_string(), previous.cloned()))
            .collect();

        self.changes.retain(|c| c.key != key);
        for (locale, previous) in restore {
            let still_changed = self.changes.iter().any(|c| c.locale == locale);
            let Some(file) = self.locales.get_mut(&locale) else {
                continue;
            };
            match previous {
                Some(previous) => {
                    file.entries.insert(key.to_string(), previous);
                }
                None => {
                    file.entries.remove(key);
                }
            }
            // 新建语言在第一次保存前始终是脏的
            if file.on_disk {
                file.dirty = still_changed;
            }
        }
        self.invalidate_analysis();
        tracing::debug!("撤销键 {} 的修改", key);
        Ok(true)
    }

    /// 写入成功后清除该语言的脏标记和修改记录
    fn mark_saved(&mut self, locale: &str) {
        if let Some(file) = self.locales.get_mut(locale) {
            file.dirty = false;
            file.on_disk = true;
        }
        self.changes.retain(|c| c.locale != locale);
    }

    /// 保存所有脏语言；只清除写入成功的语言的脏标记和修改记录
    pub fn save(&mut self) -> SaveReport {
        let results = self.writer.write_all(self.locales.values());
        let mut report = SaveReport::default();
        for (locale, result) in results {
            match result {
                Ok(()) => {
                    self.mark_saved(&locale);
                    report.written.push(locale);
                }
                Err(e) => report.failures.push(e),
            }
        }
        if !report.written.is_empty() || !report.failures.is_empty() {
            tracing::info!(
                "保存完成: {} 个成功，{} 个失败",
                report.written.len(),
                report.failures.len()
            );
        }
        report
    }

    /// 只保存一个语言；没有修改时不写盘。失败时保留脏标记和修改记录
    pub fn save_locale(&mut self, locale: &str) -> Result<(), ProjectError> {
        let file = self
            .locales
            .get(locale)
            .ok_or_else(|| ProjectError::UnknownLocale {
                locale: locale.to_string(),
            })?;
        if !file.dirty {
            tracing::debug!("语言 {} 没有需要保存的修改", locale);
            return Ok(());
        }
        self.writer.write(file)?;
        self.mark_saved(locale);
        Ok(())
    }

    /// 从磁盘重新加载；有未保存修改且未强制时拒绝
    pub fn reload(&mut self, force: bool) -> Result<(), ProjectError> {
        if self.has_unsaved_changes() && !force {
            return Err(ProjectError::StaleState {
                locales: self.unsaved_locales().into_iter().map(str::to_string).collect(),
            });
        }
        if force && self.has_unsaved_changes() {
            tracing::warn!("强制重新加载，丢弃 {} 条未保存修改", self.changes.len());
        }
        self.load_from_disk()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.locales.values().any(|f| f.dirty)
    }

    pub fn unsaved_locales(&self) -> Vec<&str> {
        self.locales
            .values()
            .filter(|f| f.dirty)
            .map(|f| f.locale.as_str())
            .collect()
    }

    /// 修改日志（按发生顺序）
    pub fn changes(&self) -> &[ProjectChange] {
        &self.changes
    }

    pub fn changed_keys(&self) -> BTreeSet<&str> {
        self.changes.iter().map(|c| c.key.as_str()).collect()
    }

    #[cfg(test)]
    fn analysis_cached(&self) -> bool {
        self.analysis.get().is_some()
    }

    #[cfg(test)]
    pub(crate) fn set_writer(&mut self, writer: AtomicWriter) {
        self.writer = writer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fs::WriteStage;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    /// 创建带 en / de 两个语言的临时项目目录
    fn sample_project() -> (TempDir, TranslationProject) {
        let dir = tempdir().expect("创建临时目录失败");
        fs::write(
            dir.path().join("en.json"),
            r#"{"auth": {"login": "Sign In", "logout": "Sign Out"}, "dashboard": {"welcome": "Welcome"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("de.json"),
            r#"{"auth": {"login": "Anmelden"}, "dashboard": {"welcome": "Willkommen"}}"#,
        )
        .unwrap();
        let project = TranslationProject::open(dir.path(), ProjectConfig::default()).expect("打开项目失败");
        (dir, project)
    }

    fn read(dir: &TempDir, name: &str) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(dir.path().join(name)).unwrap()).unwrap()
    }

    #[test]
    fn test_open_and_query() {
        let (_dir, project) = sample_project();

        assert_eq!(project.locales(), vec!["de", "en"]);
        assert_eq!(
            project.keys().into_iter().collect::<BTreeSet<_>>(),
            BTreeSet::from(["auth.login", "auth.logout", "dashboard.welcome"])
        );
        assert_eq!(project.value("auth.login", "de"), Some(&Scalar::from("Anmelden")));
        assert_eq!(project.value("auth.logout", "de"), None);
        assert!(!project.has_unsaved_changes());
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempdir().unwrap();
        let result = TranslationProject::open(dir.path().join("nope"), ProjectConfig::default());
        assert!(matches!(result, Err(ProjectError::Io(_))));
    }

    #[test]
    fn test_gaps_and_coverage() {
        let (_dir, project) = sample_project();

        let analysis = project.gap_analysis();
        assert_eq!(analysis.gaps.len(), 1);
        assert_eq!(analysis.gaps[0].key, "auth.logout");
        assert_eq!(analysis.gaps[0].missing_in, vec!["de"]);
        assert_eq!(project.coverage().get("en").unwrap().percent(), 100);
        assert_eq!(project.coverage().get("de").unwrap().percent(), 67);
    }

    #[test]
    fn test_set_value_records_change() {
        let (_dir, mut project) = sample_project();

        assert!(project.set_value("auth.logout", "de", "Abmelden").unwrap());
        assert_eq!(project.value("auth.logout", "de"), Some(&Scalar::from("Abmelden")));
        assert_eq!(
            project.changes(),
            &[ProjectChange {
                key: "auth.logout".into(),
                locale: "de".into(),
                previous: None,
                new: Some("Abmelden".into()),
            }]
        );
        assert_eq!(project.unsaved_locales(), vec!["de"]);
        assert!(project.gap_analysis().gaps.is_empty(), "新增键后缓存应失效");
    }

    #[test]
    fn test_set_value_idempotent() {
        let (_dir, mut project) = sample_project();

        assert!(!project.set_value("auth.login", "en", "Sign In").unwrap());
        assert!(project.changes().is_empty(), "相同的值不应产生修改记录");
        assert!(!project.has_unsaved_changes(), "相同的值不应标记为脏");

        project.set_value("auth.login", "en", "Log In").unwrap();
        project.set_value("auth.login", "en", "Log In").unwrap();
        assert_eq!(project.changes().len(), 1);
    }

    #[test]
    fn test_set_value_errors() {
        let (_dir, mut project) = sample_project();

        assert!(matches!(
            project.set_value("auth..login", "en", "x"),
            Err(ProjectError::MalformedKey { .. })
        ));
        assert!(matches!(
            project.set_value("auth.login", "fr", "x"),
            Err(ProjectError::UnknownLocale { .. })
        ));
        assert!(matches!(
            project.set_value("auth.login.title", "en", "x"),
            Err(ProjectError::MalformedKey { .. })
        ));
        assert!(matches!(
            project.set_value("auth", "en", "x"),
            Err(ProjectError::MalformedKey { .. })
        ));
        assert!(project.changes().is_empty());
    }

    #[test]
    fn test_value_edit_keeps_cache_when_emptiness_unchanged() {
        let (_dir, mut project) = sample_project();
        assert!(project.analysis_cached());

        project.set_value("auth.login", "en", "Log In").unwrap();
        assert!(project.analysis_cached(), "非空值之间的修改不应使缓存失效");

        project.set_value("auth.login", "de", "").unwrap();
        assert!(!project.analysis_cached(), "值变为空字符串后缓存应失效");
        assert_eq!(
            project.gap_analysis().gap_for("auth.login").unwrap().missing_in,
            vec!["de"]
        );

        project.set_value("auth.logout", "de", "Abmelden").unwrap();
        assert!(!project.analysis_cached(), "新增键后缓存应失效");
    }

    #[test]
    fn test_delete_key_project_wide() {
        let (_dir, mut project) = sample_project();

        assert_eq!(project.delete_key("auth.login").unwrap(), 2);
        assert_eq!(project.value("auth.login", "en"), None);
        assert_eq!(project.value("auth.login", "de"), None);
        assert_eq!(project.changes().len(), 2);
        assert!(!project.keys().contains(&"auth.login"), "键应从全集中消失");
        assert!(project.gap_analysis().gap_for("auth.login").is_none());

        assert_eq!(project.delete_key("auth.logout").unwrap(), 1, "只记录实际存在该键的语言");
        assert_eq!(project.delete_key("does.not.exist").unwrap(), 0);
        assert_eq!(project.changes().len(), 3);
    }

    #[test]
    fn test_create_key() {
        let (_dir, mut project) = sample_project();

        project.create_key("new.key", [("en", "Hi")]).unwrap();
        assert_eq!(project.value("new.key", "en"), Some(&Scalar::from("Hi")));
        assert_eq!(project.value("new.key", "de"), Some(&Scalar::from("")));
        assert_eq!(project.gap_analysis().gap_for("new.key").unwrap().missing_in, vec!["de"]);

        let changes_before = project.changes().to_vec();
        match project.create_key("new.key", [("en", "Hi")]) {
            Err(ProjectError::DuplicateKey { key }) => assert_eq!(key, "new.key"),
            other => panic!("应该返回 DuplicateKey，实际: {:?}", other),
        }
        assert_eq!(project.changes(), changes_before.as_slice(), "重复创建不应改变状态");
        assert_eq!(project.value("new.key", "en"), Some(&Scalar::from("Hi")));
    }

    #[test]
    fn test_create_key_unknown_locale_is_atomic() {
        let (_dir, mut project) = sample_project();

        let result = project.create_key("new.key", [("en", "Hi"), ("xx", "??")]);
        assert!(matches!(result, Err(ProjectError::UnknownLocale { .. })));
        assert_eq!(project.value("new.key", "en"), None, "失败时不应修改任何语言");
        assert!(!project.has_unsaved_changes());
    }

    #[test]
    fn test_save_writes_dirty_locales() {
        let (dir, mut project) = sample_project();
        project.set_value("auth.logout", "de", "Abmelden").unwrap();

        let report = project.save();
        assert!(report.is_complete());
        assert_eq!(report.written, vec!["de"]);
        assert!(!project.has_unsaved_changes());
        assert!(project.changes().is_empty());

        assert_eq!(read(&dir, "de.json")["auth"]["logout"], "Abmelden");
        assert!(dir.path().join("de.json.bak").exists());
        assert!(!dir.path().join("en.json.bak").exists(), "未修改的语言不写盘");
    }

    #[test]
    fn test_failed_save_keeps_changes_for_retry() {
        let (dir, mut project) = sample_project();
        project.set_value("auth.logout", "de", "Abmelden").unwrap();
        project.set_value("auth.login", "en", "Log In").unwrap();

        project.set_writer(AtomicWriter::default().fail_at(WriteStage::Replace));
        let report = project.save();
        assert_eq!(report.failures.len(), 2);
        assert!(report.written.is_empty());
        assert_eq!(project.unsaved_locales(), vec!["de", "en"]);
        assert_eq!(project.changes().len(), 2, "失败的语言保留修改记录");
        assert_eq!(read(&dir, "en.json")["auth"]["login"], "Sign In", "磁盘内容保持不变");

        project.set_writer(AtomicWriter::default());
        let retry = project.save();
        assert_eq!(retry.written, vec!["de", "en"]);
        assert!(!project.has_unsaved_changes());
        assert_eq!(read(&dir, "en.json")["auth"]["login"], "Log In");
    }

    #[test]
    fn test_reload_refuses_with_unsaved_changes() {
        let (dir, mut project) = sample_project();
        project.set_value("auth.login", "en", "Log In").unwrap();

        match project.reload(false) {
            Err(ProjectError::StaleState { locales }) => assert_eq!(locales, vec!["en"]),
            other => panic!("应该返回 StaleState，实际: {:?}", other),
        }
        assert_eq!(project.value("auth.login", "en"), Some(&Scalar::from("Log In")));

        fs::write(dir.path().join("fr.json"), r#"{"auth": {"login": "Connexion"}}"#).unwrap();
        project.reload(true).unwrap();
        assert_eq!(project.value("auth.login", "en"), Some(&Scalar::from("Sign In")), "强制重载丢弃修改");
        assert_eq!(project.locales(), vec!["de", "en", "fr"], "重载会发现新文件");
        assert!(project.changes().is_empty());
    }

    #[test]
    fn test_partial_load_resilience() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"greeting": "Hello"}"#).unwrap();
        fs::write(dir.path().join("de.json"), "{invalid json").unwrap();

        let project = TranslationProject::open(dir.path(), ProjectConfig::default()).unwrap();
        assert_eq!(project.locales(), vec!["en"]);
        assert_eq!(project.load_errors().len(), 1);
        assert!(matches!(&project.load_errors()[0], ProjectError::Parse { .. }));
    }

    #[test]
    fn test_discard_key_changes() {
        let (_dir, mut project) = sample_project();
        project.set_value("auth.login", "en", "Log In").unwrap();
        project.set_value("auth.login", "en", "Enter").unwrap();
        project.set_value("auth.logout", "de", "Abmelden").unwrap();

        assert!(project.discard_key_changes("auth.login").unwrap());
        assert_eq!(project.value("auth.login", "en"), Some(&Scalar::from("Sign In")), "恢复到最初的值");
        assert_eq!(project.unsaved_locales(), vec!["de"]);
        assert_eq!(project.changed_keys(), BTreeSet::from(["auth.logout"]));

        assert!(project.discard_key_changes("auth.logout").unwrap());
        assert_eq!(project.value("auth.logout", "de"), None, "新建的键被撤销");
        assert!(!project.has_unsaved_changes());
        assert!(!project.discard_key_changes("auth.logout").unwrap());
    }

    #[test]
    fn test_discard_refuses_structural_conflict() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"a": {"b": "x"}}"#).unwrap();
        let mut project = TranslationProject::open(dir.path(), ProjectConfig::default()).unwrap();

        project.delete_key("a.b").unwrap();
        project.set_value("a.b.c", "en", "y").unwrap();
        match project.discard_key_changes("a.b") {
            Err(ProjectError::MalformedKey { key, .. }) => assert_eq!(key, "a.b"),
            other => panic!("应该返回 MalformedKey，实际: {:?}", other),
        }
        assert_eq!(project.value("a.b", "en"), None, "失败时不应修改任何语言");
        assert_eq!(project.value("a.b.c", "en"), Some(&Scalar::from("y")));
        assert_eq!(project.changes().len(), 2, "修改记录保持不变");

        // 先撤销子键后，父键可以恢复
        assert!(project.discard_key_changes("a.b.c").unwrap());
        assert!(project.discard_key_changes("a.b").unwrap());
        assert_eq!(project.value("a.b", "en"), Some(&Scalar::from("x")));
        assert!(!project.has_unsaved_changes());
    }

    #[test]
    fn test_save_keeps_numeric_key_objects() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("en.json"),
            r#"{"steps": {"0": "Start", "1": "End"}, "items": ["a"], "title": "T"}"#,
        )
        .unwrap();
        let mut project = TranslationProject::open(dir.path(), ProjectConfig::default()).unwrap();

        project.set_value("title", "en", "Title").unwrap();
        assert!(project.save().is_complete());
        assert_eq!(
            serde_json::to_string(&read(&dir, "en.json")).unwrap(),
            r#"{"steps":{"0":"Start","1":"End"},"items":["a"],"title":"Title"}"#,
            "未修改的部分应保持原有结构"
        );
    }

    #[test]
    fn test_save_single_locale() {
        let (dir, mut project) = sample_project();
        project.set_value("auth.logout", "de", "Abmelden").unwrap();
        project.set_value("auth.login", "en", "Log In").unwrap();

        project.save_locale("de").unwrap();
        assert_eq!(read(&dir, "de.json")["auth"]["logout"], "Abmelden");
        assert_eq!(read(&dir, "en.json")["auth"]["login"], "Sign In", "其他语言不写盘");
        assert_eq!(project.unsaved_locales(), vec!["en"]);
        assert!(project.changes().iter().all(|c| c.locale == "en"));

        assert!(matches!(project.save_locale("fr"), Err(ProjectError::UnknownLocale { .. })));
        project.save_locale("de").unwrap();

        project.set_writer(AtomicWriter::default().fail_at(WriteStage::Replace));
        assert!(matches!(project.save_locale("en"), Err(ProjectError::Write { .. })));
        assert_eq!(project.unsaved_locales(), vec!["en"], "失败的语言保持脏标记");
        assert_eq!(project.changes().len(), 1);
    }

    #[test]
    fn test_add_locale_and_save_creates_file() {
        let (dir, mut project) = sample_project();

        project.add_locale("fr").unwrap();
        assert!(matches!(project.add_locale("fr"), Err(ProjectError::InvalidLocale { .. })));
        assert!(matches!(project.add_locale("not a locale"), Err(ProjectError::InvalidLocale { .. })));
        assert_eq!(project.coverage().get("fr").unwrap().percent(), 0);

        project.set_value("auth.login", "fr", "Connexion").unwrap();
        let report = project.save();
        assert!(report.is_complete());
        assert_eq!(read(&dir, "fr.json"), serde_json::json!({"auth": {"login": "Connexion"}}));
    }

    #[test]
    fn test_expected_locale_from_config() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"greeting": "Hello"}"#).unwrap();
        let config = ProjectConfig {
            locales: vec!["en".into(), "ja".into()],
            ..ProjectConfig::default()
        };

        let mut project = TranslationProject::open(dir.path(), config).unwrap();
        assert_eq!(project.locales(), vec!["en", "ja"]);
        assert_eq!(project.gap_analysis().missing_keys_for("ja"), vec!["greeting"]);

        project.set_value("greeting", "ja", "こんにちは").unwrap();
        assert!(project.save().is_complete());
        assert_eq!(read(&dir, "ja.json")["greeting"], "こんにちは");
    }

    #[test]
    fn test_indent_from_config() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"a": {"b": "x"}}"#).unwrap();
        let config = ProjectConfig {
            indent: 4,
            ..ProjectConfig::default()
        };

        let mut project = TranslationProject::open(dir.path(), config).unwrap();
        project.set_value("a.b", "en", "y").unwrap();
        project.save();

        let text = fs::read_to_string(dir.path().join("en.json")).unwrap();
        assert_eq!(text, "{\n    \"a\": {\n        \"b\": \"y\"\n    }\n}\n");
    }
}
