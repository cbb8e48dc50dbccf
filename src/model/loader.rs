//! 语言文件发现与加载
//!
//! 每个语言一个 JSON 文件，文件名（去掉扩展名）即语言代码。单个文件解析失败不会阻止其他文件加载。

use std::{
    collections::BTreeMap,
    fs,
    io,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

use crate::model::project::ProjectError;
use crate::model::tree_codec::{flatten, FlatMap, TreeNode};
use crate::utils::fs::read_json_file;

/// 默认匹配模式（相对于项目根目录）
pub const DEFAULT_PATTERN: &str = "**/*.json";

/// 扫描时跳过的目录
const IGNORED_DIRS: &[&str] = &[".git", ".venv", "node_modules", "target", ".lazyi18n"];

/// 一个待加载的语言文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSource {
    pub locale: String,
    pub path: PathBuf,
}

/// 内存中的语言文件：扁平映射 + 脏标记
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleFile {
    pub locale: String,
    pub path: PathBuf,
    pub entries: FlatMap,
    /// 有尚未写盘的修改
    pub dirty: bool,
    /// 加载（或最近一次保存）时文件是否存在
    pub on_disk: bool,
}

impl LocaleFile {
    pub fn empty(locale: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            locale: locale.into(),
            path: path.into(),
            entries: FlatMap::new(),
            dirty: false,
            on_disk: false,
        }
    }
}

/// 批量加载结果：成功的语言 + 每个失败文件的错误
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub locales: BTreeMap<String, LocaleFile>,
    pub failures: Vec<ProjectError>,
}

/// 形如 `en`、`de`、`pt-BR`、`zh_Hans` 的语言代码
pub fn is_locale_code(name: &str) -> bool {
    static LOCALE_RE: OnceLock<Regex> = OnceLock::new();
    LOCALE_RE
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z]{2,3}(?:[-_][A-Za-z0-9]{2,8})*$").expect("locale regex is valid")
        })
        .is_match(name)
}

/// 将 glob 模式（`*`、`?`、`**/`）转换为匹配相对路径的正则
fn pattern_to_regex(pattern: &str) -> Result<Regex, ProjectError> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:[^/]+/)*");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '\\' => re.push('/'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| ProjectError::Pattern {
        pattern: pattern.to_string(),
        cause: e.to_string(),
    })
}

/// 读取目录条目并按文件名排序
fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// 扫描根目录，返回匹配模式且文件名像语言代码的候选文件（按路径排序）
///
/// 每次调用都重新扫描，外部新增的文件会被发现。同一语言代码出现多次时保留第一个。
/// 只有根目录本身无法读取时返回错误；无法读取的子目录和条目记录警告后跳过。
pub fn discover(root: &Path, pattern: &str) -> Result<Vec<LocaleSource>, ProjectError> {
    fn walk(entries: Vec<fs::DirEntry>, root: &Path, matcher: &Regex, out: &mut Vec<LocaleSource>) {
        for entry in entries {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("无法读取条目，已跳过 {}: {}", path.display(), e);
                    continue;
                }
            };
            if file_type.is_dir() {
                let name = entry.file_name();
                if name.to_str().is_some_and(|n| IGNORED_DIRS.contains(&n)) {
                    continue;
                }
                match sorted_entries(&path) {
                    Ok(children) => walk(children, root, matcher, out),
                    Err(e) => tracing::warn!("无法读取目录，已跳过 {}: {}", path.display(), e),
                }
            } else if file_type.is_file() {
                let Ok(rel) = path.strip_prefix(root) else {
                    continue;
                };
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !matcher.is_match(&rel) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if is_locale_code(stem) {
                    out.push(LocaleSource {
                        locale: stem.to_string(),
                        path,
                    });
                }
            }
        }
    }

    let matcher = pattern_to_regex(pattern)?;
    let mut found = Vec::new();
    walk(sorted_entries(root)?, root, &matcher, &mut found);

    let mut seen = std::collections::HashSet::new();
    found.retain(|s| {
        if seen.insert(s.locale.clone()) {
            true
        } else {
            tracing::warn!("语言 {} 有多个文件，忽略: {}", s.locale, s.path.display());
            false
        }
    });
    tracing::debug!("发现 {} 个语言文件（模式: {}）", found.len(), pattern);
    Ok(found)
}

/// 解析单个语言文件并扁平化
///
/// 文件不存在时返回空的 LocaleFile，用于从零创建语言。
pub fn load(source: &LocaleSource) -> Result<LocaleFile, ProjectError> {
    if !source.path.exists() {
        tracing::info!("语言 {} 的文件不存在，创建空语言: {}", source.locale, source.path.display());
        return Ok(LocaleFile::empty(&source.locale, &source.path));
    }

    let value = read_json_file(&source.path)?;
    if !value.is_object() {
        return Err(ProjectError::Parse {
            path: source.path.clone(),
            cause: "根节点必须是 JSON 对象".into(),
        });
    }
    let entries = flatten(&TreeNode::from_value(value)).map_err(|e| match e {
        ProjectError::MalformedKey { key, reason } => ProjectError::MalformedKey {
            key,
            reason: format!("{}（{}）", reason, source.path.display()),
        },
        other => other,
    })?;

    Ok(LocaleFile {
        locale: source.locale.clone(),
        path: source.path.clone(),
        entries,
        dirty: false,
        on_disk: true,
    })
}

/// 发现并加载全部语言文件；`expected` 中没有对应文件的语言以空文件补齐
pub fn load_all(root: &Path, pattern: &str, expected: &[String]) -> Result<LoadOutcome, ProjectError> {
    let sources = discover(root, pattern)?;
    let mut outcome = LoadOutcome::default();

    for source in &sources {
        match load(source) {
            Ok(file) => {
                tracing::debug!("已加载 {}: {} 个键", file.locale, file.entries.len());
                outcome.locales.insert(file.locale.clone(), file);
            }
            Err(e) => {
                tracing::warn!("语言文件加载失败，已跳过: {}", e);
                outcome.failures.push(e);
            }
        }
    }

    // 新语言文件与已有语言文件放在同一目录
    let home = sources
        .first()
        .and_then(|s| s.path.parent())
        .unwrap_or(root)
        .to_path_buf();
    for locale in expected {
        // 解析失败的语言不能用空文件顶替，否则保存时会覆盖原文件
        if sources.iter().any(|s| &s.locale == locale) {
            continue;
        }
        let source = LocaleSource {
            locale: locale.clone(),
            path: home.join(format!("{}.json", locale)),
        };
        match load(&source) {
            Ok(file) => {
                outcome.locales.insert(file.locale.clone(), file);
            }
            Err(e) => outcome.failures.push(e),
        }
    }

    Ok(outcome)
}
