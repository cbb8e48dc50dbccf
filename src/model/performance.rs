//! 性能基准测试模块
//!
//! 用于测试大型语言集（数万个键）的扁平化、还原和缺口分析性能

use std::time::Instant;

use serde_json::{json, Map, Value};

use crate::model::analyzer::{compute, MissingPolicy};
use crate::model::loader::LocaleFile;
use crate::model::tree_codec::{flatten, get, set, unflatten, FlatMap, Scalar, TreeNode};

/// 性能测试结果
#[derive(Debug)]
pub struct PerformanceResult {
    pub operation: String,
    pub duration_ms: u128,
    pub success: bool,
    pub details: String,
}

impl PerformanceResult {
    pub fn new(operation: &str, duration_ms: u128, success: bool, details: &str) -> Self {
        Self {
            operation: operation.to_string(),
            duration_ms,
            success,
            details: details.to_string(),
        }
    }
}

/// 生成一个语言文件的嵌套 JSON：`section_i.group_j.key_k`，共 `key_count` 个叶子
///
/// `skip_every` 非零时每隔若干个键跳过一个，用来制造缺口。
pub fn generate_locale_json(locale: &str, key_count: usize, skip_every: usize) -> Value {
    const GROUP_SIZE: usize = 20;
    const SECTION_SIZE: usize = 25;

    let mut root = Map::new();
    for i in 0..key_count {
        if skip_every != 0 && i % skip_every == skip_every - 1 {
            continue;
        }
        let section = format!("section_{}", i / (GROUP_SIZE * SECTION_SIZE));
        let group = format!("group_{}", (i / GROUP_SIZE) % SECTION_SIZE);
        let key = format!("key_{}", i % GROUP_SIZE);
        let value = match i % 7 {
            0 => json!(""),
            1 => json!(format!("{{count}} items ({})", locale)),
            _ => json!(format!("{} 文本 {}", locale, i)),
        };

        let section = root
            .entry(section)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(section) = section {
            let group = section
                .entry(group)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(group) = group {
                group.insert(key, value);
            }
        }
    }
    Value::Object(root)
}

/// 生成一组语言；第一个语言完整，其余语言按序号制造不同比例的缺口
pub fn generate_locale_set(locales: &[&str], key_count: usize) -> Vec<LocaleFile> {
    locales
        .iter()
        .enumerate()
        .filter_map(|(idx, code)| {
            let skip_every = if idx == 0 { 0 } else { 10 / idx.min(5) + 1 };
            let tree = TreeNode::from_value(generate_locale_json(code, key_count, skip_every));
            let entries = flatten(&tree).ok()?;
            let mut file = LocaleFile::empty(*code, format!("{}.json", code));
            file.entries = entries;
            Some(file)
        })
        .collect()
}

/// 测试扁平化性能
pub fn benchmark_flatten(json_data: &Value) -> PerformanceResult {
    let tree = TreeNode::from_value(json_data.clone());
    let start = Instant::now();
    let result = flatten(&tree);
    let duration = start.elapsed();

    match result {
        Ok(map) => PerformanceResult::new(
            "扁平化",
            duration.as_millis(),
            !map.is_empty(),
            &format!("生成了 {} 个键", map.len()),
        ),
        Err(e) => PerformanceResult::new("扁平化", duration.as_millis(), false, &format!("扁平化失败: {}", e)),
    }
}

/// 测试还原性能
pub fn benchmark_unflatten(map: &FlatMap) -> PerformanceResult {
    let start = Instant::now();
    let tree = unflatten(map);
    let duration = start.elapsed();

    let success = matches!(tree, TreeNode::Object(_));
    PerformanceResult::new(
        "还原嵌套树",
        duration.as_millis(),
        success,
        &format!("还原了 {} 个键", map.len()),
    )
}

/// 测试按路径读写单个键的性能（代价与深度成正比，不做整树扁平化）
pub fn benchmark_point_access(json_data: &Value, keys: &[&str]) -> PerformanceResult {
    let mut tree = TreeNode::from_value(json_data.clone());
    let start = Instant::now();
    let mut found = 0;
    let mut failures = Vec::new();
    for key in keys {
        if get(&tree, key).is_some() {
            found += 1;
        }
        if let Err(e) = set(&mut tree, key, Scalar::from("已修改")) {
            failures.push(e.to_string());
        }
    }
    let duration = start.elapsed();

    let details = if failures.is_empty() {
        format!("读写了 {} 个键，其中 {} 个已存在", keys.len(), found)
    } else {
        format!("写入失败: {}", failures.join("; "))
    };
    PerformanceResult::new("按路径读写", duration.as_millis(), failures.is_empty(), &details)
}

/// 测试缺口分析性能
pub fn benchmark_gap_analysis(locales: &[LocaleFile]) -> PerformanceResult {
    let start = Instant::now();
    let analysis = compute(locales, MissingPolicy::default());
    let duration = start.elapsed();

    PerformanceResult::new(
        "缺口分析",
        duration.as_millis(),
        analysis.coverage.locales.len() == locales.len(),
        &format!(
            "{} 个语言，{} 个键，{} 个缺口",
            locales.len(),
            analysis.keys.len(),
            analysis.gaps.len()
        ),
    )
}

/// 测试JSON解析性能
pub fn benchmark_json_parsing(json_str: &str) -> PerformanceResult {
    let start = Instant::now();
    let parse_result = serde_json::from_str::<Value>(json_str);
    let duration = start.elapsed();

    match parse_result {
        Ok(_) => PerformanceResult::new(
            "JSON解析",
            duration.as_millis(),
            true,
            &format!("解析了 {} 字节的JSON", json_str.len()),
        ),
        Err(e) => PerformanceResult::new("JSON解析", duration.as_millis(), false, &format!("解析失败: {}", e)),
    }
}

/// 运行综合性能测试
pub fn run_performance_suite() -> Vec<PerformanceResult> {
    let mut results = Vec::new();
    let locales = ["en", "de", "fr", "ja", "zh-CN"];

    // 小型 / 中型 / 大型
    for key_count in [1_000, 10_000, 50_000] {
        tracing::info!("测试规模：{} 个键，{} 个语言", key_count, locales.len());

        let start = Instant::now();
        let json_data = generate_locale_json("en", key_count, 0);
        results.push(PerformanceResult::new(
            &format!("数据生成({})", key_count),
            start.elapsed().as_millis(),
            true,
            &format!("生成了 {} 个键的语言文件", key_count),
        ));

        match serde_json::to_string(&json_data) {
            Ok(json_str) => results.push(benchmark_json_parsing(&json_str)),
            Err(e) => results.push(PerformanceResult::new("JSON序列化", 0, false, &e.to_string())),
        }

        results.push(benchmark_flatten(&json_data));
        results.push(benchmark_point_access(
            &json_data,
            &["section_0.group_0.key_0", "section_1.group_3.key_7", "section_new.group_0.key_0"],
        ));

        let locale_set = generate_locale_set(&locales, key_count);
        if let Some(first) = locale_set.first() {
            results.push(benchmark_unflatten(&first.entries));
        }
        results.push(benchmark_gap_analysis(&locale_set));
    }

    results
}
