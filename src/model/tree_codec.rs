//! 树编解码（Tree Codec）：嵌套翻译树 ⇄ 扁平点路径映射
//!
//! 扁平化时数组下标作为数字段（`items.0.label`），空对象/空数组以哨兵条目保留，
//! 使得 `unflatten(flatten(tree))` 可以完整还原结构与键顺序。

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::model::project::ProjectError;

/// 路径分隔符
pub const KEY_SEPARATOR: char = '.';

/// 叶子值（字符串 / 数字 / 布尔 / 空）
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Scalar {
    /// 字符串叶子返回其内容，其余类型返回 None
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::Number(n) => Value::Number(n.clone()),
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Null => Value::Null,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

/// 一个语言文件的内容树
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Scalar(Scalar),
    /// 键顺序即文件中的顺序
    Object(IndexMap<String, TreeNode>),
    List(Vec<TreeNode>),
}

impl TreeNode {
    pub fn empty_object() -> Self {
        TreeNode::Object(IndexMap::new())
    }

    /// 从 serde_json 值构建（依赖 preserve_order 保持键顺序）
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => TreeNode::Object(
                map.into_iter()
                    .map(|(k, v)| (k, TreeNode::from_value(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                TreeNode::List(items.into_iter().map(TreeNode::from_value).collect())
            }
            Value::String(s) => TreeNode::Scalar(Scalar::String(s)),
            Value::Number(n) => TreeNode::Scalar(Scalar::Number(n)),
            Value::Bool(b) => TreeNode::Scalar(Scalar::Bool(b)),
            Value::Null => TreeNode::Scalar(Scalar::Null),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TreeNode::Scalar(s) => s.to_value(),
            TreeNode::Object(map) => {
                let mut out = Map::new();
                for (k, child) in map {
                    out.insert(k.clone(), child.to_value());
                }
                Value::Object(out)
            }
            TreeNode::List(items) => Value::Array(items.iter().map(TreeNode::to_value).collect()),
        }
    }
}

impl From<Value> for TreeNode {
    fn from(value: Value) -> Self {
        TreeNode::from_value(value)
    }
}

/// 空容器的种类（哨兵条目使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Object,
    List,
}

/// 扁平映射中的一个条目：真实叶子或空容器哨兵
#[derive(Debug, Clone, PartialEq)]
pub enum FlatEntry {
    Leaf(Scalar),
    Empty(ContainerKind),
}

/// 有序的 FlatKey → Scalar 映射
///
/// 空容器哨兵只用于还原结构，不属于翻译键：`len`、`keys`、`get` 都看不到它们。
/// `flatten` 同时记录每个容器路径原本是对象还是数组（根路径为空串），
/// `unflatten` 据此还原，只有新出现的前缀才按下标规则推断。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatMap {
    entries: IndexMap<String, FlatEntry>,
    containers: HashMap<String, ContainerKind>,
    leaves: usize,
}

impl FlatMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 叶子键数量
    pub fn len(&self) -> usize {
        self.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        match self.entries.get(key) {
            Some(FlatEntry::Leaf(s)) => Some(s),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 插入或更新叶子。已存在的键保持原位置，新键追加到末尾；
    /// 祖先路径上的空容器哨兵会被移除。
    pub fn insert(&mut self, key: String, value: Scalar) -> Option<Scalar> {
        for (idx, _) in key.match_indices(KEY_SEPARATOR) {
            if let Some(FlatEntry::Empty(_)) = self.entries.get(&key[..idx]) {
                self.entries.shift_remove(&key[..idx]);
            }
        }
        match self.entries.insert(key, FlatEntry::Leaf(value)) {
            Some(FlatEntry::Leaf(prev)) => Some(prev),
            _ => {
                self.leaves += 1;
                None
            }
        }
    }

    /// 删除叶子，保持其余条目的相对顺序
    pub fn remove(&mut self, key: &str) -> Option<Scalar> {
        if !self.contains_key(key) {
            return None;
        }
        match self.entries.shift_remove(key) {
            Some(FlatEntry::Leaf(prev)) => {
                self.leaves -= 1;
                Some(prev)
            }
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().filter_map(|(k, e)| match e {
            FlatEntry::Leaf(s) => Some((k.as_str(), s)),
            FlatEntry::Empty(_) => None,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }

    /// 全部原始条目（含哨兵），按插入顺序
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FlatEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    fn push_empty(&mut self, key: String, kind: ContainerKind) {
        self.entries.insert(key, FlatEntry::Empty(kind));
    }

    fn mark_container(&mut self, path: &str, kind: ContainerKind) {
        self.containers.insert(path.to_string(), kind);
    }

    /// 加载时该路径上容器的种类；新建的前缀返回 None
    pub fn container_kind(&self, path: &str) -> Option<ContainerKind> {
        self.containers.get(path).copied()
    }

    /// 找出与 `key` 结构冲突的已有条目：
    /// 祖先路径上的叶子，或 `key` 之下的任何条目（叶子或哨兵）。
    pub fn conflicting_key(&self, key: &str) -> Option<&str> {
        for (idx, _) in key.match_indices(KEY_SEPARATOR) {
            if let Some((k, FlatEntry::Leaf(_))) = self.entries.get_key_value(&key[..idx]) {
                return Some(k.as_str());
            }
        }
        let prefix = format!("{}{}", key, KEY_SEPARATOR);
        self.entries
            .keys()
            .find(|k| k.starts_with(&prefix))
            .map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for FlatMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = FlatMap::new();
        for (k, v) in iter {
            out.insert(k.into(), v.into());
        }
        out
    }
}

fn malformed(key: &str, reason: &str) -> ProjectError {
    ProjectError::MalformedKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// 校验 FlatKey 语法并拆分为路径段
pub fn split_key(key: &str) -> Result<Vec<&str>, ProjectError> {
    if key.is_empty() {
        return Err(malformed(key, "键不能为空"));
    }
    let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(malformed(key, "路径段不能为空"));
    }
    Ok(segments)
}

pub fn validate_key(key: &str) -> Result<(), ProjectError> {
    split_key(key).map(|_| ())
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", path, KEY_SEPARATOR, segment)
    }
}

/// 嵌套树 → 有序扁平映射
pub fn flatten(tree: &TreeNode) -> Result<FlatMap, ProjectError> {
    fn walk(out: &mut FlatMap, node: &TreeNode, path: &str) -> Result<(), ProjectError> {
        match node {
            TreeNode::Scalar(s) => {
                out.insert(path.to_string(), s.clone());
            }
            TreeNode::Object(map) => {
                out.mark_container(path, ContainerKind::Object);
                if map.is_empty() && !path.is_empty() {
                    out.push_empty(path.to_string(), ContainerKind::Object);
                }
                for (name, child) in map {
                    if name.is_empty() {
                        return Err(malformed(&join(path, name), "对象键名为空"));
                    }
                    if name.contains(KEY_SEPARATOR) {
                        return Err(malformed(&join(path, name), "对象键名包含路径分隔符 '.'"));
                    }
                    walk(out, child, &join(path, name))?;
                }
            }
            TreeNode::List(items) => {
                out.mark_container(path, ContainerKind::List);
                if items.is_empty() && !path.is_empty() {
                    out.push_empty(path.to_string(), ContainerKind::List);
                }
                for (idx, child) in items.iter().enumerate() {
                    walk(out, child, &join(path, &idx.to_string()))?;
                }
            }
        }
        Ok(())
    }

    if let TreeNode::Scalar(_) = tree {
        return Err(malformed("", "根节点必须是对象或数组"));
    }
    let mut out = FlatMap::new();
    walk(&mut out, tree, "")?;
    Ok(out)
}

/// 还原过程中的中间节点
enum Building {
    Leaf(Scalar),
    Empty(ContainerKind),
    Branch(IndexMap<String, Building>),
}

/// 扁平映射 → 嵌套树
///
/// 加载时记录过种类的容器按原种类还原；没有记录的前缀，子段恰好为 `0..n-1` 时还原为数组，
/// 否则为对象（稀疏下标保留为数字字符串键）。
///
/// 映射中不能同时存在叶子和它之下的键，编辑操作在写入前已经检查过结构冲突。
pub fn unflatten(map: &FlatMap) -> TreeNode {
    let mut root: IndexMap<String, Building> = IndexMap::new();

    for (key, entry) in map.entries() {
        let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut current = &mut root;
        for seg in parents {
            let slot = current
                .entry(seg.to_string())
                .or_insert_with(|| Building::Branch(IndexMap::new()));
            debug_assert!(
                !matches!(slot, Building::Leaf(_)),
                "键 {} 穿过了叶子值 {}",
                key,
                seg
            );
            if !matches!(slot, Building::Branch(_)) {
                // 哨兵被真实子节点取代
                *slot = Building::Branch(IndexMap::new());
            }
            let Building::Branch(children) = slot else {
                unreachable!("slot was just turned into a branch");
            };
            current = children;
        }

        let incoming = match entry {
            FlatEntry::Leaf(s) => Building::Leaf(s.clone()),
            FlatEntry::Empty(kind) => Building::Empty(*kind),
        };
        let has_children = matches!(current.get(*last), Some(Building::Branch(_)));
        debug_assert!(
            !(has_children && matches!(incoming, Building::Leaf(_))),
            "键 {} 与已有子树冲突",
            key
        );
        // 有真实子节点时忽略哨兵
        if !has_children {
            current.insert(last.to_string(), incoming);
        }
    }

    finish(Building::Branch(root), "", map)
}

fn finish(node: Building, path: &str, map: &FlatMap) -> TreeNode {
    match node {
        Building::Leaf(s) => TreeNode::Scalar(s),
        Building::Empty(ContainerKind::Object) => TreeNode::empty_object(),
        Building::Empty(ContainerKind::List) => TreeNode::List(Vec::new()),
        Building::Branch(children) => {
            let order = match map.container_kind(path) {
                Some(ContainerKind::Object) => None,
                Some(ContainerKind::List) if children.is_empty() => Some(Vec::new()),
                // 删除元素后不再连续的数组退化为对象
                _ => contiguous_indices(&children),
            };
            match order {
                Some(order) => {
                    let mut indexed: Vec<(usize, String, Building)> = order
                        .into_iter()
                        .zip(children)
                        .map(|(idx, (k, child))| (idx, k, child))
                        .collect();
                    indexed.sort_by_key(|(idx, _, _)| *idx);
                    TreeNode::List(
                        indexed
                            .into_iter()
                            .map(|(_, k, child)| finish(child, &join(path, &k), map))
                            .collect(),
                    )
                }
                None => TreeNode::Object(
                    children
                        .into_iter()
                        .map(|(k, child)| {
                            let node = finish(child, &join(path, &k), map);
                            (k, node)
                        })
                        .collect(),
                ),
            }
        }
    }
}

/// 子段是否恰为 0..n-1（规范十进制写法），是则按出现顺序返回各自下标
fn contiguous_indices(children: &IndexMap<String, Building>) -> Option<Vec<usize>> {
    if children.is_empty() {
        return None;
    }
    let mut order = Vec::with_capacity(children.len());
    for key in children.keys() {
        let idx: usize = key.parse().ok()?;
        if idx.to_string() != *key {
            return None;
        }
        order.push(idx);
    }
    let mut sorted = order.clone();
    sorted.sort_unstable();
    if sorted.iter().enumerate().all(|(i, idx)| i == *idx) {
        Some(order)
    } else {
        None
    }
}

/// 按路径读取节点，不做整树扁平化
pub fn get<'a>(tree: &'a TreeNode, key: &str) -> Option<&'a TreeNode> {
    let segments = split_key(key).ok()?;
    let mut current = tree;
    for seg in segments {
        current = match current {
            TreeNode::Object(map) => map.get(seg)?,
            TreeNode::List(items) => items.get(list_index(seg)?)?,
            TreeNode::Scalar(_) => return None,
        };
    }
    Some(current)
}

/// 按路径写入叶子，缺失的中间层创建为对象；返回被替换的旧节点
pub fn set(tree: &mut TreeNode, key: &str, value: Scalar) -> Result<Option<TreeNode>, ProjectError> {
    let segments = split_key(key)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(malformed(key, "键不能为空"));
    };

    let mut current = tree;
    for seg in parents {
        current = child_or_create(current, seg, key)?;
    }

    let value = TreeNode::Scalar(value);
    match current {
        TreeNode::Object(map) => Ok(map.insert(last.to_string(), value)),
        TreeNode::List(items) => {
            let idx = list_slot(last, items.len(), key)?;
            if idx == items.len() {
                items.push(value);
                Ok(None)
            } else {
                Ok(Some(std::mem::replace(&mut items[idx], value)))
            }
        }
        TreeNode::Scalar(_) => Err(malformed(key, "路径穿过了标量值")),
    }
}

fn child_or_create<'a>(
    node: &'a mut TreeNode,
    seg: &str,
    key: &str,
) -> Result<&'a mut TreeNode, ProjectError> {
    match node {
        TreeNode::Object(map) => Ok(map
            .entry(seg.to_string())
            .or_insert_with(TreeNode::empty_object)),
        TreeNode::List(items) => {
            let idx = list_slot(seg, items.len(), key)?;
            if idx == items.len() {
                items.push(TreeNode::empty_object());
            }
            Ok(&mut items[idx])
        }
        TreeNode::Scalar(_) => Err(malformed(key, "路径穿过了标量值")),
    }
}

fn list_index(seg: &str) -> Option<usize> {
    let idx: usize = seg.parse().ok()?;
    (idx.to_string() == seg).then_some(idx)
}

/// 数组写入位置：已有下标或恰好追加到末尾
fn list_slot(seg: &str, len: usize, key: &str) -> Result<usize, ProjectError> {
    match list_index(seg) {
        Some(idx) if idx <= len => Ok(idx),
        Some(_) => Err(malformed(key, "数组下标越界")),
        None => Err(malformed(key, "数组路径段必须是下标")),
    }
}
