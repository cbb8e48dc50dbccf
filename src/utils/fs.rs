//! IO辅助：JSON读取与崩溃安全的文件替换

use std::{
    fs::{self, File},
    io::{self, BufReader, Write},
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::model::project::ProjectError;

/// 从文件读取JSON数据，错误中带上文件路径
pub fn read_json_file(p: &Path) -> Result<Value, ProjectError> {
    let f = File::open(p).map_err(|source| ProjectError::Read {
        path: p.to_path_buf(),
        source,
    })?;
    let rdr = BufReader::new(f);
    serde_json::from_reader(rdr).map_err(|e| ProjectError::Parse {
        path: p.to_path_buf(),
        cause: e.to_string(),
    })
}

/// 原子写入的各个步骤（用于故障注入测试）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    /// 写临时文件
    TempFile,
    /// 复制旧文件到备份
    Backup,
    /// rename 替换目标文件
    Replace,
}

fn check_fault(fault: Option<WriteStage>, stage: WriteStage) -> io::Result<()> {
    if fault == Some(stage) {
        tracing::debug!("故障注入：在 {:?} 步骤中止写入", stage);
        return Err(io::Error::new(
            io::ErrorKind::Interrupted,
            format!("injected fault at {:?}", stage),
        ));
    }
    Ok(())
}

/// 备份文件路径：目标文件的同级 `<文件名>.bak`
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    target.with_file_name(name)
}

/// 原子替换：同目录临时文件 → 备份旧文件 → 单次 rename
///
/// rename 之前任何一步失败，目标文件都保持原样，临时文件随 `NamedTempFile` 释放而删除。
pub(crate) fn write_atomic(
    target: &Path,
    bytes: &[u8],
    backup: Option<&Path>,
    fault: Option<WriteStage>,
) -> io::Result<()> {
    let dir = match target.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    check_fault(fault, WriteStage::TempFile)?;
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    match fs::metadata(target) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(_) => set_default_permissions(tmp.as_file())?,
    }
    tmp.as_file().sync_all()?;

    check_fault(fault, WriteStage::Backup)?;
    if let Some(backup) = backup {
        if target.exists() {
            fs::copy(target, backup)?;
        }
    }

    check_fault(fault, WriteStage::Replace)?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

// tempfile 默认以 0600 创建，新建的语言文件按普通文件权限落盘
#[cfg(unix)]
fn set_default_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}
