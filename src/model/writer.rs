//! 原子写入：扁平映射 → 嵌套树 → 格式化 JSON → 同目录临时文件 → rename
//!
//! 只保证单个文件的原子性；`write_all` 逐个写入，多个语言之间不是事务。

use std::io;

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::model::loader::LocaleFile;
use crate::model::project::ProjectError;
use crate::model::tree_codec::unflatten;
use crate::utils::fs::{backup_path, write_atomic, WriteStage};

pub const DEFAULT_INDENT: usize = 2;

#[derive(Debug, Clone)]
pub struct AtomicWriter {
    indent: usize,
    backup: bool,
    #[cfg(test)]
    fault: Option<WriteStage>,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new(DEFAULT_INDENT, true)
    }
}

impl AtomicWriter {
    pub fn new(indent: usize, backup: bool) -> Self {
        Self {
            indent,
            backup,
            #[cfg(test)]
            fault: None,
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.indent, config.backup)
    }

    /// 在指定步骤注入故障
    #[cfg(test)]
    pub(crate) fn fail_at(mut self, stage: WriteStage) -> Self {
        self.fault = Some(stage);
        self
    }

    #[cfg(test)]
    fn fault_point(&self) -> Option<WriteStage> {
        self.fault
    }

    #[cfg(not(test))]
    fn fault_point(&self) -> Option<WriteStage> {
        None
    }

    /// 生成文件内容：按配置缩进，非 ASCII 原样输出，末尾换行
    pub fn render(&self, file: &LocaleFile) -> Result<Vec<u8>, serde_json::Error> {
        let value = unflatten(&file.entries).to_value();
        let mut buf = Vec::new();
        if self.indent == 0 {
            serde_json::to_writer(&mut buf, &value)?;
        } else {
            let indent = vec![b' '; self.indent];
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut ser)?;
        }
        buf.push(b'\n');
        Ok(buf)
    }

    /// 写入单个语言文件；失败时目标文件保持原样
    pub fn write(&self, file: &LocaleFile) -> Result<(), ProjectError> {
        let to_write_error = |source: io::Error| ProjectError::Write {
            locale: file.locale.clone(),
            path: file.path.clone(),
            source,
        };

        let bytes = self
            .render(file)
            .map_err(|e| to_write_error(io::Error::other(e)))?;
        let backup = self.backup.then(|| backup_path(&file.path));
        write_atomic(&file.path, &bytes, backup.as_deref(), self.fault_point())
            .map_err(to_write_error)?;

        tracing::info!("已保存 {}: {}（{} 字节）", file.locale, file.path.display(), bytes.len());
        Ok(())
    }

    /// 依次写入所有脏语言，返回每个语言的结果
    pub fn write_all<'a, I>(&self, files: I) -> Vec<(String, Result<(), ProjectError>)>
    where
        I: IntoIterator<Item = &'a LocaleFile>,
    {
        files
            .into_iter()
            .filter(|f| f.dirty)
            .map(|f| {
                let result = self.write(f);
                if let Err(e) = &result {
                    tracing::error!("保存失败: {}", e);
                }
                (f.locale.clone(), result)
            })
            .collect()
    }
}
