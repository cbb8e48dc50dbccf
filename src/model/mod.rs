//! 数据层：编解码、加载、分析、写入与项目状态

pub mod analyzer;
pub mod loader;
pub mod performance;
pub mod project;
pub mod tree_codec;
pub mod writer;
