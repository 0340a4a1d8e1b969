//! linkdown: 按条目标识解析媒体直链并批量下载
//!
//! 流程：标识 → 页面解析出直链 → 按扩展名分派到单流下载（mp4）或分片下载（m3u8）
//! → 汇总失败条目。单个条目的失败不会中断整批下载。

pub mod cli;
pub mod config;
pub mod core;
pub mod ui;
pub mod utils;
