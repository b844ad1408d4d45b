//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// 编译器与请求构造的配置，所有字段都有默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// `=~` 生成的 regexp 查询使用的 flags
    pub regexp_flags: String,
    /// regexp 查询是否忽略大小写
    pub regexp_case_insensitive: bool,
    /// 时间窗口过滤所使用的时间戳字段
    pub timestamp_field: String,
    /// 排序和时间范围使用的日期格式
    pub date_format: String,
    /// 未指定 size 时的默认分页大小
    pub default_size: usize,
    /// 允许的最大分页大小
    pub max_size: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            regexp_flags: "ALL".to_string(),
            regexp_case_insensitive: true,
            timestamp_field: "created_at".to_string(),
            date_format: "strict_date_optional_time".to_string(),
            default_size: 10,
            max_size: 10_000,
        }
    }
}

impl CompilerConfig {
    /// 从JSON文件加载配置，缺失的字段使用默认值
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;

        // 解析JSON
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path_ref.to_path_buf(),
            source,
        })
    }

    /// 加载配置文件，失败时记录警告并使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_json_file(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.as_ref().display(), "loaded compiler config");
                config
            }
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default compiler config");
                Self::default()
            }
        }
    }
}
