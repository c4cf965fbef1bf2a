//! 配置模块，负责加载命令行工具的 JSON 配置文件

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 默认的配置文件名，位于当前工作目录
pub const DEFAULT_CONFIG_FILE: &str = "ldap_filter.json";

/// 覆盖配置文件路径的环境变量
pub const CONFIG_ENV_VAR: &str = "LDAP_FILTER_CONFIG";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),
    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 每次解析之后输出什么
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 缩进的树形概览
    #[default]
    Tree,
    /// 按位置排列的全部 token
    Tokens,
    /// 整棵语法树的 JSON
    Json,
}

/// 交互式过滤器编辑器的配置，缺少的字段使用默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub prompt: String,
    /// 历史记录文件，为空时不保存历史
    pub history_file: Option<PathBuf>,
    pub output: OutputFormat,
    /// 是否在输入下方标出错误位置
    pub show_markers: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "filter> ".to_string(),
            history_file: None,
            output: OutputFormat::Tree,
            show_markers: true,
        }
    }
}

impl ReplConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 配置文件路径：环境变量优先，否则是当前目录下的默认文件
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// 加载配置。
    ///
    /// 显式指定的文件必须存在；未指定时查找默认位置，找不到就使用默认配置。
    /// 文件存在但无法读取或解析时报错。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_json_file(path);
        }
        match Self::from_json_file(Self::default_path()) {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ldap_filter.json");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{
                "prompt": "ldap> ",
                "history_file": "history.txt",
                "output": "json",
                "show_markers": false
            }}"#
        )
        .unwrap();

        let config = ReplConfig::from_json_file(&path).unwrap();
        assert_eq!(config.prompt, "ldap> ");
        assert_eq!(config.history_file, Some(PathBuf::from("history.txt")));
        assert_eq!(config.output, OutputFormat::Json);
        assert!(!config.show_markers);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "output": "tokens" }"#).unwrap();

        let config = ReplConfig::from_json_file(&path).unwrap();
        assert_eq!(config.output, OutputFormat::Tokens);
        assert_eq!(config.prompt, ReplConfig::default().prompt);
        assert!(config.show_markers);
    }

    #[test]
    fn test_invalid_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "invalid json").unwrap();

        let result = ReplConfig::from_json_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_output_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_output.json");
        fs::write(&path, r#"{ "output": "xml" }"#).unwrap();

        assert!(ReplConfig::from_json_file(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = ReplConfig::from_json_file("non_existent_file.json");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explicit.json");
        fs::write(&path, r#"{ "prompt": "> " }"#).unwrap();

        let config = ReplConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.prompt, "> ");

        // 显式指定的文件不存在时不能悄悄退回默认配置
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ReplConfig::load(Some(missing.as_path())),
            Err(ConfigError::NotFound(_))
        ));
    }
}
