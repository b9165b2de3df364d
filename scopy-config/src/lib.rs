use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub copy: CopyConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `SCOPY_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("SCOPY_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 图纸复制的默认行为。
#[derive(Debug, Clone, Deserialize)]
pub struct CopyConfig {
    /// 追加在新图纸标题后的文字。
    #[serde(default = "CopyConfig::default_title_suffix")]
    pub title_suffix: String,
    /// 样板选择中表示“不指定样板”的文字。
    #[serde(default = "CopyConfig::default_no_template_label")]
    pub no_template_label: String,
    #[serde(default)]
    pub copy_detailing: bool,
    #[serde(default = "CopyConfig::default_share_legends")]
    pub share_legends: bool,
}

impl CopyConfig {
    fn default_title_suffix() -> String {
        " - Copy".to_string()
    }

    fn default_no_template_label() -> String {
        "<None>".to_string()
    }

    fn default_share_legends() -> bool {
        true
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            title_suffix: Self::default_title_suffix(),
            no_template_label: Self::default_no_template_label(),
            copy_detailing: false,
            share_legends: Self::default_share_legends(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_used_for_empty_file() {
        let file = tempfile::NamedTempFile::new().expect("create temp file");
        let cfg = AppConfig::from_file(file.path()).expect("empty config parses");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.copy.title_suffix, " - Copy");
        assert_eq!(cfg.copy.no_template_label, "<None>");
        assert!(!cfg.copy.copy_detailing);
        assert!(cfg.copy.share_legends);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [copy]
            title_suffix = " (Issue 2)"
            no_template_label = "<Copy>"
            copy_detailing = true
            share_legends = false
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.copy.title_suffix, " (Issue 2)");
        assert_eq!(cfg.copy.no_template_label, "<Copy>");
        assert!(cfg.copy.copy_detailing);
        assert!(!cfg.copy.share_legends);
    }

    #[test]
    fn missing_and_malformed_files_are_reported() {
        let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[copy]\ncopy_detailing = \"sometimes\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
