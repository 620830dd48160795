use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "DXFVIEW_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub hit_test: HitTestConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，并做取值校验。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFVIEW_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
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

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tolerance = self.hit_test.tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "hit_test.tolerance 必须是非负有限数，当前为 {tolerance}"
            )));
        }
        if let Some(pixels) = self.hit_test.pixel_tolerance {
            if !pixels.is_finite() || pixels < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "hit_test.pixel_tolerance 必须是非负有限数，当前为 {pixels}"
                )));
            }
        }
        if self.hit_test.max_results == 0 {
            return Err(ConfigError::Invalid(
                "hit_test.max_results 至少为 1".to_string(),
            ));
        }
        if let Some(size) = self.index.cell_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "index.cell_size 必须为正数，当前为 {size}"
                )));
            }
        }
        let margin = self.view.top_margin;
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "view.top_margin 不能为负，当前为 {margin}"
            )));
        }
        Ok(())
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

/// 拾取默认值。`tolerance` 为世界单位；设置 `pixel_tolerance` 时
/// 由宿主按当前缩放换算，优先于 `tolerance`。
#[derive(Debug, Clone, Deserialize)]
pub struct HitTestConfig {
    #[serde(default = "HitTestConfig::default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub pixel_tolerance: Option<f64>,
    #[serde(default = "HitTestConfig::default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub include_invisible: bool,
}

impl HitTestConfig {
    fn default_tolerance() -> f64 {
        5.0
    }

    fn default_max_results() -> usize {
        1
    }
}

impl Default for HitTestConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::default_tolerance(),
            pixel_tolerance: None,
            max_results: Self::default_max_results(),
            include_invisible: false,
        }
    }
}

/// 空间索引配置；未设置网格尺寸时按场景范围自动估算。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub cell_size: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// 顶部标尺高度（像素）。
    #[serde(default = "ViewConfig::default_top_margin")]
    pub top_margin: f64,
}

impl ViewConfig {
    fn default_top_margin() -> f64 {
        30.0
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            top_margin: Self::default_top_margin(),
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
    #[error("配置取值无效: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "{body}").unwrap();
        file
    }

    #[test]
    fn defaults_are_sensible() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.hit_test.tolerance, 5.0);
        assert_eq!(cfg.hit_test.max_results, 1);
        assert!(cfg.hit_test.pixel_tolerance.is_none());
        assert!(!cfg.hit_test.include_invisible);
        assert!(cfg.index.cell_size.is_none());
        assert_eq!(cfg.view.top_margin, 30.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_from_temp_file() {
        let file = write_config(
            r#"
            [logging]
            level = "debug"

            [hit_test]
            tolerance = 2.5
            pixel_tolerance = 6
            max_results = 4
            include_invisible = true

            [index]
            cell_size = 50.0

            [view]
            top_margin = 0
            "#,
        );

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.hit_test.tolerance, 2.5);
        assert_eq!(cfg.hit_test.pixel_tolerance, Some(6.0));
        assert_eq!(cfg.hit_test.max_results, 4);
        assert!(cfg.hit_test.include_invisible);
        assert_eq!(cfg.index.cell_size, Some(50.0));
        assert_eq!(cfg.view.top_margin, 0.0);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config(
            r#"
            [hit_test]
            max_results = 3
            "#,
        );
        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.hit_test.max_results, 3);
        assert_eq!(cfg.hit_test.tolerance, 5.0);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for body in [
            "[hit_test]\ntolerance = -1.0",
            "[hit_test]\nmax_results = 0",
            "[hit_test]\npixel_tolerance = -2.0",
            "[index]\ncell_size = 0.0",
            "[view]\ntop_margin = -5.0",
        ] {
            let file = write_config(body);
            let err = AppConfig::from_file(file.path()).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{body}: {err}");
        }
    }

    #[test]
    fn parse_and_io_errors_carry_path() {
        let file = write_config("[hit_test\ntolerance = ");
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        match AppConfig::from_file(&missing) {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
