//! # 会话配置
//!
//! 用户级 TOML 配置文件，描述连接哪种后端以及各层参数。
//!
//! 配置文件路径：
//! - Linux: `~/.config/edubot/config.toml`
//! - macOS: `~/Library/Application Support/edubot/config.toml`
//! - Windows: `%APPDATA%\edubot\config.toml`
//!
//! 文件不存在时使用默认值；所有字段都可省略。
//!
//! ```toml
//! backend = "emulator"
//! response_timeout_ms = 5000
//! program_store = "/home/me/edubot/programs"
//!
//! [emulator]
//! response_latency_ms = 50
//! discovery_step_ms = 1000
//!
//! [[emulator.robots]]
//! name = "EduBot-A"
//! firmware_version = 6
//!
//! [radio]
//! name_prefix = "EduBot"
//! ```

use edubot_hal::{EmulatorConfig, GattConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// 硬件后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Emulator,
    Radio,
}

/// 真实无线链路参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// 只接受以此开头的广播名
    pub name_prefix: String,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            name_prefix: GattConfig::default().name_prefix,
        }
    }
}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: Backend,
    /// 每个请求等待应答的时限（毫秒）
    pub response_timeout_ms: u64,
    pub emulator: EmulatorConfig,
    pub radio: RadioConfig,
    /// JSON 程序目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_store: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Emulator,
            response_timeout_ms: 5000,
            emulator: EmulatorConfig::default(),
            radio: RadioConfig::default(),
            program_store: None,
        }
    }
}

impl SessionConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("edubot").join("config.toml"))
    }

    /// 加载配置
    ///
    /// `path` 为 `None` 时使用 [`SessionConfig::default_path`]。
    /// 文件不存在返回默认配置。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// 保存配置（父目录不存在时创建）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// 无线链路配置（UUID 使用默认值）
    pub fn gatt_config(&self) -> GattConfig {
        GattConfig {
            name_prefix: self.radio.name_prefix.clone(),
            ..GattConfig::default()
        }
    }
}
