//! 机器人外观层错误

use edubot_driver::DriverError;
use edubot_protocol::ProtocolError;
use std::fmt;
use thiserror::Error;

/// 错误分类码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotErrorCode {
    NotConnected,
    InvalidProgram,
    InvalidArgument,
    InvalidState,
    ConnectionFailed,
    UploadFailed,
    DownloadFailed,
    CommandFailed,
    Timeout,
    UnsupportedFirmware,
}

impl RobotErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RobotErrorCode::NotConnected => "not-connected",
            RobotErrorCode::InvalidProgram => "invalid-program",
            RobotErrorCode::InvalidArgument => "invalid-argument",
            RobotErrorCode::InvalidState => "invalid-state",
            RobotErrorCode::ConnectionFailed => "connection-failed",
            RobotErrorCode::UploadFailed => "upload-failed",
            RobotErrorCode::DownloadFailed => "download-failed",
            RobotErrorCode::CommandFailed => "command-failed",
            RobotErrorCode::Timeout => "timeout",
            RobotErrorCode::UnsupportedFirmware => "unsupported-firmware",
        }
    }
}

impl fmt::Display for RobotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 类型化的机器人错误
///
/// 所有命令失败都以这一形式广播给错误监听者并返回给调用方。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", .details.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
pub struct RobotError {
    pub code: RobotErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl RobotError {
    pub fn new(code: RobotErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_connected() -> Self {
        Self::new(RobotErrorCode::NotConnected, "Robot is not connected")
    }

    pub fn invalid_program(message: impl Into<String>) -> Self {
        Self::new(RobotErrorCode::InvalidProgram, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RobotErrorCode::InvalidArgument, message)
    }

    /// 包装驱动层错误
    ///
    /// 超时与不支持的固件有专门的分类码，其余使用 `fallback`。
    pub fn from_driver(fallback: RobotErrorCode, message: &str, error: &DriverError) -> Self {
        let code = match error {
            DriverError::Timeout { .. } => RobotErrorCode::Timeout,
            DriverError::Protocol(ProtocolError::UnsupportedFirmware(_)) => {
                RobotErrorCode::UnsupportedFirmware
            },
            _ => fallback,
        };
        Self::new(code, message).with_details(error.to_string())
    }
}
