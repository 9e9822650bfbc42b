//! 连接状态、运行状态与事件

use crate::error::RobotError;
use std::fmt;

/// 连接状态
///
/// `Disconnected → Connecting → Connected`；连接失败进入 `Error`，
/// 显式断开或硬件上报断开回到 `Disconnected`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// 运行状态
///
/// `Uploading` / `Downloading` / `Running` 在完成或失败后自动回到 `Idle`；
/// `Going` / `Recording` 保持到显式 `stop`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationalState {
    #[default]
    Idle,
    Uploading,
    Downloading,
    Running,
    Going,
    Recording,
}

/// 带进度的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    Download,
    DownloadRecording,
}

/// 机器人事件
#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    ConnectionState(ConnectionState),
    OperationalState(OperationalState),
    /// 进度（0..=1）
    Progress { operation: Operation, value: f32 },
    Error(RobotError),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        })
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationalState::Idle => "idle",
            OperationalState::Uploading => "uploading",
            OperationalState::Downloading => "downloading",
            OperationalState::Running => "running",
            OperationalState::Going => "going",
            OperationalState::Recording => "recording",
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Upload => "upload",
            Operation::Download => "download",
            Operation::DownloadRecording => "download-recording",
        })
    }
}
