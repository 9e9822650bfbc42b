//! # EduBot Hardware Abstraction Layer
//!
//! 与传输方式无关的硬件抽象：设备发现、连接/断开、字节写入、异步通知。
//!
//! ## 实现
//!
//! - [`emulator::Emulator`]: 确定性的软件模拟器，同时模拟最多 N 台不同固件的机器人
//! - [`gatt::GattTransport`]: 真实无线链路（GATT 读/写/通知语义），后端可插拔；
//!   启用 `ble` feature 后提供基于 btleplug 的 [`gatt::BtleplugBackend`]
//!
//! ## 所有权
//!
//! 一个 `HardwareLayer` 实例由其创建者独占；同一时刻最多一条连接。
//! 帧的拆分与节奏由上层协议处理器负责，本层不做隐式合批。

use std::fmt;
use thiserror::Error;

pub mod emulator;
pub mod gatt;
pub mod observer;

pub use emulator::{Emulator, EmulatorConfig, SimulatedRobotConfig};
pub use gatt::{GattBackend, GattConfig, GattTransport, LinkEvent, ScanEvent};
pub use observer::{ListenerRegistry, Subscription};

#[cfg(feature = "ble")]
pub use gatt::BtleplugBackend;

/// 硬件层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("Hardware is not connected")]
    NotConnected,
    #[error("Hardware is already connected to {0}")]
    AlreadyConnected(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Radio adapter unavailable: {0}")]
    AdapterUnavailable(String),
    #[error("Write rejected: {0}")]
    WriteRejected(String),
    #[error("Notification error: {0}")]
    Notification(String),
    #[error("Scan error: {0}")]
    Scan(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// 硬件层连接状态
///
/// 由一个硬件实例独占；每次转换都会广播给所有状态监听者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HardwareState {
    #[default]
    Idle,
    Discovering,
    Connecting,
    Connected,
    Disconnected,
}

impl HardwareState {
    /// 是否处于与连接相关的状态（停止扫描时不会被强制回到 `Idle`）
    pub fn is_connection_related(self) -> bool {
        matches!(
            self,
            HardwareState::Connecting | HardwareState::Connected | HardwareState::Disconnected
        )
    }
}

impl fmt::Display for HardwareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HardwareState::Idle => "idle",
            HardwareState::Discovering => "discovering",
            HardwareState::Connecting => "connecting",
            HardwareState::Connected => "connected",
            HardwareState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// 扫描发现的设备
///
/// `id` 是不透明句柄，之后原样传给 [`HardwareLayer::connect`]。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredDevice {
    pub id: String,
    /// 广播名（若有）
    pub name: Option<String>,
}

impl DiscoveredDevice {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }
}

/// 设备发现回调
pub type DiscoveryCallback = Box<dyn Fn(DiscoveredDevice) + Send + Sync>;

/// 硬件抽象能力接口
///
/// 所有方法都取 `&self`：通知和状态回调来自后台线程，实例通常以
/// `Arc<dyn HardwareLayer>` 在机器人外观与协议处理器之间共享。
pub trait HardwareLayer: Send + Sync {
    /// 开始可取消的异步扫描；每个设备 id 最多触发一次 `on_found`
    ///
    /// 状态转换为 `Discovering`。
    fn start_discovery(&self, on_found: DiscoveryCallback) -> Result<(), HardwareError>;

    /// 停止扫描（幂等）
    ///
    /// 取消所有待触发的发现定时器；仅当当前状态为 `Discovering` 时回到 `Idle`。
    fn stop_discovery(&self);

    /// 连接设备（独占），会隐式停止进行中的扫描
    fn connect(&self, device_id: &str) -> Result<(), HardwareError>;

    /// 断开当前连接
    fn disconnect(&self) -> Result<(), HardwareError>;

    /// 发送一帧（文本命令传 `as_bytes()`）
    fn write(&self, data: &[u8]) -> Result<(), HardwareError>;

    /// 注册入站数据通知；可多个订阅者
    fn on_notification(&self, callback: Box<dyn Fn(&[u8]) + Send + Sync>) -> Subscription;

    /// 注册链路错误通知（例如通知通道出错）
    ///
    /// 错误在发生时立即广播，不会留到下一次 `write()`。
    fn on_link_error(&self, callback: Box<dyn Fn(&HardwareError) + Send + Sync>) -> Subscription;

    /// 注册状态转换通知
    fn on_state_change(&self, callback: Box<dyn Fn(&HardwareState) + Send + Sync>)
    -> Subscription;

    /// 当前状态
    fn state(&self) -> HardwareState;

    /// 已连接的设备 id
    fn connected_device(&self) -> Option<String>;
}

/// 日志用：ASCII 可打印帧按文本显示，否则按十六进制显示
pub fn describe_frame(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) if text.chars().all(|c| !c.is_control() || c == '\n' || c == '\r') => {
            format!("{:?}", text)
        },
        _ => format!("0x{}", hex::encode(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_related_states() {
        assert!(!HardwareState::Idle.is_connection_related());
        assert!(!HardwareState::Discovering.is_connection_related());
        assert!(HardwareState::Connecting.is_connection_related());
        assert!(HardwareState::Connected.is_connection_related());
        assert!(HardwareState::Disconnected.is_connection_related());
    }

    #[test]
    fn test_describe_frame() {
        assert_eq!(describe_frame(b"VER 3"), "\"VER 3\"");
        assert_eq!(describe_frame(&[0x00, 0xff]), "0x00ff");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            HardwareError::NotConnected.to_string(),
            "Hardware is not connected"
        );
        assert_eq!(
            HardwareError::DeviceNotFound("x".into()).to_string(),
            "Device not found: x"
        );
    }
}
