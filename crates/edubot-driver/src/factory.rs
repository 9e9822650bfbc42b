//! 协议工厂与固件检测
//!
//! 固件版本 → 协议方言的映射是唯一的选择点；未知版本直接报错，
//! 不会退回到"最接近"的处理器。

use crate::binary::BinaryProtocol;
use crate::config::ProtocolConfig;
use crate::error::DriverError;
use crate::exchange::Exchange;
use crate::handler::ProtocolHandler;
use crate::text::TextProtocol;
use edubot_hal::HardwareLayer;
use edubot_protocol::{Command, ProtocolVersion, parse_version_reply, protocol_for_firmware, reply};
use std::sync::Arc;
use tracing::info;

/// 检测固件版本
///
/// 写 `Z`，等待以 `VER` 开头的应答并解析其后的整数。
/// 非数字负载或超时都会失败。
pub fn detect_firmware_version(
    hardware: Arc<dyn HardwareLayer>,
    config: &ProtocolConfig,
) -> Result<u32, DriverError> {
    let exchange = Exchange::new(hardware, config);
    let mut pending = exchange.arm(Command::QueryVersion.mnemonic())?;
    exchange.send(&Command::QueryVersion)?;

    let text = pending.wait_for(|buffer| {
        let start = buffer.find(reply::VERSION_PREFIX)?;
        let candidate = &buffer[start..];
        let payload = candidate[reply::VERSION_PREFIX.len()..].trim();
        (!payload.is_empty()).then(|| candidate.to_string())
    })?;
    let version = parse_version_reply(&text)?;
    info!("Detected firmware version {}", version);
    Ok(version)
}

/// 按固件版本创建协议处理器
pub fn create_protocol_handler(
    firmware_version: u32,
    hardware: Arc<dyn HardwareLayer>,
    config: &ProtocolConfig,
) -> Result<Box<dyn ProtocolHandler>, DriverError> {
    let version = protocol_for_firmware(firmware_version)?;
    info!(
        "Firmware {} uses protocol {} (max {} instructions)",
        firmware_version,
        version,
        version.max_instructions()
    );
    let handler: Box<dyn ProtocolHandler> = match version {
        ProtocolVersion::V3 => Box::new(TextProtocol::new(hardware, config)),
        ProtocolVersion::V6 | ProtocolVersion::V10 => Box::new(
            BinaryProtocol::new(version, hardware, config).ok_or_else(|| {
                DriverError::UnexpectedResponse(format!("{} is not a binary dialect", version))
            })?,
        ),
    };
    Ok(handler)
}
