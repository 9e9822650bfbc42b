//! # EduBot Protocol
//!
//! 机器人无线链路协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `codec`: 速度编解码、上传长度头、文本/二进制指令编码
//! - `command`: 命令语法（主机 → 设备）与应答标记（设备 → 主机）
//! - `instruction`: 原子电机指令
//! - `version`: 协议方言（V3/V6/V10）与固件版本映射表
//!
//! ## 两个数值域
//!
//! 应用层速度为百分比（0–100），线上为字节（0–255）。两者之间**唯一**的映射
//! 是 [`encode_speed`] / [`decode_speed`]，二者并非严格互逆（量化有损），
//! 固件兼容性依赖于这一特定的舍入方式。

pub mod codec;
pub mod command;
pub mod instruction;
pub mod version;

// 重新导出常用类型
pub use codec::*;
pub use command::*;
pub use instruction::{Instruction, MAX_MOTOR_SPEED};
pub use version::{FIRMWARE_TABLE, ProtocolVersion, protocol_for_firmware};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Motor speed out of range: {field} = {value} (expected 0..=100)")]
    SpeedOutOfRange { field: &'static str, value: u8 },

    #[error("Value out of wire range for {field}: {value} (max {max})")]
    ValueOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Invalid version reply: {0:?}")]
    InvalidVersionReply(String),

    #[error("Invalid interval reply: {0:?}")]
    InvalidIntervalReply(String),

    #[error("Invalid instruction text: {0:?}")]
    InvalidInstructionText(String),

    #[error("Invalid download header: expected 4 bytes, got {actual}")]
    InvalidDownloadHeader { actual: usize },

    #[error("Unsupported firmware version: {0}")]
    UnsupportedFirmware(u32),
}
