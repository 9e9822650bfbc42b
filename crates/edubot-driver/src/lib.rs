//! 协议驱动层
//!
//! 把抽象的机器人命令（上传、下载、运行、间隔、录制）翻译为具体方言的
//! 字节序列，经由 [`edubot_hal::HardwareLayer`] 发送，并把异步应答解码为
//! 类型化结果。
//!
//! - [`TextProtocol`]: V3 文本方言（固件 2–4）
//! - [`BinaryProtocol`]: V6 / V10 二进制方言（固件 6–10）
//! - [`create_protocol_handler`]: 固件版本 → 处理器的唯一选择点
//! - [`detect_firmware_version`]: 独立的 `Z` / `VER <n>` 版本查询
//!
//! # 并发
//!
//! 每个处理器内部只有一个挂起请求槽位。调用方必须等待每个命令完成后
//! 再发下一个；重叠调用返回 [`DriverError::RequestInFlight`]。

mod binary;
mod config;
mod error;
mod exchange;
mod factory;
mod handler;
mod text;

#[cfg(test)]
mod mock;

pub use binary::BinaryProtocol;
pub use config::{DEFAULT_RESPONSE_TIMEOUT, ProtocolConfig};
pub use error::DriverError;
pub use factory::{create_protocol_handler, detect_firmware_version};
pub use handler::{ProgressFn, ProtocolHandler};
pub use text::TextProtocol;
