//! 驱动层错误类型定义

use edubot_hal::HardwareError;
use edubot_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// 传输层错误（写入被拒、未连接等）
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 等待应答超时
    ///
    /// 不会自动重试；超时之后到达的通知被忽略。
    #[error("Timed out after {timeout:?} waiting for response to `{command}`")]
    Timeout {
        command: &'static str,
        timeout: Duration,
    },

    /// 已有一个未完成的请求
    ///
    /// 同一处理器上的并发调用是调用方的编程错误，不会被排队。
    #[error("Another request is already in flight on this protocol handler")]
    RequestInFlight,

    /// 程序超出固件容量（未写入任何字节）
    #[error("Program too large: {len} instructions (max {max})")]
    ProgramTooLarge { len: usize, max: usize },

    /// 设备应答与期望不符
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}
