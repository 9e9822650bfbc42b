//! 协议处理器配置

use std::time::Duration;

/// 默认应答超时
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// 协议处理器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// 每一步等待应答的超时
    ///
    /// 适用于每一次等待（而不是整个操作）：下载时每个数据包都重新计时。
    pub response_timeout: Duration,
}

impl ProtocolConfig {
    pub fn with_timeout(response_timeout: Duration) -> Self {
        Self { response_timeout }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}
