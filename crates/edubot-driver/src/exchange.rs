//! 单槽请求/应答交换
//!
//! 每个协议处理器持有一个 [`Exchange`]：它订阅硬件通知，但只在有请求
//! "挂起"时才把数据转交出去。挂起状态是单槽的：
//!
//! 1. `arm()` 在写入**之前**占用槽位，返回 [`PendingRequest`] 守卫；
//!    槽位已被占用时返回 [`DriverError::RequestInFlight`]
//! 2. 通知回调把每个数据块原样送入守卫的 channel；链路错误也走同一 channel，
//!    挂起的请求立即以该错误失败
//! 3. 守卫按截止时间等待（`recv_timeout`），超时即失败
//! 4. 守卫 drop 时释放槽位；之后到达的通知被丢弃（仅记录日志）

use crate::config::ProtocolConfig;
use crate::error::DriverError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use edubot_hal::{HardwareError, HardwareLayer, Subscription, describe_frame};
use edubot_protocol::Command;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

type Delivery = Result<Vec<u8>, HardwareError>;
type Slot = Arc<Mutex<Option<Sender<Delivery>>>>;

/// 请求/应答交换器
pub struct Exchange {
    hardware: Arc<dyn HardwareLayer>,
    slot: Slot,
    timeout: Duration,
    _notifications: Subscription,
    _link_errors: Subscription,
}

impl Exchange {
    pub fn new(hardware: Arc<dyn HardwareLayer>, config: &ProtocolConfig) -> Self {
        let slot: Slot = Arc::new(Mutex::new(None));
        let forward = slot.clone();
        let subscription = hardware.on_notification(Box::new(move |data| {
            match forward.lock().as_ref() {
                Some(tx) => {
                    trace!("<- {}", describe_frame(data));
                    let _ = tx.send(Ok(data.to_vec()));
                },
                None => debug!("Ignoring unsolicited notification {}", describe_frame(data)),
            }
        }));
        let forward = slot.clone();
        let link_errors = hardware.on_link_error(Box::new(move |error| {
            match forward.lock().as_ref() {
                Some(tx) => {
                    let _ = tx.send(Err(error.clone()));
                },
                None => warn!("Link error with no request in flight: {}", error),
            }
        }));

        Self {
            hardware,
            slot,
            timeout: config.response_timeout,
            _notifications: subscription,
            _link_errors: link_errors,
        }
    }

    /// 占用挂起槽位
    ///
    /// `command` 只用于超时错误与日志。
    pub fn arm(&self, command: &'static str) -> Result<PendingRequest<'_>, DriverError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(DriverError::RequestInFlight);
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        *slot = Some(tx);
        Ok(PendingRequest {
            exchange: self,
            rx,
            command,
            buffer: String::new(),
        })
    }

    /// 写入一帧原始字节
    pub fn write(&self, data: &[u8]) -> Result<(), DriverError> {
        debug!("-> {}", describe_frame(data));
        self.hardware.write(data)?;
        Ok(())
    }

    /// 写入一条文本命令（不等待应答）
    pub fn send(&self, command: &Command) -> Result<(), DriverError> {
        self.write(command.encode().as_bytes())
    }

    /// 单次请求：写命令，等待缓冲文本包含 `expected`
    pub fn request(&self, command: &Command, expected: &str) -> Result<String, DriverError> {
        let mut pending = self.arm(command.mnemonic())?;
        self.send(command)?;
        pending.wait_for(|buffer| buffer.contains(expected).then(|| buffer.to_string()))
    }
}

/// 挂起请求守卫
pub struct PendingRequest<'a> {
    exchange: &'a Exchange,
    rx: Receiver<Delivery>,
    command: &'static str,
    /// 尚未被匹配消费的文本
    buffer: String,
}

impl PendingRequest<'_> {
    /// 等待下一块原始数据（二进制方言：每块即一个完整单元）
    pub fn next_chunk(&mut self) -> Result<Vec<u8>, DriverError> {
        match self.rx.recv_timeout(self.exchange.timeout) {
            Ok(Ok(chunk)) => Ok(chunk),
            Ok(Err(error)) => {
                warn!("`{}` failed: {}", self.command, error);
                Err(DriverError::Hardware(error))
            },
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Err(DriverError::Timeout {
                    command: self.command,
                    timeout: self.exchange.timeout,
                })
            },
        }
    }

    /// 缓冲文本直到 `extract` 匹配
    ///
    /// 应答可能被拆成多次通知；每收到一块就重新检查一次。
    /// 匹配成功后清空缓冲。
    pub fn wait_for<T>(
        &mut self,
        mut extract: impl FnMut(&str) -> Option<T>,
    ) -> Result<T, DriverError> {
        loop {
            if let Some(value) = extract(&self.buffer) {
                self.buffer.clear();
                return Ok(value);
            }
            let chunk = self.next_chunk()?;
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.exchange.slot.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingHardware;

    fn exchange(hw: &Arc<RecordingHardware>) -> Exchange {
        Exchange::new(hw.clone(), &ProtocolConfig::with_timeout(Duration::from_millis(200)))
    }

    #[test]
    fn test_request_matches_split_response() {
        let hw = Arc::new(RecordingHardware::with_responder(|frame| match frame {
            b"R" => vec![b"_E".to_vec(), b"ND".to_vec()],
            _ => vec![],
        }));
        let ex = exchange(&hw);
        assert_eq!(ex.request(&Command::Run, "_END").unwrap(), "_END");
        assert_eq!(hw.writes(), vec![b"R".to_vec()]);
    }

    #[test]
    fn test_overlapping_request_is_rejected() {
        let hw = Arc::new(RecordingHardware::silent());
        let ex = exchange(&hw);
        let _first = ex.arm("B").unwrap();
        assert!(matches!(ex.arm("R"), Err(DriverError::RequestInFlight)));
    }

    #[test]
    fn test_slot_released_after_timeout() {
        let hw = Arc::new(RecordingHardware::silent());
        let ex = exchange(&hw);
        let err = ex.request(&Command::Go, "_GO_").unwrap_err();
        assert_eq!(
            err,
            DriverError::Timeout {
                command: "G",
                timeout: Duration::from_millis(200),
            }
        );
        // 槽位已释放，可以再次请求
        assert!(ex.arm("G").is_ok());
    }

    #[test]
    fn test_link_error_fails_pending_request() {
        let hw = Arc::new(RecordingHardware::silent());
        let ex = exchange(&hw);
        let mut pending = ex.arm("B").unwrap();
        hw.link_error(HardwareError::Notification("cccd write failed".into()));
        assert_eq!(
            pending.next_chunk(),
            Err(DriverError::Hardware(HardwareError::Notification(
                "cccd write failed".into()
            )))
        );
    }

    #[test]
    fn test_link_error_without_request_is_not_kept() {
        let hw = Arc::new(RecordingHardware::with_responder(|frame| match frame {
            b"R" => vec![b"_END".to_vec()],
            _ => vec![],
        }));
        let ex = exchange(&hw);
        hw.link_error(HardwareError::Notification("stale".into()));
        assert_eq!(ex.request(&Command::Run, "_END").unwrap(), "_END");
    }

    #[test]
    fn test_unarmed_notifications_are_dropped() {
        let hw = Arc::new(RecordingHardware::silent());
        let ex = exchange(&hw);
        hw.notify(b"stale");
        let mut pending = ex.arm("z").unwrap();
        hw.notify(b"I=12");
        let value = pending
            .wait_for(|buf| buf.contains("I=").then(|| buf.to_string()))
            .unwrap();
        assert_eq!(value, "I=12");
    }
}
