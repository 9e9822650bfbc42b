//! 无线链路上的通知错误：挂起的请求立即失败，之后的命令不受影响

use crossbeam_channel::Sender;
use edubot_driver::{BinaryProtocol, DriverError, ProtocolConfig, ProtocolHandler};
use edubot_hal::{
    GattBackend, GattConfig, GattTransport, HardwareError, HardwareLayer, LinkEvent, ScanEvent,
};
use edubot_protocol::ProtocolVersion;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 对 `B` 报告通知错误，对 `R` 正常应答
#[derive(Default)]
struct FlakyNotifyBackend {
    link: Mutex<Option<Sender<LinkEvent>>>,
}

impl GattBackend for FlakyNotifyBackend {
    fn start_scan(&self, _events: Sender<ScanEvent>) -> Result<(), HardwareError> {
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn connect(&self, _device_id: &str, events: Sender<LinkEvent>) -> Result<(), HardwareError> {
        *self.link.lock() = Some(events);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), HardwareError> {
        self.link.lock().take();
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<(), HardwareError> {
        let event = match data {
            b"B" => LinkEvent::Error("notify characteristic failed".to_string()),
            b"R" => LinkEvent::Notification(b"_END".to_vec()),
            _ => return Ok(()),
        };
        if let Some(link) = self.link.lock().as_ref() {
            let _ = link.send(event);
        }
        Ok(())
    }
}

#[test]
fn test_notify_error_fails_in_flight_request() {
    let backend = FlakyNotifyBackend::default();
    let transport = Arc::new(GattTransport::new(backend, GattConfig::default()));
    transport.connect("robot").unwrap();

    let timeout = Duration::from_secs(3);
    let handler = BinaryProtocol::new(
        ProtocolVersion::V6,
        transport.clone(),
        &ProtocolConfig::with_timeout(timeout),
    )
    .unwrap();

    let started = Instant::now();
    assert_eq!(
        handler.download_program(None),
        Err(DriverError::Hardware(HardwareError::Notification(
            "notify characteristic failed".to_string()
        )))
    );
    // 不是等到超时才失败
    assert!(started.elapsed() < timeout);

    // 错误已交给失败的请求，下一个命令正常完成
    handler.run().unwrap();
}
