//! 测试用硬件：记录所有写入，按脚本异步应答

use crossbeam_channel::Sender;
use edubot_hal::{
    DiscoveryCallback, HardwareError, HardwareLayer, HardwareState, ListenerRegistry,
    Subscription,
};
use parking_lot::Mutex;
use std::thread::spawn;

type Responder = Box<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

pub struct RecordingHardware {
    writes: Mutex<Vec<Vec<u8>>>,
    notifications: ListenerRegistry<[u8]>,
    link_errors: ListenerRegistry<HardwareError>,
    states: ListenerRegistry<HardwareState>,
    responder: Responder,
    /// 应答由单独线程按 FIFO 发出
    outbox: Sender<Vec<u8>>,
}

impl RecordingHardware {
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        let notifications = ListenerRegistry::<[u8]>::new();
        let (outbox, rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        let registry = notifications.clone();
        spawn(move || {
            for frame in rx {
                registry.emit(&frame);
            }
        });
        Self {
            writes: Mutex::new(Vec::new()),
            notifications,
            link_errors: ListenerRegistry::new(),
            states: ListenerRegistry::new(),
            responder: Box::new(responder),
            outbox,
        }
    }

    /// 从不应答
    pub fn silent() -> Self {
        Self::with_responder(|_| Vec::new())
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// 同步推送一条通知
    pub fn notify(&self, data: &[u8]) {
        self.notifications.emit(data);
    }

    /// 同步推送一个链路错误
    pub fn link_error(&self, error: HardwareError) {
        self.link_errors.emit(&error);
    }
}

impl HardwareLayer for RecordingHardware {
    fn start_discovery(&self, _on_found: DiscoveryCallback) -> Result<(), HardwareError> {
        Ok(())
    }

    fn stop_discovery(&self) {}

    fn connect(&self, _device_id: &str) -> Result<(), HardwareError> {
        Ok(())
    }

    fn disconnect(&self) -> Result<(), HardwareError> {
        self.states.emit(&HardwareState::Disconnected);
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<(), HardwareError> {
        self.writes.lock().push(data.to_vec());
        for reply in (self.responder)(data) {
            let _ = self.outbox.send(reply);
        }
        Ok(())
    }

    fn on_notification(&self, callback: Box<dyn Fn(&[u8]) + Send + Sync>) -> Subscription {
        self.notifications.subscribe(move |data| callback(data))
    }

    fn on_link_error(&self, callback: Box<dyn Fn(&HardwareError) + Send + Sync>) -> Subscription {
        self.link_errors.subscribe(move |e| callback(e))
    }

    fn on_state_change(
        &self,
        callback: Box<dyn Fn(&HardwareState) + Send + Sync>,
    ) -> Subscription {
        self.states.subscribe(move |s| callback(s))
    }

    fn state(&self) -> HardwareState {
        HardwareState::Connected
    }

    fn connected_device(&self) -> Option<String> {
        Some("mock".to_string())
    }
}
