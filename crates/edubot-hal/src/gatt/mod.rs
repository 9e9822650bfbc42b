//! 真实无线链路（GATT）
//!
//! [`GattTransport`] 在一个最小的阻塞式后端接口 [`GattBackend`] 之上实现
//! [`HardwareLayer`]，负责与具体蓝牙栈无关的部分：
//!
//! - 按产品名前缀过滤广播，并对设备 id 去重
//! - 状态转换与广播
//! - 扫描错误：降级为 `Idle` 并停止扫描（不影响整个会话）
//! - 写入失败以 `Err` 返回；通知错误立即广播给链路错误监听者
//!   （协议层据此让挂起的请求失败）
//!
//! 后端通过 channel 把扫描事件和链路事件推送上来，由本模块的泵线程分发。

#[cfg(feature = "ble")]
mod btleplug_backend;

#[cfg(feature = "ble")]
pub use btleplug_backend::BtleplugBackend;

use crate::observer::{ListenerRegistry, Subscription};
use crate::{
    DiscoveredDevice, DiscoveryCallback, HardwareError, HardwareLayer, HardwareState,
    describe_frame,
};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::spawn;
use tracing::{debug, info, warn};

/// Nordic UART Service UUID
pub const NUS_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";
/// NUS RX 特征（主机写入）
pub const NUS_RX_CHAR_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";
/// NUS TX 特征（设备通知）
pub const NUS_TX_CHAR_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// GATT 链路配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattConfig {
    /// 广播名前缀（固定产品前缀）
    pub name_prefix: String,
    pub service_uuid: String,
    /// 写特征
    pub write_characteristic: String,
    /// 通知特征
    pub notify_characteristic: String,
}

impl Default for GattConfig {
    fn default() -> Self {
        Self {
            name_prefix: "EduBot".to_string(),
            service_uuid: NUS_SERVICE_UUID.to_string(),
            write_characteristic: NUS_RX_CHAR_UUID.to_string(),
            notify_characteristic: NUS_TX_CHAR_UUID.to_string(),
        }
    }
}

/// 扫描事件（后端 → 传输层）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Found { id: String, name: Option<String> },
    Error(String),
}

/// 链路事件（后端 → 传输层）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Notification(Vec<u8>),
    Error(String),
    Disconnected,
}

/// 阻塞式 GATT 后端
///
/// 实现负责服务/特征发现与订阅；`connect` 成功后通过 `events` 推送通知。
pub trait GattBackend: Send + Sync + 'static {
    fn start_scan(&self, events: Sender<ScanEvent>) -> Result<(), HardwareError>;
    fn stop_scan(&self) -> Result<(), HardwareError>;
    fn connect(&self, device_id: &str, events: Sender<LinkEvent>) -> Result<(), HardwareError>;
    fn disconnect(&self) -> Result<(), HardwareError>;
    fn write(&self, data: &[u8]) -> Result<(), HardwareError>;
}

fn matches_prefix(prefix: &str, name: Option<&str>) -> bool {
    name.is_some_and(|n| n.starts_with(prefix))
}

struct Shared {
    state: Mutex<HardwareState>,
    state_listeners: ListenerRegistry<HardwareState>,
    notifications: ListenerRegistry<[u8]>,
    /// 扫描会话代号，用于丢弃过期扫描线程的事件
    scan_generation: Mutex<u64>,
    connected: Mutex<Option<String>>,
    link_errors: ListenerRegistry<HardwareError>,
}

impl Shared {
    fn set_state(&self, new_state: HardwareState) {
        let changed = {
            let mut state = self.state.lock();
            let changed = *state != new_state;
            *state = new_state;
            changed
        };
        if changed {
            info!("GATT transport state -> {}", new_state);
            self.state_listeners.emit(&new_state);
        }
    }
}

/// 真实无线传输
pub struct GattTransport<B: GattBackend> {
    backend: Arc<B>,
    config: GattConfig,
    shared: Arc<Shared>,
}

impl<B: GattBackend> GattTransport<B> {
    pub fn new(backend: B, config: GattConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(HardwareState::Idle),
                state_listeners: ListenerRegistry::new(),
                notifications: ListenerRegistry::new(),
                scan_generation: Mutex::new(0),
                connected: Mutex::new(None),
                link_errors: ListenerRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &GattConfig {
        &self.config
    }

    fn halt_scan(&self) {
        *self.shared.scan_generation.lock() += 1;
        if let Err(e) = self.backend.stop_scan() {
            warn!("Failed to stop scan: {}", e);
        }
    }
}

impl<B: GattBackend> HardwareLayer for GattTransport<B> {
    fn start_discovery(&self, on_found: DiscoveryCallback) -> Result<(), HardwareError> {
        if let Some(id) = self.shared.connected.lock().clone() {
            return Err(HardwareError::AlreadyConnected(id));
        }
        self.halt_scan();
        let generation = *self.shared.scan_generation.lock();

        let (tx, rx) = crossbeam_channel::unbounded();
        self.backend.start_scan(tx)?;
        self.shared.set_state(HardwareState::Discovering);

        let shared = self.shared.clone();
        let backend = self.backend.clone();
        let prefix = self.config.name_prefix.clone();
        spawn(move || {
            let mut seen = HashSet::new();
            for event in rx {
                if *shared.scan_generation.lock() != generation {
                    return;
                }
                match event {
                    ScanEvent::Found { id, name } => {
                        if matches_prefix(&prefix, name.as_deref()) && seen.insert(id.clone()) {
                            debug!("Discovered {} ({:?})", id, name);
                            on_found(DiscoveredDevice { id, name });
                        }
                    },
                    ScanEvent::Error(message) => {
                        warn!("Scan error, stopping discovery: {}", message);
                        *shared.scan_generation.lock() += 1;
                        if let Err(e) = backend.stop_scan() {
                            warn!("Failed to stop scan: {}", e);
                        }
                        if *shared.state.lock() == HardwareState::Discovering {
                            shared.set_state(HardwareState::Idle);
                        }
                        return;
                    },
                }
            }
        });
        Ok(())
    }

    fn stop_discovery(&self) {
        self.halt_scan();
        if *self.shared.state.lock() == HardwareState::Discovering {
            self.shared.set_state(HardwareState::Idle);
        }
    }

    fn connect(&self, device_id: &str) -> Result<(), HardwareError> {
        self.halt_scan();
        if let Some(id) = self.shared.connected.lock().clone() {
            return Err(HardwareError::AlreadyConnected(id));
        }

        self.shared.set_state(HardwareState::Connecting);
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Err(e) = self.backend.connect(device_id, tx) {
            warn!("Connect to {} failed: {}", device_id, e);
            self.shared.set_state(HardwareState::Idle);
            return Err(e);
        }
        *self.shared.connected.lock() = Some(device_id.to_string());
        self.shared.set_state(HardwareState::Connected);

        let shared = self.shared.clone();
        let device = device_id.to_string();
        spawn(move || {
            for event in rx {
                match event {
                    LinkEvent::Notification(data) => {
                        debug!("GATT notify <- {}", describe_frame(&data));
                        shared.notifications.emit(&data);
                    },
                    LinkEvent::Error(message) => {
                        warn!("Notification error from {}: {}", device, message);
                        shared.link_errors.emit(&HardwareError::Notification(message));
                    },
                    LinkEvent::Disconnected => break,
                }
            }
            // 后端关闭了事件通道或上报断开
            let was_ours = {
                let mut connected = shared.connected.lock();
                if connected.as_deref() == Some(device.as_str()) {
                    *connected = None;
                    true
                } else {
                    false
                }
            };
            if was_ours {
                warn!("Device {} disconnected", device);
                shared.set_state(HardwareState::Disconnected);
            }
        });
        Ok(())
    }

    fn disconnect(&self) -> Result<(), HardwareError> {
        let Some(id) = self.shared.connected.lock().take() else {
            return Ok(());
        };
        let result = self.backend.disconnect();
        info!("Disconnected from {}", id);
        self.shared.set_state(HardwareState::Disconnected);
        result
    }

    fn write(&self, data: &[u8]) -> Result<(), HardwareError> {
        if self.shared.connected.lock().is_none() {
            return Err(HardwareError::NotConnected);
        }
        debug!("GATT write -> {}", describe_frame(data));
        self.backend.write(data)
    }

    fn on_notification(&self, callback: Box<dyn Fn(&[u8]) + Send + Sync>) -> Subscription {
        self.shared.notifications.subscribe(move |data| callback(data))
    }

    fn on_link_error(&self, callback: Box<dyn Fn(&HardwareError) + Send + Sync>) -> Subscription {
        self.shared.link_errors.subscribe(move |e| callback(e))
    }

    fn on_state_change(
        &self,
        callback: Box<dyn Fn(&HardwareState) + Send + Sync>,
    ) -> Subscription {
        self.shared.state_listeners.subscribe(move |s| callback(s))
    }

    fn state(&self) -> HardwareState {
        *self.shared.state.lock()
    }

    fn connected_device(&self) -> Option<String> {
        self.shared.connected.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Receiver, unbounded};
    use std::time::Duration;

    /// 脚本化后端：测试直接向事件通道推送
    #[derive(Default)]
    struct FakeBackend {
        scan_tx: Mutex<Option<Sender<ScanEvent>>>,
        link_tx: Mutex<Option<Sender<LinkEvent>>>,
        writes: Mutex<Vec<Vec<u8>>>,
        reject_writes: Mutex<bool>,
        fail_stop_scan: Mutex<bool>,
    }

    impl GattBackend for Arc<FakeBackend> {
        fn start_scan(&self, events: Sender<ScanEvent>) -> Result<(), HardwareError> {
            *self.scan_tx.lock() = Some(events);
            Ok(())
        }
        fn stop_scan(&self) -> Result<(), HardwareError> {
            self.scan_tx.lock().take();
            if *self.fail_stop_scan.lock() {
                return Err(HardwareError::Scan("adapter gone".into()));
            }
            Ok(())
        }
        fn connect(&self, device_id: &str, events: Sender<LinkEvent>) -> Result<(), HardwareError> {
            if device_id == "missing" {
                return Err(HardwareError::DeviceNotFound(device_id.to_string()));
            }
            *self.link_tx.lock() = Some(events);
            Ok(())
        }
        fn disconnect(&self) -> Result<(), HardwareError> {
            self.link_tx.lock().take();
            Ok(())
        }
        fn write(&self, data: &[u8]) -> Result<(), HardwareError> {
            if *self.reject_writes.lock() {
                return Err(HardwareError::WriteRejected("gatt error".into()));
            }
            self.writes.lock().push(data.to_vec());
            Ok(())
        }
    }

    fn transport() -> (GattTransport<Arc<FakeBackend>>, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::default());
        (
            GattTransport::new(backend.clone(), GattConfig::default()),
            backend,
        )
    }

    fn collect_found(t: &GattTransport<Arc<FakeBackend>>) -> Receiver<DiscoveredDevice> {
        let (tx, rx) = unbounded();
        t.start_discovery(Box::new(move |d| {
            let _ = tx.send(d);
        }))
        .unwrap();
        rx
    }

    fn scan_sender(backend: &FakeBackend) -> Sender<ScanEvent> {
        backend.scan_tx.lock().clone().unwrap()
    }

    #[test]
    fn test_prefix_filter_and_dedupe() {
        let (t, backend) = transport();
        let found = collect_found(&t);
        assert_eq!(t.state(), HardwareState::Discovering);

        let scan = scan_sender(&backend);
        for (id, name) in [
            ("a", Some("EduBot-1")),
            ("b", Some("Headphones")),
            ("c", None),
            ("a", Some("EduBot-1")),
            ("d", Some("EduBot-2")),
        ] {
            scan.send(ScanEvent::Found {
                id: id.to_string(),
                name: name.map(str::to_string),
            })
            .unwrap();
        }

        let a = found.recv_timeout(Duration::from_secs(1)).unwrap();
        let d = found.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!((a.id.as_str(), d.id.as_str()), ("a", "d"));
        assert!(found.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_scan_error_degrades_to_idle() {
        let (t, backend) = transport();
        let (tx, rx) = unbounded();
        let _sub = t.on_state_change(Box::new(move |s| {
            let _ = tx.send(*s);
        }));
        let _found = collect_found(&t);
        scan_sender(&backend)
            .send(ScanEvent::Error("adapter reset".into()))
            .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            HardwareState::Discovering
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            HardwareState::Idle
        );
        assert!(backend.scan_tx.lock().is_none());
    }

    #[test]
    fn test_scan_error_degrades_even_if_stop_scan_fails() {
        let (t, backend) = transport();
        let (tx, rx) = unbounded();
        let _sub = t.on_state_change(Box::new(move |s| {
            let _ = tx.send(*s);
        }));
        let _found = collect_found(&t);
        *backend.fail_stop_scan.lock() = true;
        scan_sender(&backend)
            .send(ScanEvent::Error("adapter reset".into()))
            .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            HardwareState::Discovering
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            HardwareState::Idle
        );
    }

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix("EduBot", Some("EduBot Mini")));
        assert!(!matches_prefix("EduBot", Some("edubot")));
        assert!(!matches_prefix("EduBot", None));
    }

    #[test]
    fn test_connect_write_and_notify() {
        let (t, backend) = transport();
        let (tx, rx) = unbounded();
        let _sub = t.on_notification(Box::new(move |d| {
            let _ = tx.send(d.to_vec());
        }));

        assert_eq!(t.write(b"Z"), Err(HardwareError::NotConnected));
        t.connect("a").unwrap();
        assert_eq!(t.state(), HardwareState::Connected);
        t.write(b"Z").unwrap();
        assert_eq!(backend.writes.lock().as_slice(), &[b"Z".to_vec()]);

        let link = backend.link_tx.lock().clone().unwrap();
        link.send(LinkEvent::Notification(b"VER 6".to_vec())).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), b"VER 6");
    }

    #[test]
    fn test_write_failure_propagates() {
        let (t, backend) = transport();
        t.connect("a").unwrap();
        *backend.reject_writes.lock() = true;
        assert!(matches!(t.write(b"R"), Err(HardwareError::WriteRejected(_))));
    }

    #[test]
    fn test_notify_error_is_broadcast_immediately() {
        let (t, backend) = transport();
        let (tx, rx) = unbounded();
        let _sub = t.on_link_error(Box::new(move |e| {
            let _ = tx.send(e.clone());
        }));
        t.connect("a").unwrap();
        let link = backend.link_tx.lock().clone().unwrap();
        link.send(LinkEvent::Error("cccd write failed".into())).unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            HardwareError::Notification("cccd write failed".into())
        );
        // 链路本身仍然可用，后续写入不受影响
        assert_eq!(t.state(), HardwareState::Connected);
        assert!(t.write(b"R").is_ok());
    }

    #[test]
    fn test_remote_disconnect() {
        let (t, backend) = transport();
        t.connect("a").unwrap();
        let link = backend.link_tx.lock().clone().unwrap();
        link.send(LinkEvent::Disconnected).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(t.state(), HardwareState::Disconnected);
        assert_eq!(t.connected_device(), None);
    }

    #[test]
    fn test_connect_failure_returns_to_idle() {
        let (t, _) = transport();
        assert!(matches!(
            t.connect("missing"),
            Err(HardwareError::DeviceNotFound(_))
        ));
        assert_eq!(t.state(), HardwareState::Idle);
    }
}
