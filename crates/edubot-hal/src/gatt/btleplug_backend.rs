//! btleplug 后端
//!
//! btleplug 是异步 API；本后端持有一个私有 tokio runtime，
//! 把每个操作 `block_on` 成阻塞调用，事件流由 runtime 上的任务泵到 channel。

use super::{GattBackend, GattConfig, LinkEvent, ScanEvent};
use crate::HardwareError;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use crossbeam_channel::Sender;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

struct ActiveLink {
    peripheral: Peripheral,
    write_char: Characteristic,
    pump: JoinHandle<()>,
}

/// 基于 btleplug 的 GATT 后端（第一个可用适配器）
pub struct BtleplugBackend {
    runtime: Runtime,
    adapter: Adapter,
    write_uuid: Uuid,
    notify_uuid: Uuid,
    /// 扫描中见到的设备：不透明 id 字符串 → 平台 id
    known: Arc<Mutex<HashMap<String, PeripheralId>>>,
    scan_pump: Mutex<Option<JoinHandle<()>>>,
    link: Mutex<Option<ActiveLink>>,
}

fn backend_err(e: btleplug::Error) -> HardwareError {
    HardwareError::Backend(e.to_string())
}

fn parse_uuid(value: &str) -> Result<Uuid, HardwareError> {
    Uuid::parse_str(value)
        .map_err(|e| HardwareError::Backend(format!("invalid UUID {:?}: {}", value, e)))
}

fn id_string(id: &PeripheralId) -> String {
    format!("{:?}", id)
}

impl BtleplugBackend {
    pub fn new(config: &GattConfig) -> Result<Self, HardwareError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| HardwareError::AdapterUnavailable(e.to_string()))?;

        let adapter = runtime.block_on(async {
            let manager = Manager::new().await.map_err(backend_err)?;
            let adapters = manager.adapters().await.map_err(backend_err)?;
            adapters.into_iter().next().ok_or_else(|| {
                HardwareError::AdapterUnavailable("no Bluetooth adapter found".to_string())
            })
        })?;

        Ok(Self {
            runtime,
            adapter,
            write_uuid: parse_uuid(&config.write_characteristic)?,
            notify_uuid: parse_uuid(&config.notify_characteristic)?,
            known: Arc::new(Mutex::new(HashMap::new())),
            scan_pump: Mutex::new(None),
            link: Mutex::new(None),
        })
    }

    fn lookup(&self, device_id: &str) -> Result<PeripheralId, HardwareError> {
        self.known
            .lock()
            .get(device_id)
            .cloned()
            .ok_or_else(|| HardwareError::DeviceNotFound(device_id.to_string()))
    }
}

impl GattBackend for BtleplugBackend {
    fn start_scan(&self, events: Sender<ScanEvent>) -> Result<(), HardwareError> {
        let adapter = self.adapter.clone();
        let mut stream = self
            .runtime
            .block_on(async {
                let stream = adapter.events().await?;
                adapter.start_scan(ScanFilter::default()).await?;
                Ok::<_, btleplug::Error>(stream)
            })
            .map_err(|e| HardwareError::Scan(e.to_string()))?;

        let known = self.known.clone();
        let pump = self.runtime.spawn(async move {
            while let Some(event) = stream.next().await {
                let (CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) = event
                else {
                    continue;
                };
                let name = match adapter.peripheral(&id).await {
                    Ok(peripheral) => match peripheral.properties().await {
                        Ok(props) => props.and_then(|p| p.local_name),
                        Err(e) => {
                            let _ = events.send(ScanEvent::Error(e.to_string()));
                            return;
                        },
                    },
                    Err(e) => {
                        let _ = events.send(ScanEvent::Error(e.to_string()));
                        return;
                    },
                };
                let key = id_string(&id);
                known.lock().insert(key.clone(), id);
                let found = ScanEvent::Found { id: key, name };
                if events.send(found).is_err() {
                    return;
                }
            }
        });
        if let Some(old) = self.scan_pump.lock().replace(pump) {
            old.abort();
        }
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), HardwareError> {
        if let Some(pump) = self.scan_pump.lock().take() {
            pump.abort();
        }
        self.runtime
            .block_on(self.adapter.stop_scan())
            .map_err(|e| HardwareError::Scan(e.to_string()))
    }

    fn connect(&self, device_id: &str, events: Sender<LinkEvent>) -> Result<(), HardwareError> {
        let id = match self.lookup(device_id) {
            Ok(id) => id,
            Err(_) => {
                // 未经本后端扫描见到的 id：再查一次适配器缓存
                let peripherals = self
                    .runtime
                    .block_on(self.adapter.peripherals())
                    .map_err(backend_err)?;
                peripherals
                    .iter()
                    .map(|p| p.id())
                    .find(|id| id_string(id) == device_id)
                    .ok_or_else(|| HardwareError::DeviceNotFound(device_id.to_string()))?
            },
        };

        let write_uuid = self.write_uuid;
        let notify_uuid = self.notify_uuid;
        let adapter = self.adapter.clone();
        let (peripheral, write_char, mut notifications) = self.runtime.block_on(async {
            let peripheral = adapter.peripheral(&id).await.map_err(backend_err)?;
            peripheral.connect().await.map_err(backend_err)?;
            peripheral.discover_services().await.map_err(backend_err)?;

            let characteristics = peripheral.characteristics();
            let find = |uuid: Uuid| {
                characteristics
                    .iter()
                    .find(|c| c.uuid == uuid)
                    .cloned()
                    .ok_or_else(|| HardwareError::Backend(format!("characteristic {} not found", uuid)))
            };
            let write_char = find(write_uuid)?;
            let notify_char = find(notify_uuid)?;

            peripheral
                .subscribe(&notify_char)
                .await
                .map_err(|e| HardwareError::Notification(e.to_string()))?;
            let notifications = peripheral.notifications().await.map_err(backend_err)?;
            Ok::<_, HardwareError>((peripheral, write_char, notifications))
        })?;
        debug!("btleplug connected to {}", device_id);

        let pump = self.runtime.spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != notify_uuid {
                    continue;
                }
                if events.send(LinkEvent::Notification(notification.value)).is_err() {
                    return;
                }
            }
            let _ = events.send(LinkEvent::Disconnected);
        });

        *self.link.lock() = Some(ActiveLink {
            peripheral,
            write_char,
            pump,
        });
        Ok(())
    }

    fn disconnect(&self) -> Result<(), HardwareError> {
        let Some(link) = self.link.lock().take() else {
            return Ok(());
        };
        link.pump.abort();
        self.runtime
            .block_on(link.peripheral.disconnect())
            .map_err(backend_err)
    }

    fn write(&self, data: &[u8]) -> Result<(), HardwareError> {
        let link = self.link.lock();
        let Some(link) = link.as_ref() else {
            return Err(HardwareError::NotConnected);
        };
        self.runtime
            .block_on(
                link.peripheral
                    .write(&link.write_char, data, WriteType::WithoutResponse),
            )
            .map_err(|e| HardwareError::WriteRejected(e.to_string()))
    }
}

impl Drop for BtleplugBackend {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!("btleplug disconnect on drop failed: {}", e);
        }
    }
}
