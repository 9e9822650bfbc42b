//! 软件模拟器
//!
//! 实现 [`HardwareLayer`]，模拟 0..N 台机器人，每台可独立配置固件版本（因此可以
//! 同时覆盖 V3/V6/V10 三种方言）。用于测试与无硬件开发。
//!
//! # 时序模型
//!
//! - **发现**：第 `i` 台机器人在扫描开始后 `(i + 1) * discovery_step` 被发现，
//!   `stop_discovery()` / `connect()` 会取消所有尚未触发的发现定时器
//! - **命令**：每条入站帧在到达后 `response_latency` 被处理（处理段），
//!   每条应答在处理后再经过 `response_latency` 送达（通知段）。两段都按到达时间
//!   排程而不是串行累加，因此 100 条上传行的总延迟仍约为 `2 * response_latency`
//!
//! # 线程
//!
//! 每条连接有一个处理线程和一个通知线程，两者之间是 FIFO 队列，
//! 所以同一订阅者看到的通知顺序与应答顺序一致。

mod robot;

pub use robot::{MotionMode, Reply, SimulatedRobot};

use crate::observer::{ListenerRegistry, Subscription};
use crate::{
    DiscoveredDevice, DiscoveryCallback, HardwareError, HardwareLayer, HardwareState,
    describe_frame,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use edubot_protocol::Instruction;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::spawn;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 模拟设备 id 前缀
pub const EMULATOR_ID_PREFIX: &str = "emulator-";

/// 单台模拟机器人的配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "snake_case"))]
pub struct SimulatedRobotConfig {
    /// 广播名
    pub name: String,
    /// 上报的固件版本
    pub firmware_version: u32,
    /// 录制期间"听到"的运动样本
    pub recording_sample: Vec<Instruction>,
}

impl Default for SimulatedRobotConfig {
    fn default() -> Self {
        Self {
            name: "EduBot-EMU".to_string(),
            firmware_version: 3,
            recording_sample: Vec::new(),
        }
    }
}

impl SimulatedRobotConfig {
    /// 以固件版本创建
    pub fn with_firmware(firmware_version: u32) -> Self {
        Self {
            name: format!("EduBot-EMU-fw{}", firmware_version),
            firmware_version,
            ..Self::default()
        }
    }
}

/// 模拟器配置
///
/// 显式传给 [`Emulator::new`]，不存在进程级默认对象。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EmulatorConfig {
    /// 每条命令的固定响应延迟（处理段与通知段各一次）
    #[cfg_attr(feature = "serde", serde(rename = "response_latency_ms", with = "duration_ms"))]
    pub response_latency: Duration,
    /// 发现步长：第 i 台在 `(i + 1) * discovery_step` 后出现
    #[cfg_attr(feature = "serde", serde(rename = "discovery_step_ms", with = "duration_ms"))]
    pub discovery_step: Duration,
    /// 模拟的机器人
    pub robots: Vec<SimulatedRobotConfig>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            response_latency: Duration::from_millis(50),
            discovery_step: Duration::from_secs(1),
            robots: vec![
                SimulatedRobotConfig::with_firmware(3),
                SimulatedRobotConfig::with_firmware(6),
                SimulatedRobotConfig::with_firmware(10),
            ],
        }
    }
}

impl EmulatorConfig {
    /// 以固件版本列表快速构造
    pub fn with_firmware_versions(versions: &[u32]) -> Self {
        Self {
            robots: versions
                .iter()
                .map(|&v| SimulatedRobotConfig::with_firmware(v))
                .collect(),
            ..Self::default()
        }
    }

    /// 设置响应延迟
    pub fn response_latency(mut self, latency: Duration) -> Self {
        self.response_latency = latency;
        self
    }

    /// 设置发现步长
    pub fn discovery_step(mut self, step: Duration) -> Self {
        self.discovery_step = step;
        self
    }
}

#[cfg(feature = "serde")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// 发现会话控制
///
/// `guard` 是可重入锁：发现回调内部调用 `stop_discovery()`/`connect()` 不会死锁，
/// 其他线程的 `stop_discovery()` 会等待正在执行的回调结束，之后不会再有新的发现。
struct DiscoveryControl {
    generation: AtomicU64,
    guard: ReentrantMutex<()>,
    cancel: Mutex<Option<Sender<()>>>,
}

/// 一条活动连接
struct Link {
    device_id: String,
    inbox: Sender<(Instant, Vec<u8>)>,
    alive: Arc<AtomicBool>,
}

/// 模拟器
pub struct Emulator {
    config: EmulatorConfig,
    robots: Vec<Arc<Mutex<SimulatedRobot>>>,
    state: Mutex<HardwareState>,
    state_listeners: ListenerRegistry<HardwareState>,
    notifications: ListenerRegistry<[u8]>,
    link_errors: ListenerRegistry<HardwareError>,
    discovery: Arc<DiscoveryControl>,
    link: Mutex<Option<Link>>,
}

impl Emulator {
    /// 创建模拟器
    pub fn new(config: EmulatorConfig) -> Self {
        let robots = config
            .robots
            .iter()
            .map(|rc| Arc::new(Mutex::new(SimulatedRobot::new(rc))))
            .collect();
        Self {
            config,
            robots,
            state: Mutex::new(HardwareState::Idle),
            state_listeners: ListenerRegistry::new(),
            notifications: ListenerRegistry::new(),
            link_errors: ListenerRegistry::new(),
            discovery: Arc::new(DiscoveryControl {
                generation: AtomicU64::new(0),
                guard: ReentrantMutex::new(()),
                cancel: Mutex::new(None),
            }),
            link: Mutex::new(None),
        }
    }

    /// 配置
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// 第 `index` 台模拟机器人的设备 id
    pub fn device_id(index: usize) -> String {
        format!("{}{}", EMULATOR_ID_PREFIX, index)
    }

    /// 所有模拟设备（不经过发现延迟）
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.config
            .robots
            .iter()
            .enumerate()
            .map(|(i, rc)| DiscoveredDevice::new(Self::device_id(i), Some(rc.name.clone())))
            .collect()
    }

    /// 查看某台模拟机器人当前存储的程序
    pub fn stored_program(&self, device_id: &str) -> Option<Vec<Instruction>> {
        self.robot(device_id).map(|r| r.lock().stored_program())
    }

    /// 查看某台模拟机器人的运动模式
    pub fn motion_mode(&self, device_id: &str) -> Option<MotionMode> {
        self.robot(device_id).map(|r| r.lock().mode())
    }

    /// 模拟通知通道出错（连接保持）
    pub fn simulate_notification_error(&self, message: &str) {
        let error = HardwareError::Notification(message.to_string());
        warn!("Emulated link error: {}", error);
        self.link_errors.emit(&error);
    }

    /// 模拟链路丢失（硬件侧上报的断开）
    pub fn simulate_link_loss(&self) {
        // 先释放 link 锁再广播，监听者可以回调本实例
        let link = self.link.lock().take();
        if let Some(link) = link {
            warn!("Emulated link to {} lost", link.device_id);
            link.alive.store(false, Ordering::SeqCst);
            self.set_state(HardwareState::Disconnected);
        }
    }

    fn robot(&self, device_id: &str) -> Option<&Arc<Mutex<SimulatedRobot>>> {
        let index: usize = device_id.strip_prefix(EMULATOR_ID_PREFIX)?.parse().ok()?;
        self.robots.get(index)
    }

    fn set_state(&self, new_state: HardwareState) {
        let changed = {
            let mut state = self.state.lock();
            let changed = *state != new_state;
            *state = new_state;
            changed
        };
        if changed {
            debug!("Emulator state -> {}", new_state);
            self.state_listeners.emit(&new_state);
        }
    }

    /// 取消发现定时器，不改变状态
    fn cancel_discovery(&self) {
        let _guard = self.discovery.guard.lock();
        self.discovery.generation.fetch_add(1, Ordering::SeqCst);
        // drop 发送端即唤醒所有等待中的发现线程
        self.discovery.cancel.lock().take();
    }

    fn spawn_link(&self, device_id: &str, robot: Arc<Mutex<SimulatedRobot>>) -> Link {
        let latency = self.config.response_latency;
        let alive = Arc::new(AtomicBool::new(true));
        let (inbox_tx, inbox_rx) = crossbeam_channel::unbounded::<(Instant, Vec<u8>)>();
        let (outbox_tx, outbox_rx) = crossbeam_channel::unbounded::<(Instant, Vec<u8>)>();

        // 处理段
        let processing_alive = alive.clone();
        spawn(move || {
            for (arrived, data) in inbox_rx {
                sleep_until(arrived + latency);
                if !processing_alive.load(Ordering::SeqCst) {
                    break;
                }
                let replies = robot.lock().handle_command(&data);
                let processed = Instant::now();
                for reply in replies {
                    if outbox_tx.send((processed + latency, reply.into_bytes())).is_err() {
                        return;
                    }
                }
            }
        });

        // 通知段
        let notify_alive = alive.clone();
        let notifications = self.notifications.clone();
        spawn(move || {
            for (due, bytes) in outbox_rx {
                sleep_until(due);
                if !notify_alive.load(Ordering::SeqCst) {
                    break;
                }
                debug!("Emulator notify <- {}", describe_frame(&bytes));
                notifications.emit(&bytes);
            }
        });

        Link {
            device_id: device_id.to_string(),
            inbox: inbox_tx,
            alive,
        }
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        spin_sleep::sleep(deadline - now);
    }
}

impl HardwareLayer for Emulator {
    fn start_discovery(&self, on_found: DiscoveryCallback) -> Result<(), HardwareError> {
        if let Some(link) = self.link.lock().as_ref() {
            return Err(HardwareError::AlreadyConnected(link.device_id.clone()));
        }
        self.cancel_discovery();

        let (cancel_tx, cancel_rx): (Sender<()>, Receiver<()>) = crossbeam_channel::bounded(0);
        let generation = {
            let _guard = self.discovery.guard.lock();
            *self.discovery.cancel.lock() = Some(cancel_tx);
            self.discovery.generation.load(Ordering::SeqCst)
        };
        self.set_state(HardwareState::Discovering);
        info!("Emulator discovery started ({} robots)", self.robots.len());

        let devices = self.devices();
        let step = self.config.discovery_step;
        let control = self.discovery.clone();
        spawn(move || {
            let started = Instant::now();
            for (index, device) in devices.into_iter().enumerate() {
                let deadline = started + step * (index as u32 + 1);
                match cancel_rx.recv_deadline(deadline) {
                    Err(RecvTimeoutError::Timeout) => {},
                    // 已取消（发送端被 drop）
                    _ => return,
                }
                let _guard = control.guard.lock();
                if control.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                debug!("Emulator revealed {}", device.id);
                on_found(device);
            }
        });
        Ok(())
    }

    fn stop_discovery(&self) {
        self.cancel_discovery();
        let discovering = *self.state.lock() == HardwareState::Discovering;
        if discovering {
            self.set_state(HardwareState::Idle);
            info!("Emulator discovery stopped");
        }
    }

    fn connect(&self, device_id: &str) -> Result<(), HardwareError> {
        self.cancel_discovery();
        if let Some(link) = self.link.lock().as_ref() {
            return Err(HardwareError::AlreadyConnected(link.device_id.clone()));
        }

        self.set_state(HardwareState::Connecting);
        sleep_until(Instant::now() + self.config.response_latency);

        let Some(robot) = self.robot(device_id).cloned() else {
            self.set_state(HardwareState::Idle);
            return Err(HardwareError::DeviceNotFound(device_id.to_string()));
        };

        let link = self.spawn_link(device_id, robot);
        *self.link.lock() = Some(link);
        info!("Emulator connected to {}", device_id);
        self.set_state(HardwareState::Connected);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), HardwareError> {
        let link = self.link.lock().take();
        if let Some(link) = link {
            link.alive.store(false, Ordering::SeqCst);
            info!("Emulator disconnected from {}", link.device_id);
            self.set_state(HardwareState::Disconnected);
        }
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<(), HardwareError> {
        let link = self.link.lock();
        let link = link.as_ref().ok_or(HardwareError::NotConnected)?;
        debug!("Emulator write -> {}", describe_frame(data));
        link.inbox
            .send((Instant::now(), data.to_vec()))
            .map_err(|_| HardwareError::WriteRejected("emulated link closed".to_string()))
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
        self.state_listeners.subscribe(move |state| callback(state))
    }

    fn state(&self) -> HardwareState {
        *self.state.lock()
    }

    fn connected_device(&self) -> Option<String> {
        self.link.lock().as_ref().map(|l| l.device_id.clone())
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.cancel_discovery();
        if let Some(link) = self.link.lock().take() {
            link.alive.store(false, Ordering::SeqCst);
        }
    }
}
