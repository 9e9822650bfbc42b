//! 机器人命令外观
//!
//! 把一个 [`HardwareLayer`] 和一个 [`ProtocolHandler`] 组合成一台机器人：
//! 连接状态机、运行状态机、命令前置校验、进度与错误事件广播。
//!
//! # 并发
//!
//! 同一时刻最多一个命令在执行。这由调用约定保证（每个命令都阻塞到完成），
//! 外观层不排队也不加锁串行化；重叠调用会在协议处理器处得到
//! `RequestInFlight`。

use crate::error::{RobotError, RobotErrorCode};
use crate::state::{ConnectionState, OperationalState, Operation, RobotEvent};
use edubot_driver::{
    DriverError, ProtocolConfig, ProtocolHandler, create_protocol_handler,
    detect_firmware_version,
};
use edubot_hal::{HardwareLayer, HardwareState, ListenerRegistry, Subscription};
use edubot_protocol::{
    Instruction, MAX_INTERVAL_DECISECONDS, MAX_RECORDING_SECONDS, ProtocolVersion,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 已建立的会话：连接 + 固件检测成功后才存在
struct Session {
    device_id: String,
    firmware_version: u32,
    handler: Arc<dyn ProtocolHandler>,
}

struct Shared {
    connection: Mutex<ConnectionState>,
    operational: Mutex<OperationalState>,
    session: RwLock<Option<Session>>,
    events: ListenerRegistry<RobotEvent>,
}

impl Shared {
    fn set_connection(&self, state: ConnectionState) {
        let changed = std::mem::replace(&mut *self.connection.lock(), state) != state;
        if changed {
            info!("Robot connection -> {}", state);
            self.events.emit(&RobotEvent::ConnectionState(state));
        }
    }

    fn set_operational(&self, state: OperationalState) {
        let changed = std::mem::replace(&mut *self.operational.lock(), state) != state;
        if changed {
            info!("Robot operation -> {}", state);
            self.events.emit(&RobotEvent::OperationalState(state));
        }
    }

    fn broadcast_error(&self, err: &RobotError) {
        error!("{} [{}]", err, err.code);
        self.events.emit(&RobotEvent::Error(err.clone()));
    }

    /// 硬件上报断开
    fn on_link_lost(&self) {
        if self.session.write().take().is_some() {
            warn!("Hardware reported disconnect");
            self.set_operational(OperationalState::Idle);
            self.set_connection(ConnectionState::Disconnected);
        }
    }
}

/// 一台机器人
pub struct Robot {
    hardware: Arc<dyn HardwareLayer>,
    config: ProtocolConfig,
    shared: Arc<Shared>,
    link_watch: Mutex<Option<Subscription>>,
}

impl Robot {
    /// 创建未连接的机器人
    pub fn new(hardware: Arc<dyn HardwareLayer>, config: ProtocolConfig) -> Self {
        Self {
            hardware,
            config,
            shared: Arc::new(Shared {
                connection: Mutex::new(ConnectionState::Disconnected),
                operational: Mutex::new(OperationalState::Idle),
                session: RwLock::new(None),
                events: ListenerRegistry::new(),
            }),
            link_watch: Mutex::new(None),
        }
    }

    /// 创建并连接
    pub fn open(
        hardware: Arc<dyn HardwareLayer>,
        device_id: &str,
        config: ProtocolConfig,
    ) -> Result<Self, RobotError> {
        let robot = Self::new(hardware, config);
        robot.connect(device_id)?;
        Ok(robot)
    }

    // ==================== 状态查询 ====================

    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.connection.lock()
    }

    pub fn operational_state(&self) -> OperationalState {
        *self.shared.operational.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn device_id(&self) -> Option<String> {
        self.shared.session.read().as_ref().map(|s| s.device_id.clone())
    }

    pub fn firmware_version(&self) -> Option<u32> {
        self.shared.session.read().as_ref().map(|s| s.firmware_version)
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.shared.session.read().as_ref().map(|s| s.handler.version())
    }

    pub fn max_instructions(&self) -> Option<usize> {
        self.shared
            .session
            .read()
            .as_ref()
            .map(|s| s.handler.max_instructions())
    }

    // ==================== 事件 ====================

    /// 订阅所有事件
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RobotEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(callback)
    }

    /// 只订阅错误
    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RobotError) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(move |event| {
            if let RobotEvent::Error(err) = event {
                callback(err);
            }
        })
    }

    // ==================== 连接 ====================

    /// 连接设备并检测固件
    ///
    /// 失败时连接状态进入 `Error`，错误被广播后返回。
    pub fn connect(&self, device_id: &str) -> Result<(), RobotError> {
        let current = self.connection_state();
        if matches!(current, ConnectionState::Connecting | ConnectionState::Connected) {
            return Err(RobotError::new(
                RobotErrorCode::InvalidState,
                format!("Robot is already {}", current),
            ));
        }

        self.shared.set_connection(ConnectionState::Connecting);
        match self.establish(device_id) {
            Ok(session) => {
                info!(
                    "Connected to {} (firmware {}, protocol {})",
                    session.device_id,
                    session.firmware_version,
                    session.handler.version()
                );
                *self.shared.session.write() = Some(session);
                self.watch_link();
                self.shared.set_operational(OperationalState::Idle);
                self.shared.set_connection(ConnectionState::Connected);
                Ok(())
            },
            Err(err) => {
                self.shared.broadcast_error(&err);
                self.shared.set_connection(ConnectionState::Error);
                Err(err)
            },
        }
    }

    fn establish(&self, device_id: &str) -> Result<Session, RobotError> {
        self.hardware.connect(device_id).map_err(|e| {
            RobotError::new(RobotErrorCode::ConnectionFailed, "Connection failed")
                .with_details(e.to_string())
        })?;

        let handler = detect_firmware_version(self.hardware.clone(), &self.config)
            .and_then(|firmware| {
                create_protocol_handler(firmware, self.hardware.clone(), &self.config)
                    .map(|handler| (firmware, handler))
            });
        match handler {
            Ok((firmware_version, handler)) => Ok(Session {
                device_id: device_id.to_string(),
                firmware_version,
                handler: Arc::from(handler),
            }),
            Err(e) => {
                if let Err(disconnect_err) = self.hardware.disconnect() {
                    warn!("Disconnect after failed detection: {}", disconnect_err);
                }
                Err(RobotError::from_driver(
                    RobotErrorCode::ConnectionFailed,
                    "Firmware detection failed",
                    &e,
                ))
            },
        }
    }

    fn watch_link(&self) {
        let shared = self.shared.clone();
        let subscription = self.hardware.on_state_change(Box::new(move |state| {
            if *state == HardwareState::Disconnected {
                shared.on_link_lost();
            }
        }));
        *self.link_watch.lock() = Some(subscription);
    }

    /// 断开连接（未连接时为空操作）
    pub fn disconnect(&self) -> Result<(), RobotError> {
        self.link_watch.lock().take();
        let had_session = self.shared.session.write().take().is_some();
        let result = if had_session {
            self.hardware.disconnect().map_err(|e| {
                RobotError::new(RobotErrorCode::ConnectionFailed, "Disconnect failed")
                    .with_details(e.to_string())
            })
        } else {
            Ok(())
        };
        self.shared.set_operational(OperationalState::Idle);
        self.shared.set_connection(ConnectionState::Disconnected);
        result
    }

    // ==================== 命令 ====================

    fn handler(&self) -> Result<Arc<dyn ProtocolHandler>, RobotError> {
        if !self.is_connected() {
            return Err(RobotError::not_connected());
        }
        self.shared
            .session
            .read()
            .as_ref()
            .map(|s| s.handler.clone())
            .ok_or_else(RobotError::not_connected)
    }

    /// 执行一条命令
    ///
    /// `during` 为执行期间的运行状态；成功后进入 `after`（`None` 表示不变）。
    /// 失败时广播错误、回到 `Idle` 并返回错误。
    fn execute<T>(
        &self,
        handler: &dyn ProtocolHandler,
        during: Option<OperationalState>,
        after: Option<OperationalState>,
        failure: (RobotErrorCode, &str),
        command: impl FnOnce(&dyn ProtocolHandler) -> Result<T, DriverError>,
    ) -> Result<T, RobotError> {
        if let Some(state) = during {
            self.shared.set_operational(state);
        }
        match command(handler) {
            Ok(value) => {
                if let Some(state) = after {
                    self.shared.set_operational(state);
                }
                Ok(value)
            },
            Err(e) => {
                let (code, message) = failure;
                let err = RobotError::from_driver(code, message, &e);
                self.shared.broadcast_error(&err);
                self.shared.set_operational(OperationalState::Idle);
                Err(err)
            },
        }
    }

    /// 上传程序
    ///
    /// 前置校验（非空、不超过容量、速度 0..=100）失败时不会触碰链路。
    pub fn upload_program(
        &self,
        program: &[Instruction],
        mut progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<(), RobotError> {
        let handler = self.handler()?;
        validate_program(program, handler.max_instructions())?;

        let events = &self.shared.events;
        let mut relay = |value: f32| {
            events.emit(&RobotEvent::Progress {
                operation: Operation::Upload,
                value,
            });
            if let Some(callback) = progress.as_mut() {
                callback(value);
            }
        };
        self.execute(
            handler.as_ref(),
            Some(OperationalState::Uploading),
            Some(OperationalState::Idle),
            (RobotErrorCode::UploadFailed, "Upload failed"),
            |h| h.upload_program(program, Some(&mut relay)),
        )
    }

    /// 下载设备上存储的程序
    pub fn download_program(
        &self,
        progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<Vec<Instruction>, RobotError> {
        self.download(Operation::Download, progress)
    }

    /// 下载录制结果
    pub fn download_recording(
        &self,
        progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<Vec<Instruction>, RobotError> {
        self.download(Operation::DownloadRecording, progress)
    }

    fn download(
        &self,
        operation: Operation,
        mut progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<Vec<Instruction>, RobotError> {
        let handler = self.handler()?;
        let events = &self.shared.events;
        let mut relay = |value: f32| {
            events.emit(&RobotEvent::Progress { operation, value });
            if let Some(callback) = progress.as_mut() {
                callback(value);
            }
        };
        self.execute(
            handler.as_ref(),
            Some(OperationalState::Downloading),
            Some(OperationalState::Idle),
            (RobotErrorCode::DownloadFailed, "Download failed"),
            |h| match operation {
                Operation::DownloadRecording => h.download_recording(Some(&mut relay)),
                _ => h.download_program(Some(&mut relay)),
            },
        )
    }

    /// 运行已存程序，等待结束
    pub fn run(&self) -> Result<(), RobotError> {
        let handler = self.handler()?;
        self.execute(
            handler.as_ref(),
            Some(OperationalState::Running),
            Some(OperationalState::Idle),
            (RobotErrorCode::CommandFailed, "Run failed"),
            |h| h.run(),
        )
    }

    /// 进入驾驶模式，保持到 `stop`
    pub fn go(&self) -> Result<(), RobotError> {
        let handler = self.handler()?;
        self.execute(
            handler.as_ref(),
            None,
            Some(OperationalState::Going),
            (RobotErrorCode::CommandFailed, "Go failed"),
            |h| h.go(),
        )
    }

    /// 停止（任何运行状态下都可调用）
    pub fn stop(&self) -> Result<(), RobotError> {
        let handler = self.handler()?;
        self.execute(
            handler.as_ref(),
            None,
            Some(OperationalState::Idle),
            (RobotErrorCode::CommandFailed, "Stop failed"),
            |h| h.stop(),
        )
    }

    /// 读取步进间隔（分秒）
    pub fn get_interval(&self) -> Result<u8, RobotError> {
        let handler = self.handler()?;
        self.execute(
            handler.as_ref(),
            None,
            None,
            (RobotErrorCode::CommandFailed, "Get interval failed"),
            |h| h.get_interval(),
        )
    }

    /// 设置步进间隔（分秒，0..=99）
    pub fn set_interval(&self, deciseconds: i32) -> Result<(), RobotError> {
        let handler = self.handler()?;
        let value = u32::try_from(deciseconds)
            .ok()
            .filter(|v| *v <= MAX_INTERVAL_DECISECONDS)
            .ok_or_else(|| {
                RobotError::invalid_argument("Interval out of range").with_details(format!(
                    "{} (expected 0..={})",
                    deciseconds, MAX_INTERVAL_DECISECONDS
                ))
            })?;
        self.execute(
            handler.as_ref(),
            None,
            None,
            (RobotErrorCode::CommandFailed, "Set interval failed"),
            |h| h.set_interval(value),
        )
    }

    /// 开始录制（秒，1..=9999），保持到 `stop_recording`
    pub fn start_recording(&self, seconds: i32) -> Result<(), RobotError> {
        let handler = self.handler()?;
        let value = u32::try_from(seconds)
            .ok()
            .filter(|v| (1..=MAX_RECORDING_SECONDS).contains(v))
            .ok_or_else(|| {
                RobotError::invalid_argument("Recording duration out of range").with_details(
                    format!("{} (expected 1..={})", seconds, MAX_RECORDING_SECONDS),
                )
            })?;
        self.execute(
            handler.as_ref(),
            None,
            Some(OperationalState::Recording),
            (RobotErrorCode::CommandFailed, "Start recording failed"),
            |h| h.start_recording(value),
        )
    }

    /// 停止录制（仅在录制中有效）
    pub fn stop_recording(&self) -> Result<(), RobotError> {
        let handler = self.handler()?;
        let current = self.operational_state();
        if current != OperationalState::Recording {
            return Err(RobotError::new(
                RobotErrorCode::InvalidState,
                "Robot is not recording",
            )
            .with_details(format!("operational state is {}", current)));
        }
        self.execute(
            handler.as_ref(),
            None,
            Some(OperationalState::Idle),
            (RobotErrorCode::CommandFailed, "Stop recording failed"),
            |h| h.stop(),
        )
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        if self.shared.session.read().is_some() {
            if let Err(e) = self.disconnect() {
                warn!("Disconnect on drop failed: {}", e);
            }
        }
    }
}

/// 程序前置校验
fn validate_program(program: &[Instruction], max_instructions: usize) -> Result<(), RobotError> {
    if program.is_empty() {
        return Err(RobotError::invalid_program("Program is empty"));
    }
    if program.len() > max_instructions {
        return Err(RobotError::invalid_program("Program is too large").with_details(format!(
            "{} instructions (max {})",
            program.len(),
            max_instructions
        )));
    }
    for (index, instruction) in program.iter().enumerate() {
        instruction.validate().map_err(|e| {
            RobotError::invalid_program(format!("Invalid instruction at index {}", index))
                .with_details(e.to_string())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edubot_hal::emulator::MotionMode;
    use edubot_hal::{Emulator, EmulatorConfig};
    use std::time::Duration;

    fn emulator(firmware: &[u32]) -> Arc<Emulator> {
        Arc::new(Emulator::new(
            EmulatorConfig::with_firmware_versions(firmware)
                .response_latency(Duration::from_millis(2))
                .discovery_step(Duration::from_millis(10)),
        ))
    }

    fn config() -> ProtocolConfig {
        ProtocolConfig::with_timeout(Duration::from_millis(500))
    }

    fn record_events(robot: &Robot) -> (Subscription, Arc<Mutex<Vec<RobotEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let sub = robot.on_event(move |e| sink.lock().push(e.clone()));
        (sub, events)
    }

    #[test]
    fn test_commands_fail_fast_when_disconnected() {
        let hw = emulator(&[3]);
        let robot = Robot::new(hw.clone(), config());
        let (_sub, events) = record_events(&robot);

        let checks: Vec<Result<(), RobotError>> = vec![
            robot.upload_program(&[Instruction::STOP], None),
            robot.download_program(None).map(|_| ()),
            robot.run(),
            robot.go(),
            robot.stop(),
            robot.get_interval().map(|_| ()),
            robot.set_interval(5),
            robot.start_recording(5),
            robot.stop_recording(),
            robot.download_recording(None).map(|_| ()),
        ];
        for result in checks {
            assert_eq!(result.unwrap_err().code, RobotErrorCode::NotConnected);
        }
        assert_eq!(hw.state(), HardwareState::Idle);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_connect_detects_firmware() {
        let hw = emulator(&[3, 6, 10]);
        let robot = Robot::new(hw.clone(), config());
        let (_sub, events) = record_events(&robot);

        robot.connect(&Emulator::device_id(2)).unwrap();
        assert!(robot.is_connected());
        assert_eq!(robot.firmware_version(), Some(10));
        assert_eq!(robot.protocol_version(), Some(ProtocolVersion::V10));
        assert_eq!(robot.max_instructions(), Some(2400));
        assert_eq!(robot.device_id().as_deref(), Some("emulator-2"));
        assert_eq!(
            *events.lock(),
            vec![
                RobotEvent::ConnectionState(ConnectionState::Connecting),
                RobotEvent::ConnectionState(ConnectionState::Connected),
            ]
        );

        let err = robot.connect(&Emulator::device_id(0)).unwrap_err();
        assert_eq!(err.code, RobotErrorCode::InvalidState);
    }

    #[test]
    fn test_connect_unknown_device_enters_error_state() {
        let hw = emulator(&[3]);
        let robot = Robot::new(hw, config());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let _sub = robot.on_error(move |e| sink.lock().push(e.code));

        let err = robot.connect("emulator-9").unwrap_err();
        assert_eq!(err.code, RobotErrorCode::ConnectionFailed);
        assert_eq!(robot.connection_state(), ConnectionState::Error);
        assert_eq!(*errors.lock(), vec![RobotErrorCode::ConnectionFailed]);
    }

    #[test]
    fn test_connect_unsupported_firmware() {
        let hw = emulator(&[5]);
        let robot = Robot::new(hw.clone(), config());
        let err = robot.connect(&Emulator::device_id(0)).unwrap_err();
        assert_eq!(err.code, RobotErrorCode::UnsupportedFirmware);
        assert_eq!(robot.connection_state(), ConnectionState::Error);
        // 检测失败后链路被释放
        assert_eq!(hw.connected_device(), None);
    }

    #[test]
    fn test_upload_validation_never_touches_the_wire() {
        let hw = emulator(&[3]);
        let robot = Robot::open(hw.clone(), &Emulator::device_id(0), config()).unwrap();

        let empty = robot.upload_program(&[], None).unwrap_err();
        assert_eq!(empty.code, RobotErrorCode::InvalidProgram);

        let too_large = robot
            .upload_program(&vec![Instruction::STOP; 101], None)
            .unwrap_err();
        assert_eq!(too_large.code, RobotErrorCode::InvalidProgram);

        let bad_speed = robot
            .upload_program(&[Instruction::STOP, Instruction::new(101, 0)], None)
            .unwrap_err();
        assert_eq!(bad_speed.code, RobotErrorCode::InvalidProgram);
        assert!(bad_speed.message.contains("index 1"));

        assert_eq!(robot.operational_state(), OperationalState::Idle);
        assert_eq!(hw.stored_program(&Emulator::device_id(0)), Some(Vec::new()));
    }

    #[test]
    fn test_upload_relays_progress_and_returns_to_idle() {
        let hw = emulator(&[6]);
        let robot = Robot::open(hw.clone(), &Emulator::device_id(0), config()).unwrap();
        let (_sub, events) = record_events(&robot);
        let mut seen = Vec::new();
        let mut on_progress = |v: f32| seen.push(v);

        let program = [Instruction::new(100, 100), Instruction::new(0, 0)];
        robot.upload_program(&program, Some(&mut on_progress)).unwrap();

        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(robot.operational_state(), OperationalState::Idle);
        assert_eq!(hw.stored_program(&Emulator::device_id(0)), Some(program.to_vec()));

        let events = events.lock();
        assert_eq!(
            events.first(),
            Some(&RobotEvent::OperationalState(OperationalState::Uploading))
        );
        assert_eq!(
            events.last(),
            Some(&RobotEvent::OperationalState(OperationalState::Idle))
        );
        assert!(events.iter().any(|e| matches!(
            e,
            RobotEvent::Progress {
                operation: Operation::Upload,
                ..
            }
        )));
    }

    #[test]
    fn test_go_persists_until_stop() {
        let hw = emulator(&[3]);
        let robot = Robot::open(hw.clone(), &Emulator::device_id(0), config()).unwrap();

        robot.go().unwrap();
        assert_eq!(robot.operational_state(), OperationalState::Going);
        assert_eq!(hw.motion_mode("emulator-0"), Some(MotionMode::Going));

        robot.stop().unwrap();
        assert_eq!(robot.operational_state(), OperationalState::Idle);
        assert_eq!(hw.motion_mode("emulator-0"), Some(MotionMode::Idle));
    }

    #[test]
    fn test_interval_validation_and_round_trip() {
        let hw = emulator(&[10]);
        let robot = Robot::open(hw, &Emulator::device_id(0), config()).unwrap();

        assert_eq!(
            robot.set_interval(-1).unwrap_err().code,
            RobotErrorCode::InvalidArgument
        );
        assert_eq!(
            robot.set_interval(100).unwrap_err().code,
            RobotErrorCode::InvalidArgument
        );
        assert_eq!(robot.get_interval().unwrap(), 10);
        robot.set_interval(25).unwrap();
        assert_eq!(robot.get_interval().unwrap(), 25);
    }

    #[test]
    fn test_recording_lifecycle() {
        let hw = emulator(&[3]);
        let robot = Robot::open(hw, &Emulator::device_id(0), config()).unwrap();

        for bad in [0, -3, 10_000] {
            assert_eq!(
                robot.start_recording(bad).unwrap_err().code,
                RobotErrorCode::InvalidArgument
            );
        }
        assert_eq!(
            robot.stop_recording().unwrap_err().code,
            RobotErrorCode::InvalidState
        );

        robot.start_recording(2).unwrap();
        assert_eq!(robot.operational_state(), OperationalState::Recording);
        robot.stop_recording().unwrap();
        assert_eq!(robot.operational_state(), OperationalState::Idle);
    }

    #[test]
    fn test_command_failure_is_broadcast_then_idle() {
        let hw = emulator(&[3]);
        let robot = Robot::open(
            hw.clone(),
            &Emulator::device_id(0),
            ProtocolConfig::with_timeout(Duration::from_millis(100)),
        )
        .unwrap();
        let (_sub, events) = record_events(&robot);

        // 设备把 `end` 之前的一切都当作上传数据：run 的应答永远不会到达
        hw.write(b"E").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let err = robot.run().unwrap_err();
        assert_eq!(err.code, RobotErrorCode::Timeout);
        let events = events.lock();
        assert_eq!(
            events.as_slice(),
            &[
                RobotEvent::OperationalState(OperationalState::Running),
                RobotEvent::Error(err.clone()),
                RobotEvent::OperationalState(OperationalState::Idle),
            ]
        );
    }

    #[test]
    fn test_hardware_disconnect_updates_state() {
        let hw = emulator(&[3]);
        let robot = Robot::open(hw.clone(), &Emulator::device_id(0), config()).unwrap();
        robot.go().unwrap();

        hw.simulate_link_loss();
        assert_eq!(robot.connection_state(), ConnectionState::Disconnected);
        assert_eq!(robot.operational_state(), OperationalState::Idle);
        assert_eq!(robot.run().unwrap_err().code, RobotErrorCode::NotConnected);
    }

    #[test]
    fn test_disconnect_is_idempotent_and_reconnect_works() {
        let hw = emulator(&[3, 6]);
        let robot = Robot::open(hw.clone(), &Emulator::device_id(0), config()).unwrap();
        robot.disconnect().unwrap();
        robot.disconnect().unwrap();
        assert_eq!(robot.connection_state(), ConnectionState::Disconnected);
        assert_eq!(hw.connected_device(), None);

        robot.connect(&Emulator::device_id(1)).unwrap();
        assert_eq!(robot.protocol_version(), Some(ProtocolVersion::V6));
    }
}
