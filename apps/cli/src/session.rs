//! One-shot 会话
//!
//! 每个命令独立执行：
//! 1. 读取配置（文件 + 命令行覆盖）
//! 2. 创建硬件实例（模拟器或无线链路）
//! 3. 连接机器人、执行操作
//! 4. 断开连接（`Robot` drop 时）

use anyhow::{Context, Result, bail};
use crossbeam_channel::Receiver;
use edubot_sdk::hal::EmulatorConfig;
use edubot_sdk::prelude::*;
use edubot_sdk::tools::Backend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 无线链路未指定设备时，自动扫描的时限
const AUTO_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// 全局参数
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// 配置文件（默认 ~/.config/edubot/config.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 使用模拟器，并按给定固件版本创建模拟机器人（逗号分隔）
    #[arg(long, global = true, value_delimiter = ',')]
    pub emulator_firmware: Vec<u32>,

    /// 设备 id（默认：模拟器的第一台 / 扫描到的第一台）
    #[arg(long, global = true)]
    pub device: Option<String>,
}

/// 一次命令的执行环境
pub struct Session {
    config: SessionConfig,
    hardware: Arc<dyn HardwareLayer>,
    device: Option<String>,
}

impl Session {
    pub fn open(args: &GlobalArgs) -> Result<Self> {
        let mut config =
            SessionConfig::load(args.config.as_deref()).context("failed to load configuration")?;

        if !args.emulator_firmware.is_empty() {
            config.backend = Backend::Emulator;
            config.emulator.robots =
                EmulatorConfig::with_firmware_versions(&args.emulator_firmware).robots;
        }

        let hardware = create_hardware(&config)?;
        Ok(Self {
            config,
            hardware,
            device: args.device.clone(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn hardware(&self) -> &Arc<dyn HardwareLayer> {
        &self.hardware
    }

    pub fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig::with_timeout(self.config.response_timeout())
    }

    /// 连接机器人
    pub fn connect(&self) -> Result<Robot> {
        let device = self.resolve_device()?;
        println!("⏳ 连接到 {}...", device);
        let robot = Robot::open(self.hardware.clone(), &device, self.protocol_config())
            .with_context(|| format!("failed to connect to {}", device))?;
        println!(
            "✅ 已连接（固件 {}，{}，最多 {} 条指令）",
            robot.firmware_version().unwrap_or_default(),
            robot.protocol_version().map(|v| v.to_string()).unwrap_or_default(),
            robot.max_instructions().unwrap_or_default()
        );
        Ok(robot)
    }

    fn resolve_device(&self) -> Result<String> {
        if let Some(device) = &self.device {
            return Ok(device.clone());
        }
        match self.config.backend {
            Backend::Emulator => Ok(Emulator::device_id(0)),
            Backend::Radio => {
                info!("No device given, scanning for {:?}", AUTO_SCAN_TIMEOUT);
                let found = self.discover()?;
                let first = found.recv_timeout(AUTO_SCAN_TIMEOUT);
                self.hardware.stop_discovery();
                match first {
                    Ok(device) => Ok(device.id),
                    Err(_) => bail!("no robot found within {:?}", AUTO_SCAN_TIMEOUT),
                }
            },
        }
    }

    /// 开始扫描，返回发现设备的通道
    pub fn discover(&self) -> Result<Receiver<DiscoveredDevice>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.hardware
            .start_discovery(Box::new(move |device| {
                let _ = tx.send(device);
            }))
            .context("failed to start discovery")?;
        Ok(rx)
    }
}

fn create_hardware(config: &SessionConfig) -> Result<Arc<dyn HardwareLayer>> {
    match config.backend {
        Backend::Emulator => {
            debug!("Using emulator with {} robots", config.emulator.robots.len());
            Ok(Arc::new(Emulator::new(config.emulator.clone())))
        },
        Backend::Radio => create_radio(config),
    }
}

#[cfg(feature = "ble")]
fn create_radio(config: &SessionConfig) -> Result<Arc<dyn HardwareLayer>> {
    use edubot_sdk::hal::{BtleplugBackend, GattTransport};

    let gatt = config.gatt_config();
    let backend = BtleplugBackend::new(&gatt).context("failed to open Bluetooth adapter")?;
    Ok(Arc::new(GattTransport::new(backend, gatt)))
}

#[cfg(not(feature = "ble"))]
fn create_radio(_config: &SessionConfig) -> Result<Arc<dyn HardwareLayer>> {
    bail!("radio backend requires building edubot-cli with the `ble` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(firmware: &[u32]) -> GlobalArgs {
        GlobalArgs {
            // 不存在的路径：使用默认配置
            config: Some(PathBuf::from("/nonexistent/edubot/config.toml")),
            emulator_firmware: firmware.to_vec(),
            device: None,
        }
    }

    #[test]
    fn test_emulator_firmware_override() {
        let session = Session::open(&args(&[6, 10])).unwrap();
        assert_eq!(session.config().backend, Backend::Emulator);
        let versions: Vec<u32> =
            session.config().emulator.robots.iter().map(|r| r.firmware_version).collect();
        assert_eq!(versions, vec![6, 10]);
    }

    #[test]
    fn test_default_device_is_first_emulated_robot() {
        let session = Session::open(&args(&[3])).unwrap();
        assert_eq!(session.resolve_device().unwrap(), "emulator-0");
    }

    #[test]
    fn test_explicit_device_wins() {
        let mut global = args(&[3, 6]);
        global.device = Some(Emulator::device_id(1));
        let session = Session::open(&global).unwrap();
        assert_eq!(session.resolve_device().unwrap(), "emulator-1");
    }
}
