//! EduBot SDK - 教育机器人 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 速度编解码、命令语法、固件版本表
//! - **硬件层** (`hal`): 发现/连接/写入/通知，模拟器与真实无线链路
//! - **驱动层** (`driver`): V3 文本方言与 V6/V10 二进制方言的协议处理器
//! - **客户端层** (`client`): 带状态机与参数校验的 [`Robot`]
//! - **工具** (`tools`): 程序编译器、程序存储、会话配置
//!
//! # 快速开始
//!
//! ```no_run
//! use edubot_sdk::prelude::*;
//! use std::sync::Arc;
//!
//! edubot_sdk::init_logger();
//!
//! let hardware = Arc::new(Emulator::new(EmulatorConfig::with_firmware_versions(&[6])));
//! let robot = Robot::open(hardware, &Emulator::device_id(0), ProtocolConfig::default())?;
//! robot.upload_program(&[Instruction::new(100, 100), Instruction::STOP], None)?;
//! robot.run()?;
//! # Ok::<(), RobotError>(())
//! ```

mod logging;

pub mod prelude;

pub use edubot_client as client;
pub use edubot_driver as driver;
pub use edubot_hal as hal;
pub use edubot_protocol as protocol;
pub use edubot_tools as tools;

pub use logging::{init_logger, init_logger_with_filter};

// 客户端层（推荐入口）
pub use client::{
    ConnectionState, Operation, OperationalState, Robot, RobotError, RobotErrorCode, RobotEvent,
};

// 各层错误
pub use driver::DriverError;
pub use hal::HardwareError;
pub use protocol::ProtocolError;
