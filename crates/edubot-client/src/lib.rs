//! # EduBot Client
//!
//! 面向应用的机器人命令外观：[`Robot`] 组合一个硬件实例与一个协议处理器，
//! 维护连接状态与运行状态，在触碰链路之前完成所有参数校验，并把进度和
//! 错误以 [`RobotEvent`] 广播给订阅者。
//!
//! ```no_run
//! use edubot_client::Robot;
//! use edubot_driver::ProtocolConfig;
//! use edubot_hal::{Emulator, EmulatorConfig};
//! use edubot_protocol::Instruction;
//! use std::sync::Arc;
//!
//! let hardware = Arc::new(Emulator::new(EmulatorConfig::default()));
//! let robot = Robot::open(hardware, &Emulator::device_id(0), ProtocolConfig::default())?;
//! robot.upload_program(&[Instruction::new(100, 100), Instruction::STOP], None)?;
//! robot.run()?;
//! # Ok::<(), edubot_client::RobotError>(())
//! ```

mod error;
mod robot;
mod state;

pub use error::{RobotError, RobotErrorCode};
pub use robot::Robot;
pub use state::{ConnectionState, Operation, OperationalState, RobotEvent};
