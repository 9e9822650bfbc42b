//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use edubot_sdk::prelude::*;
//! ```

// 客户端层
pub use crate::client::{
    ConnectionState, Operation, OperationalState, Robot, RobotError, RobotErrorCode, RobotEvent,
};

// 驱动层配置
pub use crate::driver::ProtocolConfig;

// 硬件层
pub use crate::hal::{
    DiscoveredDevice, Emulator, EmulatorConfig, HardwareLayer, HardwareState, Subscription,
};

// 协议层
pub use crate::protocol::{Instruction, ProtocolVersion};

// 程序工具
pub use crate::tools::{
    CompiledProgram, JsonProgramStore, MemoryProgramStore, ProgramLoader, ProgramSource,
    ProgramStore, SessionConfig, Statement, compile,
};
