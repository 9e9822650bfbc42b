//! # EduBot Tools - 程序工具
//!
//! **依赖原则**: 不依赖 `edubot-client` / `edubot-driver`，编译器是纯函数
//!
//! ## 包含模块
//!
//! - `program` - 程序源（语句、子程序引用）
//! - `compiler` - 递归展开、环检测、指令数上限
//! - `store` - 程序存储（内存 / JSON 目录）
//! - `config` - 会话配置文件（TOML）
//!
//! ## 使用示例
//!
//! ```
//! use edubot_tools::{MemoryProgramStore, ProgramSource, Statement, compile};
//!
//! let store = MemoryProgramStore::from_programs([ProgramSource::new(
//!     "turn",
//!     vec![Statement::movement(100, 0, 2)],
//! )]);
//! let main = ProgramSource::new(
//!     "main",
//!     vec![Statement::movement(50, 50, 1), Statement::subroutine("turn", 1)],
//! );
//! let instructions = compile(&main, &store).into_result().unwrap();
//! assert_eq!(instructions.len(), 3);
//! ```

pub mod compiler;
pub mod config;
pub mod program;
pub mod store;

// 重新导出常用类型
pub use compiler::{CompiledProgram, MAX_INSTRUCTIONS, ProgramError, compile};
pub use config::{Backend, ConfigError, RadioConfig, SessionConfig};
pub use program::{ProgramSource, Statement};
pub use store::{JsonProgramStore, MemoryProgramStore, ProgramLoader, ProgramStore, StoreError};
