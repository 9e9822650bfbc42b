//! 命令定义和实现

pub mod control;
pub mod program;
pub mod scan;

pub use control::{IntervalCommand, RecordCommand};
pub use program::{CompileCommand, DownloadCommand, UploadCommand};
pub use scan::ScanCommand;
