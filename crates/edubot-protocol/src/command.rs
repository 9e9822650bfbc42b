//! 命令语法
//!
//! 主机 → 设备的 ASCII 命令，以及设备 → 主机的应答标记。
//! 同一份语法同时被协议处理器（编码）和模拟器（解析）使用。
//!
//! | 命令 | 负载 | 应答 |
//! |---|---|---|
//! | `F` | 清空已存程序 | 无 |
//! | `d####` | 长度头（`2n-1`） | 无 |
//! | `E` | 进入上传模式 | 无 |
//! | `end` | V3 上传结束 | `FULL` |
//! | `B` | 开始下载 | 指令流 + 结束标记 |
//! | `R` | 运行 | `_END` |
//! | `G` | 驾驶模式 | `_GO_` |
//! | `S` | 停止 | `_SR_` |
//! | `z` | 读取间隔 | `I=NN` |
//! | `iNN` | 设置间隔（分秒） | 无 |
//! | `rNNNN` | 开始录制（秒） | 无 |
//! | `Z` | 查询版本 | `VER <n>` |

use crate::ProtocolError;

/// 间隔线上字段上限（2 位十进制）
pub const MAX_INTERVAL_DECISECONDS: u32 = 99;

/// 录制时长线上字段上限（4 位十进制）
pub const MAX_RECORDING_SECONDS: u32 = 9999;

/// 应答标记（设备 → 主机）
pub mod reply {
    /// 上传完成
    pub const FULL: &str = "FULL";
    /// 运行结束
    pub const RUN_END: &str = "_END";
    /// 进入驾驶模式
    pub const GO: &str = "_GO_";
    /// 已停止
    pub const STOPPED: &str = "_SR_";
    /// V3 下载结束标记
    pub const DOWNLOAD_END: &str = ",,,,";
    /// 版本应答前缀
    pub const VERSION_PREFIX: &str = "VER";
    /// 间隔应答前缀
    pub const INTERVAL_PREFIX: &str = "I=";
}

/// 主机 → 设备的控制命令
///
/// 上传负载（V3 文本行 / 二进制块）不属于命令，由 `codec` 编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `F`：清空已存程序
    Flush,
    /// `d####`：上传长度头，参数为指令条数
    DataLength(usize),
    /// `E`：进入上传模式
    EnterUpload,
    /// `end`：V3 上传结束
    EndUpload,
    /// `B`：开始下载
    BeginDownload,
    /// `R`：运行
    Run,
    /// `G`：驾驶模式
    Go,
    /// `S`：停止
    Stop,
    /// `z`：读取间隔
    GetInterval,
    /// `iNN`：设置间隔（分秒）
    SetInterval(u8),
    /// `rNNNN`：开始录制（秒）
    StartRecording(u16),
    /// `Z`：查询固件版本
    QueryVersion,
}

impl Command {
    /// 构造设置间隔命令，超出 2 位十进制时报错
    pub fn set_interval(deciseconds: u32) -> Result<Self, ProtocolError> {
        if deciseconds > MAX_INTERVAL_DECISECONDS {
            return Err(ProtocolError::ValueOutOfRange {
                field: "interval",
                value: deciseconds,
                max: MAX_INTERVAL_DECISECONDS,
            });
        }
        Ok(Command::SetInterval(deciseconds as u8))
    }

    /// 构造录制命令，超出 4 位十进制时报错
    pub fn start_recording(seconds: u32) -> Result<Self, ProtocolError> {
        if seconds > MAX_RECORDING_SECONDS {
            return Err(ProtocolError::ValueOutOfRange {
                field: "recording_seconds",
                value: seconds,
                max: MAX_RECORDING_SECONDS,
            });
        }
        Ok(Command::StartRecording(seconds as u16))
    }

    /// 编码为线上文本
    pub fn encode(&self) -> String {
        match self {
            Command::Flush => "F".to_string(),
            Command::DataLength(count) => crate::codec::calculate_data_length(*count),
            Command::EnterUpload => "E".to_string(),
            Command::EndUpload => "end".to_string(),
            Command::BeginDownload => "B".to_string(),
            Command::Run => "R".to_string(),
            Command::Go => "G".to_string(),
            Command::Stop => "S".to_string(),
            Command::GetInterval => "z".to_string(),
            Command::SetInterval(value) => format!("i{:02}", value),
            Command::StartRecording(seconds) => format!("r{:04}", seconds),
            Command::QueryVersion => "Z".to_string(),
        }
    }

    /// 命令的单字符助记符（日志用）
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Command::Flush => "F",
            Command::DataLength(_) => "d",
            Command::EnterUpload => "E",
            Command::EndUpload => "end",
            Command::BeginDownload => "B",
            Command::Run => "R",
            Command::Go => "G",
            Command::Stop => "S",
            Command::GetInterval => "z",
            Command::SetInterval(_) => "i",
            Command::StartRecording(_) => "r",
            Command::QueryVersion => "Z",
        }
    }

    /// 解析设备收到的文本命令（模拟器使用）
    ///
    /// `DataLength` 解析后携带的是**字节数**（`header + 1`），不是指令条数。
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        match text {
            "F" => return Some(Command::Flush),
            "E" => return Some(Command::EnterUpload),
            "end" => return Some(Command::EndUpload),
            "B" => return Some(Command::BeginDownload),
            "R" => return Some(Command::Run),
            "G" => return Some(Command::Go),
            "S" => return Some(Command::Stop),
            "z" => return Some(Command::GetInterval),
            "Z" => return Some(Command::QueryVersion),
            _ => {},
        }

        if text.starts_with('d') {
            return crate::codec::expected_upload_bytes(text).map(Command::DataLength);
        }
        if let Some(digits) = text.strip_prefix('i') {
            if digits.len() == 2 {
                return digits.parse().ok().map(Command::SetInterval);
            }
            return None;
        }
        if let Some(digits) = text.strip_prefix('r') {
            if digits.len() == 4 {
                return digits.parse().ok().map(Command::StartRecording);
            }
            return None;
        }
        None
    }
}

/// 解析 `VER <n>` 应答（容忍前后空白）
pub fn parse_version_reply(text: &str) -> Result<u32, ProtocolError> {
    let invalid = || ProtocolError::InvalidVersionReply(text.to_string());
    let rest = text
        .trim()
        .strip_prefix(reply::VERSION_PREFIX)
        .ok_or_else(invalid)?;
    rest.trim().parse().map_err(|_| invalid())
}

/// 格式化版本应答（模拟器使用）
pub fn format_version_reply(firmware_version: u32) -> String {
    format!("{} {}", reply::VERSION_PREFIX, firmware_version)
}

/// 解析 `I=NN` 应答
pub fn parse_interval_reply(text: &str) -> Result<u8, ProtocolError> {
    let invalid = || ProtocolError::InvalidIntervalReply(text.to_string());
    let start = text.find(reply::INTERVAL_PREFIX).ok_or_else(invalid)?;
    let digits: String = text[start + reply::INTERVAL_PREFIX.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().map_err(|_| invalid())
}

/// 格式化间隔应答（模拟器使用）
pub fn format_interval_reply(deciseconds: u8) -> String {
    format!("{}{:02}", reply::INTERVAL_PREFIX, deciseconds)
}
