//! 单台模拟机器人
//!
//! 严格按自身协议方言的命令语法响应：上传模式、二进制分段累积、
//! V3 的 `end` / `,,,,` 文本标记。状态只被本对象的 `handle_command` 修改。

use bytes::Bytes;
use edubot_protocol::{
    Command, Instruction, ProtocolVersion, codec, format_interval_reply, format_version_reply,
    reply,
};
use tracing::{debug, warn};

use super::SimulatedRobotConfig;

/// 默认步进间隔（分秒）
const DEFAULT_INTERVAL: u8 = 10;

/// 模拟机器人发出的一条应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Binary(Bytes),
}

impl Reply {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Reply::Text(text) => text.into_bytes(),
            Reply::Binary(bytes) => bytes.to_vec(),
        }
    }
}

/// 运动模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    Idle,
    Going,
    Recording,
}

/// 上传模式状态
#[derive(Debug, Default)]
struct UploadState {
    /// 期望字节数（来自长度头，`2n-1+1`）
    expected: Option<usize>,
    /// 二进制方言：已累积的原始字节
    buffer: Vec<u8>,
    /// 文本方言：已解析的线上字节对
    pairs: Vec<(u8, u8)>,
}

/// 模拟机器人
#[derive(Debug)]
pub struct SimulatedRobot {
    firmware_version: u32,
    protocol: Option<ProtocolVersion>,
    recording_sample: Vec<Instruction>,
    /// 已存程序（线上字节对）
    program: Vec<(u8, u8)>,
    interval: u8,
    pending_length: Option<usize>,
    upload: Option<UploadState>,
    mode: MotionMode,
}

impl SimulatedRobot {
    pub fn new(config: &SimulatedRobotConfig) -> Self {
        let protocol = edubot_protocol::protocol_for_firmware(config.firmware_version).ok();
        if protocol.is_none() {
            warn!(
                "Simulated robot {:?} has unsupported firmware {}; it will only answer version queries",
                config.name, config.firmware_version
            );
        }
        Self {
            firmware_version: config.firmware_version,
            protocol,
            recording_sample: config.recording_sample.clone(),
            program: Vec::new(),
            interval: DEFAULT_INTERVAL,
            pending_length: None,
            upload: None,
            mode: MotionMode::Idle,
        }
    }

    pub fn firmware_version(&self) -> u32 {
        self.firmware_version
    }

    /// 已存程序（解码回应用域）
    pub fn stored_program(&self) -> Vec<Instruction> {
        self.program
            .iter()
            .map(|&(l, r)| Instruction::from_wire(l, r))
            .collect()
    }

    pub fn interval(&self) -> u8 {
        self.interval
    }

    pub fn mode(&self) -> MotionMode {
        self.mode
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    /// 处理一帧入站数据，返回按顺序发出的应答
    pub fn handle_command(&mut self, data: &[u8]) -> Vec<Reply> {
        if self.upload.is_some() {
            return self.handle_upload_data(data);
        }

        let Ok(text) = std::str::from_utf8(data) else {
            warn!("Ignoring non-text frame outside upload mode ({} bytes)", data.len());
            return Vec::new();
        };
        let Some(command) = Command::parse(text) else {
            warn!("Ignoring unknown command {:?}", text);
            return Vec::new();
        };
        debug!("Simulated robot (fw {}) <- {:?}", self.firmware_version, command);

        match command {
            Command::QueryVersion => vec![Reply::Text(format_version_reply(self.firmware_version))],
            _ if self.protocol.is_none() => Vec::new(),
            Command::Flush => {
                self.program.clear();
                Vec::new()
            },
            Command::DataLength(bytes) => {
                self.pending_length = Some(bytes);
                Vec::new()
            },
            Command::EnterUpload => {
                self.upload = Some(UploadState {
                    expected: self.pending_length.take(),
                    ..UploadState::default()
                });
                Vec::new()
            },
            Command::EndUpload => Vec::new(),
            Command::BeginDownload => self.download_replies(),
            Command::Run => vec![Reply::Text(reply::RUN_END.to_string())],
            Command::Go => {
                self.mode = MotionMode::Going;
                vec![Reply::Text(reply::GO.to_string())]
            },
            Command::Stop => {
                self.mode = MotionMode::Idle;
                vec![Reply::Text(reply::STOPPED.to_string())]
            },
            Command::GetInterval => vec![Reply::Text(format_interval_reply(self.interval))],
            Command::SetInterval(value) => {
                self.interval = value;
                Vec::new()
            },
            Command::StartRecording(seconds) => {
                self.start_recording(seconds);
                Vec::new()
            },
        }
    }

    fn handle_upload_data(&mut self, data: &[u8]) -> Vec<Reply> {
        let binary = self.protocol.is_some_and(ProtocolVersion::is_binary);
        let Some(upload) = self.upload.as_mut() else {
            return Vec::new();
        };

        if binary {
            upload.buffer.extend_from_slice(data);
            let expected = upload.expected.unwrap_or(upload.buffer.len());
            if upload.buffer.len() < expected {
                debug!(
                    "Binary upload accumulated {}/{} bytes",
                    upload.buffer.len(),
                    expected
                );
                return Vec::new();
            }
            self.program = upload.buffer[..expected]
                .chunks_exact(2)
                .map(|pair| (pair[0], pair[1]))
                .collect();
            self.upload = None;
            return vec![Reply::Text(reply::FULL.to_string())];
        }

        let text = String::from_utf8_lossy(data);
        if text.trim() == "end" {
            self.program = std::mem::take(&mut upload.pairs);
            self.upload = None;
            return vec![Reply::Text(reply::FULL.to_string())];
        }
        match codec::parse_text_upload_line(&text) {
            Some(pair) => upload.pairs.push(pair),
            None => warn!("Ignoring malformed upload line {:?}", text),
        }
        Vec::new()
    }

    fn download_replies(&self) -> Vec<Reply> {
        if self.protocol.is_some_and(ProtocolVersion::is_binary) {
            let wire: Vec<u8> = self.program.iter().flat_map(|&(l, r)| [l, r]).collect();
            let mut replies = Vec::with_capacity(wire.len() / codec::BINARY_PACKET_PAYLOAD + 2);
            replies.push(Reply::Binary(Bytes::copy_from_slice(
                &codec::encode_download_header(wire.len() as u32),
            )));
            replies.extend(codec::split_download_packets(&wire).into_iter().map(Reply::Binary));
            replies
        } else {
            let mut replies: Vec<Reply> = self
                .program
                .iter()
                .map(|&(l, r)| Reply::Text(codec::encode_text_download_line(l, r)))
                .collect();
            replies.push(Reply::Text(reply::DOWNLOAD_END.to_string()));
            replies
        }
    }

    /// 录制：以配置的样本替换已存程序，长度按 `秒 * 10 / 间隔` 截断
    fn start_recording(&mut self, seconds: u16) {
        self.mode = MotionMode::Recording;
        let interval = usize::from(self.interval.max(1));
        let mut steps = usize::from(seconds) * 10 / interval;
        if let Some(protocol) = self.protocol {
            steps = steps.min(protocol.max_instructions());
        }
        self.program = self
            .recording_sample
            .iter()
            .take(steps)
            .map(|instruction| instruction.to_wire())
            .collect();
        debug!("Recorded {} steps", self.program.len());
    }
}
