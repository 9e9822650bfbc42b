//! V3 文本方言（固件 2–4，最多 100 条指令）
//!
//! 上传：每条指令一次写入 `"LLL,RRRxx"`，最后写 `end`，等待 `FULL`。
//! 下载：写 `B`，之后每个含逗号的应答是一条指令，`,,,,` 为结束标记。
//! 下载总数在结束标记之前未知，进度按 0 上报，结束时上报 1。

use crate::config::ProtocolConfig;
use crate::error::DriverError;
use crate::exchange::Exchange;
use crate::handler::{Controls, Progress, ProgressFn, ProtocolHandler, check_capacity};
use edubot_hal::HardwareLayer;
use edubot_protocol::{Command, Instruction, ProtocolVersion, codec, reply};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// V3 协议处理器
pub struct TextProtocol {
    exchange: Exchange,
}

impl TextProtocol {
    pub fn new(hardware: Arc<dyn HardwareLayer>, config: &ProtocolConfig) -> Self {
        Self {
            exchange: Exchange::new(hardware, config),
        }
    }

    fn controls(&self) -> Controls<'_> {
        Controls {
            exchange: &self.exchange,
        }
    }
}

impl ProtocolHandler for TextProtocol {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V3
    }

    fn upload_program(
        &self,
        program: &[Instruction],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<(), DriverError> {
        check_capacity(program, ProtocolVersion::V3)?;
        let mut progress = Progress::new(progress);
        let mut pending = self.exchange.arm(Command::EndUpload.mnemonic())?;

        self.controls().upload_preamble(program.len())?;
        let total = program.len().max(1) as f32;
        for (index, instruction) in program.iter().enumerate() {
            self.exchange
                .write(codec::encode_text_instruction(instruction).as_bytes())?;
            progress.report(index as f32 / total);
        }
        self.exchange.send(&Command::EndUpload)?;
        pending.wait_for(|buffer| buffer.contains(reply::FULL).then_some(()))?;

        progress.done();
        info!("Uploaded {} instructions (V3)", program.len());
        Ok(())
    }

    fn download_program(
        &self,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<Instruction>, DriverError> {
        let mut progress = Progress::new(progress);
        let mut pending = self.exchange.arm(Command::BeginDownload.mnemonic())?;
        self.exchange.send(&Command::BeginDownload)?;

        let mut program = Vec::new();
        // 行可能被拆到多次通知里：按换行切分，保留未结束的尾部
        let mut partial = String::new();
        loop {
            let chunk = pending.next_chunk()?;
            partial.push_str(&String::from_utf8_lossy(&chunk));
            let mut finished = false;
            for line in take_lines(&mut partial) {
                if line == reply::DOWNLOAD_END {
                    finished = true;
                    break;
                }
                if line.contains(',') {
                    program.push(codec::parse_text_instruction(&line)?);
                    progress.report(0.0);
                } else {
                    warn!("Ignoring unexpected download line {:?}", line);
                }
            }
            if finished {
                break;
            }
        }

        progress.done();
        debug!("Downloaded {} instructions (V3)", program.len());
        Ok(program)
    }

    fn run(&self) -> Result<(), DriverError> {
        self.controls().run()
    }

    fn go(&self) -> Result<(), DriverError> {
        self.controls().go()
    }

    fn stop(&self) -> Result<(), DriverError> {
        self.controls().stop()
    }

    fn get_interval(&self) -> Result<u8, DriverError> {
        self.controls().get_interval()
    }

    fn set_interval(&self, deciseconds: u32) -> Result<(), DriverError> {
        self.controls().set_interval(deciseconds)
    }

    fn start_recording(&self, seconds: u32) -> Result<(), DriverError> {
        self.controls().start_recording(seconds)
    }
}

/// 取出缓冲中的完整行
///
/// 设备每条通知就是一行、不带换行符，所以没有换行时整块即为一行；
/// 有换行时最后一段视为未结束，留在缓冲里。
fn take_lines(buffer: &mut String) -> Vec<String> {
    if !buffer.contains(['\n', '\r']) {
        let line = std::mem::take(buffer);
        let line = line.trim();
        return if line.is_empty() {
            Vec::new()
        } else {
            vec![line.to_string()]
        };
    }

    let tail_start = buffer.rfind(['\n', '\r']).map_or(0, |i| i + 1);
    let tail = buffer.split_off(tail_start);
    let lines = buffer
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    *buffer = tail;
    lines
}
