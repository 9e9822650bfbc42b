//! V6 / V10 二进制方言（固件 ≥ 6，最多 2400 条指令）
//!
//! 两个版本的线上行为完全一致，只在版本标签上区分；因此这里是一个
//! 以 [`ProtocolVersion`] 参数化的处理器。
//!
//! 上传：同样的前导之后，整个程序一次二进制写入（每条指令 2 字节），等待 `FULL`。
//! 下载：写 `B`；第一个应答包是 4 字节大端总字节数，之后每个包是
//! `[序号, 数据...]`，累积到总数为止。每个应答块被视为一个完整单元。

use crate::config::ProtocolConfig;
use crate::error::DriverError;
use crate::exchange::Exchange;
use crate::handler::{Controls, Progress, ProgressFn, ProtocolHandler, check_capacity};
use edubot_hal::HardwareLayer;
use edubot_protocol::{Command, Instruction, ProtocolVersion, codec, reply};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// 二进制协议处理器
pub struct BinaryProtocol {
    version: ProtocolVersion,
    exchange: Exchange,
}

impl BinaryProtocol {
    /// 创建处理器
    ///
    /// `version` 必须是二进制方言（V6 或 V10），否则返回 `None`。
    pub fn new(
        version: ProtocolVersion,
        hardware: Arc<dyn HardwareLayer>,
        config: &ProtocolConfig,
    ) -> Option<Self> {
        version.is_binary().then(|| Self {
            version,
            exchange: Exchange::new(hardware, config),
        })
    }

    fn controls(&self) -> Controls<'_> {
        Controls {
            exchange: &self.exchange,
        }
    }
}

impl ProtocolHandler for BinaryProtocol {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn upload_program(
        &self,
        program: &[Instruction],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<(), DriverError> {
        check_capacity(program, self.version)?;
        let mut progress = Progress::new(progress);
        let mut pending = self.exchange.arm("upload")?;

        self.controls().upload_preamble(program.len())?;
        progress.report(0.0);
        self.exchange.write(&codec::encode_binary_program(program))?;
        pending.wait_for(|buffer| buffer.contains(reply::FULL).then_some(()))?;

        progress.done();
        info!("Uploaded {} instructions ({})", program.len(), self.version);
        Ok(())
    }

    fn download_program(
        &self,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<Instruction>, DriverError> {
        let mut progress = Progress::new(progress);
        let mut pending = self.exchange.arm(Command::BeginDownload.mnemonic())?;
        self.exchange.send(&Command::BeginDownload)?;

        let header = pending.next_chunk()?;
        let total = codec::parse_download_header(&header)? as usize;
        debug!("Binary download announced {} bytes", total);
        // 设备不可能存下超过容量的程序，先校验再分配
        let max_bytes = self.version.max_instructions() * 2;
        if total > max_bytes || total % 2 != 0 {
            return Err(DriverError::UnexpectedResponse(format!(
                "download header announces {} bytes (max {}, must be even)",
                total, max_bytes
            )));
        }

        let mut data = Vec::with_capacity(total);
        while data.len() < total {
            let packet = pending.next_chunk()?;
            let Some((seq, payload)) = packet.split_first() else {
                continue;
            };
            trace!("Download packet #{} ({} bytes)", seq, payload.len());
            data.extend_from_slice(payload);
            progress.report(data.len() as f32 / total as f32);
        }
        data.truncate(total);

        progress.done();
        let program = codec::decode_binary_program(&data);
        debug!("Downloaded {} instructions ({})", program.len(), self.version);
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
