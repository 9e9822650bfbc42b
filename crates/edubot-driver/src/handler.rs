//! 协议处理器公共契约
//!
//! 所有命令都是单次飞行的请求/应答：写命令帧，然后阻塞等待匹配的应答
//! 或超时。控制命令（`R`/`G`/`S`/`z`/`i`/`r`）在所有方言中完全相同，
//! 由本模块的 [`Controls`] 统一实现。

use crate::error::DriverError;
use crate::exchange::Exchange;
use edubot_protocol::{Command, Instruction, ProtocolVersion, parse_interval_reply, reply};
use tracing::{debug, info};

/// 进度回调（0..=1，单次操作内单调不减）
pub type ProgressFn<'a> = &'a mut dyn FnMut(f32);

/// 协议处理器
///
/// 方法取 `&self`：处理器内部只有一个挂起槽位，重叠调用会得到
/// [`DriverError::RequestInFlight`]，而不是被静默串行化。
pub trait ProtocolHandler: Send + Sync {
    /// 协议方言
    fn version(&self) -> ProtocolVersion;

    /// 单个程序的最大指令数
    fn max_instructions(&self) -> usize {
        self.version().max_instructions()
    }

    /// 上传程序；超出容量时在写入任何字节之前失败
    fn upload_program(
        &self,
        program: &[Instruction],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<(), DriverError>;

    /// 下载设备上存储的程序
    fn download_program(
        &self,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<Instruction>, DriverError>;

    /// `R`，等待 `_END`
    fn run(&self) -> Result<(), DriverError>;

    /// `G`，等待 `_GO_`（设备保持驾驶模式）
    fn go(&self) -> Result<(), DriverError>;

    /// `S`，等待 `_SR_`
    fn stop(&self) -> Result<(), DriverError>;

    /// `z`，解析 `I=NN`（分秒）
    fn get_interval(&self) -> Result<u8, DriverError>;

    /// `iNN`，不等待确认
    fn set_interval(&self, deciseconds: u32) -> Result<(), DriverError>;

    /// `rNNNN`，不等待确认
    fn start_recording(&self, seconds: u32) -> Result<(), DriverError>;

    /// 下载录制结果（与下载程序的线上行为相同）
    fn download_recording(
        &self,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<Instruction>, DriverError> {
        self.download_program(progress)
    }
}

/// 进度上报器
pub(crate) struct Progress<'a> {
    callback: Option<ProgressFn<'a>>,
    last: f32,
}

impl<'a> Progress<'a> {
    pub fn new(callback: Option<ProgressFn<'a>>) -> Self {
        Self {
            callback,
            last: 0.0,
        }
    }

    /// 上报进度；值被钳制在 `[上一次, 1]` 内
    pub fn report(&mut self, value: f32) {
        let value = value.clamp(self.last, 1.0);
        self.last = value;
        if let Some(callback) = self.callback.as_mut() {
            callback(value);
        }
    }

    pub fn done(&mut self) {
        self.report(1.0);
    }
}

/// 容量检查（在任何写入之前）
pub(crate) fn check_capacity(
    program: &[Instruction],
    version: ProtocolVersion,
) -> Result<(), DriverError> {
    let max = version.max_instructions();
    if program.len() > max {
        return Err(DriverError::ProgramTooLarge {
            len: program.len(),
            max,
        });
    }
    Ok(())
}

/// 所有方言共用的控制命令
pub(crate) struct Controls<'a> {
    pub exchange: &'a Exchange,
}

impl Controls<'_> {
    /// 上传前导：`F` → `d####` → `E`
    pub fn upload_preamble(&self, instruction_count: usize) -> Result<(), DriverError> {
        self.exchange.send(&Command::Flush)?;
        self.exchange.send(&Command::DataLength(instruction_count))?;
        self.exchange.send(&Command::EnterUpload)
    }

    pub fn run(&self) -> Result<(), DriverError> {
        self.exchange.request(&Command::Run, reply::RUN_END)?;
        info!("Program run finished");
        Ok(())
    }

    pub fn go(&self) -> Result<(), DriverError> {
        self.exchange.request(&Command::Go, reply::GO)?;
        info!("Robot entered drive mode");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), DriverError> {
        self.exchange.request(&Command::Stop, reply::STOPPED)?;
        info!("Robot stopped");
        Ok(())
    }

    pub fn get_interval(&self) -> Result<u8, DriverError> {
        let mut pending = self.exchange.arm(Command::GetInterval.mnemonic())?;
        self.exchange.send(&Command::GetInterval)?;
        let text = pending.wait_for(|buffer| {
            let start = buffer.find(reply::INTERVAL_PREFIX)?;
            let digits = buffer[start + reply::INTERVAL_PREFIX.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .count();
            (digits >= 2).then(|| buffer[start..].to_string())
        })?;
        let interval = parse_interval_reply(&text)?;
        debug!("Interval is {} ds", interval);
        Ok(interval)
    }

    pub fn set_interval(&self, deciseconds: u32) -> Result<(), DriverError> {
        let command = Command::set_interval(deciseconds)?;
        let _pending = self.exchange.arm(command.mnemonic())?;
        self.exchange.send(&command)
    }

    pub fn start_recording(&self, seconds: u32) -> Result<(), DriverError> {
        let command = Command::start_recording(seconds)?;
        let _pending = self.exchange.arm(command.mnemonic())?;
        self.exchange.send(&command)?;
        info!("Recording for {} s", seconds);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped_and_monotonic() {
        let mut seen = Vec::new();
        {
            let mut cb = |v: f32| seen.push(v);
            let mut progress = Progress::new(Some(&mut cb));
            progress.report(0.5);
            progress.report(0.25);
            progress.report(3.0);
            progress.done();
        }
        assert_eq!(seen, vec![0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_progress_without_callback() {
        let mut progress = Progress::new(None);
        progress.report(0.5);
        progress.done();
    }

    #[test]
    fn test_check_capacity() {
        let program = vec![Instruction::STOP; 101];
        assert_eq!(
            check_capacity(&program, ProtocolVersion::V3),
            Err(DriverError::ProgramTooLarge { len: 101, max: 100 })
        );
        assert!(check_capacity(&program, ProtocolVersion::V6).is_ok());
    }
}
