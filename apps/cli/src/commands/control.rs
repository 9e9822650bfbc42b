//! 控制命令：运行、驾驶、停止、间隔、录制

use anyhow::{Result, bail};
use clap::Args;
use crossbeam_channel::{after, select};
use std::path::PathBuf;
use std::time::Duration;

use crate::commands::program::write_instructions;
use crate::session::Session;
use crate::utils;

/// 运行已存程序，等待结束
pub fn run(session: &Session) -> Result<()> {
    let robot = session.connect()?;
    println!("▶️  运行中...");
    robot.run()?;
    println!("✅ 程序结束");
    Ok(())
}

/// 进入驾驶模式（保持到 `stop`）
pub fn go(session: &Session) -> Result<()> {
    let robot = session.connect()?;
    robot.go()?;
    println!("✅ 已进入驾驶模式");
    Ok(())
}

/// 停止
pub fn stop(session: &Session) -> Result<()> {
    let robot = session.connect()?;
    robot.stop()?;
    println!("🛑 已停止");
    Ok(())
}

/// 间隔命令参数
#[derive(Args, Debug)]
pub struct IntervalCommand {
    /// 新的步进间隔（分秒，0–99）；省略时只读取
    pub value: Option<i32>,
}

impl IntervalCommand {
    pub fn execute(&self, session: &Session) -> Result<()> {
        let robot = session.connect()?;
        if let Some(value) = self.value {
            robot.set_interval(value)?;
            println!("✅ 间隔已设置为 {} ds", value);
        }
        println!("⏱️  当前间隔: {} ds", robot.get_interval()?);
        Ok(())
    }
}

/// 录制命令参数
#[derive(Args, Debug)]
pub struct RecordCommand {
    /// 录制时长（秒，1–9999）
    pub seconds: i32,

    /// 录制结果输出文件（默认打印到标准输出）
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RecordCommand {
    /// 开始录制，等待时长结束（或 Ctrl-C），停止后下载录制结果
    pub fn execute(&self, session: &Session) -> Result<()> {
        if self.seconds < 1 {
            bail!("recording duration must be at least 1 second");
        }
        let interrupted = utils::interrupt_channel()?;
        let robot = session.connect()?;

        robot.start_recording(self.seconds)?;
        println!("⏺️  录制中（{} 秒，Ctrl-C 提前结束）...", self.seconds);
        let deadline = after(Duration::from_secs(self.seconds as u64));
        select! {
            recv(deadline) -> _ => {},
            recv(interrupted) -> _ => println!("\n⏹️  已中断"),
        }
        robot.stop_recording()?;

        let mut progress = utils::progress_printer("下载中");
        let recorded = robot.download_recording(Some(&mut progress))?;
        println!("✅ 录制完成: {} 步", recorded.len());
        write_instructions(&recorded, self.output.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_command_creation() {
        let cmd = RecordCommand {
            seconds: 10,
            output: Some(PathBuf::from("recording.json")),
        };
        assert_eq!(cmd.seconds, 10);
        assert_eq!(cmd.output, Some(PathBuf::from("recording.json")));
    }
}
