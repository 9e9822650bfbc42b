//! 扫描命令
//!
//! 打印发现的设备，直到超时或 Ctrl-C

use anyhow::Result;
use clap::Args;
use crossbeam_channel::{after, select};
use std::time::Duration;

use crate::session::Session;
use crate::utils;

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// 扫描时长（秒）
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}

impl ScanCommand {
    pub fn execute(&self, session: &Session) -> Result<()> {
        let interrupted = utils::interrupt_channel()?;
        let found = session.discover()?;
        let deadline = after(Duration::from_secs(self.timeout));

        println!("🔍 扫描中（{} 秒，Ctrl-C 结束）...", self.timeout);
        let mut count = 0;
        loop {
            select! {
                recv(found) -> device => match device {
                    Ok(device) => {
                        count += 1;
                        println!(
                            "  {}  {}",
                            device.id,
                            device.name.as_deref().unwrap_or("<unnamed>")
                        );
                    },
                    Err(_) => break,
                },
                recv(interrupted) -> _ => {
                    println!("\n⏹️  已中断");
                    break;
                },
                recv(deadline) -> _ => break,
            }
        }

        session.hardware().stop_discovery();
        println!("✅ 发现 {} 台设备", count);
        Ok(())
    }
}
