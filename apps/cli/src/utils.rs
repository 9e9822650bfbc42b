//! 终端交互工具

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use std::io::Write;

/// 安装 Ctrl-C 处理器，返回中断通知通道
///
/// 进程内只能安装一次。
pub fn interrupt_channel() -> Result<Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(rx)
}

/// 进度条回调（原地刷新）
pub fn progress_printer(label: &'static str) -> impl FnMut(f32) {
    move |value: f32| {
        print!("\r{}: {:>3.0}%", label, value * 100.0);
        std::io::stdout().flush().ok();
        if value >= 1.0 {
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_printer_accepts_full_range() {
        let mut print = progress_printer("test");
        for value in [0.0, 0.5, 1.0] {
            print(value);
        }
    }
}
