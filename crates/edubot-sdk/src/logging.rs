//! 日志初始化
//!
//! 库内部统一使用 `tracing`；蓝牙后端依赖的 `log` 记录经 `tracing-log`
//! 桥接到同一个订阅者。

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 以 `info` 为默认级别初始化日志（`RUST_LOG` 优先）
pub fn init_logger() {
    init_logger_with_filter("info");
}

/// 以给定的默认过滤指令初始化日志（`RUST_LOG` 优先）
///
/// 只有第一次调用生效；若进程中已有全局订阅者则保持不变。
pub fn init_logger_with_filter(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return;
        }
        // log → tracing
        let _ = tracing_log::LogTracer::init();
    });
}
