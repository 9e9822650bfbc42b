//! # EduBot CLI
//!
//! Command-line interface for EduBot educational robots.
//!
//! 每个命令独立执行（连接 → 操作 → 断开），后端由配置文件或
//! `--emulator-firmware` 决定：
//!
//! ```bash
//! # 扫描
//! edubot-cli scan --timeout 5
//!
//! # 编译并上传程序集中的 main
//! edubot-cli --emulator-firmware 6 upload programs.json --program main
//!
//! # 下载、运行、录制
//! edubot-cli --device emulator-0 download
//! edubot-cli run
//! edubot-cli record 5 --output recording.json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use edubot_sdk::tools::SessionConfig;

mod commands;
mod session;
mod utils;

use commands::{
    CompileCommand, DownloadCommand, IntervalCommand, RecordCommand, ScanCommand, UploadCommand,
};
use session::{GlobalArgs, Session};

/// EduBot CLI - 教育机器人命令行工具
#[derive(Parser, Debug)]
#[command(name = "edubot-cli")]
#[command(about = "Command-line interface for EduBot educational robots", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描附近的机器人
    Scan {
        #[command(flatten)]
        args: ScanCommand,
    },

    /// 编译程序并上传
    Upload {
        #[command(flatten)]
        args: UploadCommand,
    },

    /// 下载机器人上存储的程序
    Download {
        #[command(flatten)]
        args: DownloadCommand,
    },

    /// 运行已存程序
    Run,

    /// 进入驾驶模式
    Go,

    /// 停止
    Stop,

    /// 读取或设置步进间隔
    Interval {
        #[command(flatten)]
        args: IntervalCommand,
    },

    /// 录制运动并下载
    Record {
        #[command(flatten)]
        args: RecordCommand,
    },

    /// 只编译，输出 JSON
    Compile {
        #[command(flatten)]
        args: CompileCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("edubot_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;
    let session = || Session::open(&global);

    match cli.command {
        Commands::Scan { args } => args.execute(&session()?),
        Commands::Upload { args } => args.execute(&session()?),
        Commands::Download { args } => args.execute(&session()?),
        Commands::Run => commands::control::run(&session()?),
        Commands::Go => commands::control::go(&session()?),
        Commands::Stop => commands::control::stop(&session()?),
        Commands::Interval { args } => args.execute(&session()?),
        Commands::Record { args } => args.execute(&session()?),
        Commands::Compile { args } => {
            // 不需要硬件
            let config = SessionConfig::load(global.config.as_deref())?;
            args.execute(config.program_store.as_deref())
        },
    }
}
