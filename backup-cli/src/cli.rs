use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Backup CLI - 定时备份与云端上传工具
#[derive(Parser)]
#[command(name = "backup-cli")]
#[command(about = "把文件或目录打包成带时间戳的 ZIP，校验后上传到远端存储，并记录每次结果")]
#[command(version)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 首次使用时初始化客户端，创建配置文件
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
    /// 立即执行一次备份
    Run,
    /// 启动自动备份，按配置的间隔周期执行，Ctrl+C 退出
    Watch,
    /// 显示备份历史记录
    History {
        /// 只显示最近 N 条记录
        #[arg(long)]
        limit: Option<usize>,
    },
    /// 显示当前配置与调度状态
    Status,
}
