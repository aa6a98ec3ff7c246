use backup_core::{
    config::AppConfig, constants, error::Result, history::OperationLog, remote::HttpRemoteStore,
    scheduler::BackupScheduler,
};
use std::path::Path;
use std::sync::Arc;

use crate::cli::Commands;
use crate::commands;

pub struct CliApp {
    pub config: AppConfig,
    pub scheduler: BackupScheduler,
}

impl CliApp {
    /// 从指定配置文件初始化CLI应用
    pub fn new(config_path: &Path) -> Result<Self> {
        let config = AppConfig::load_from_file(config_path)?;

        // 远端凭据只存在于适配器内部，引擎只看到上传能力
        let remote = Arc::new(HttpRemoteStore::from_config(&config.remote));
        let history = OperationLog::new(constants::history::get_log_file_path());
        let scheduler = BackupScheduler::new(remote, history);

        Ok(Self { config, scheduler })
    }

    /// 运行应用命令
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
            Commands::Run => commands::run_backup(self).await,
            Commands::Watch => commands::run_watch(self).await,
            Commands::History { limit } => commands::run_history(self, limit),
            Commands::Status => commands::run_status(self),
        }
    }
}
