use crate::app::CliApp;
use backup_core::error::Result;
use tracing::info;

/// 启动自动备份并阻塞到 Ctrl+C
pub async fn run_watch(app: &CliApp) -> Result<()> {
    let interval = app.config.backup.interval_minutes.max(1);

    info!("⏰ 启动自动备份");
    info!("===============");
    info!("   备份源: {}", app.config.backup.source_path);
    info!("   间隔: {} 分钟（首轮立即执行）", interval);
    info!("   按 Ctrl+C 停止");

    app.scheduler.start(app.config.backup.clone()).await?;

    tokio::signal::ctrl_c().await?;

    info!("收到退出信号，正在停止自动备份...");
    app.scheduler.stop().await;
    info!("⏹️  自动备份已停止");

    Ok(())
}
