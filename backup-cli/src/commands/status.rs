use crate::app::CliApp;
use backup_core::error::Result;
use tracing::info;

/// 显示当前配置与调度状态
pub fn run_status(app: &CliApp) -> Result<()> {
    info!("💾 Backup Client 状态");
    info!("=====================");
    info!("📋 基本信息:");
    info!("   客户端版本: v{}", env!("CARGO_PKG_VERSION"));

    info!("📁 当前配置:");
    info!("   备份源: {}", app.config.backup.source_path);
    info!("   存放目录: {}", app.config.backup.local_dest_dir);
    if app.config.backup.remote_folder_id.is_empty() {
        info!("   远端文件夹: (默认根目录)");
    } else {
        info!("   远端文件夹: {}", app.config.backup.remote_folder_id);
    }
    info!("   自动备份间隔: {} 分钟", app.config.backup.interval_minutes);
    info!("   远端服务: {}", app.config.remote.base_url);
    if app.config.remote.token.is_empty() {
        info!("   认证状态: ❌ 未配置令牌，上传会失败");
    } else {
        info!("   认证状态: ✅ 已配置令牌");
    }

    // 本进程内的调度状态；自动备份需要常驻的 watch 进程
    let state = app.scheduler.state();
    info!("⏰ 调度状态:");
    info!("   自动备份: {}", if state.armed { "已启动" } else { "未启动" });
    info!("   执行中: {}", if state.running { "是" } else { "否" });

    // 最近一次备份结果
    let records = app.scheduler.history()?;
    match records.last() {
        None => info!("📦 最近备份: 暂无记录"),
        Some(record) => {
            info!("📦 最近备份:");
            info!("   时间: {}", record.timestamp.format("%Y-%m-%d %H:%M:%S"));
            info!("   状态: {}", record.status);
            if !record.message.is_empty() {
                info!("   详情: {}", record.message);
            }
        }
    }

    Ok(())
}
