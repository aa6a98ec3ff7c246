use crate::app::CliApp;
use backup_core::error::Result;
use tracing::{error, info};

/// 立即执行一次备份
pub async fn run_backup(app: &CliApp) -> Result<()> {
    info!("💾 执行备份");
    info!("===========");
    info!("   备份源: {}", app.config.backup.source_path);
    info!("   存放目录: {}", app.config.backup.local_dest_dir);

    match app.scheduler.run_once(&app.config.backup).await {
        Ok(record) => {
            info!("🎉 备份完成！");
            info!("   压缩包: {}", record.artifact_path);

            let size_mb = record.artifact_size as f64 / (1024.0 * 1024.0);
            info!("   文件大小: {:.2} MB", size_mb);
            info!("   sha256: {}", record.checksum);
            info!("   远端文件 ID: {}", record.remote_file_id);
            Ok(())
        }
        Err(e) => {
            error!("❌ 备份失败: {}", e);
            info!("💡 请检查:");
            info!("   - 备份源路径是否存在");
            info!("   - 存放目录是否有写入权限");
            info!("   - 远端令牌是否有效");
            info!("   本次结果已写入操作日志，可用 backup-cli history 查看");
            Err(e)
        }
    }
}
