use backup_core::{config::AppConfig, constants, error::Result};
use tracing::{info, warn};

/// 运行独立的初始化流程
pub fn run_init(force: bool) -> Result<()> {
    info!("💾 Backup CLI 初始化");
    info!("======================");

    // 检查是否已经初始化过
    if !force && constants::config::get_config_file_path().exists() {
        warn!("⚠️  检测到已存在的配置文件");
        info!("如果您要重新初始化，请使用 --force 参数");
        info!("示例: backup-cli init --force");
        return Ok(());
    }

    info!("📋 步骤 1: 创建配置文件");

    let config = AppConfig::default();
    config.save_to_file(constants::config::CONFIG_FILE_NAME)?;
    info!("   ✅ 创建配置文件: {}", constants::config::CONFIG_FILE_NAME);

    info!("📋 步骤 2: 创建备份存储目录");

    config.ensure_storage_dir()?;
    info!(
        "   ✅ 创建目录: {} (备份压缩包存放目录)",
        config.backup.local_dest_dir
    );

    info!("🎉 初始化完成！");
    info!("💡 接下来:");
    info!("   1. 编辑 {} 填写备份源路径和远端令牌", constants::config::CONFIG_FILE_NAME);
    info!("   2. 运行 backup-cli run 执行一次备份");
    info!("   3. 运行 backup-cli watch 启动自动备份");

    Ok(())
}
