use crate::app::CliApp;
use backup_core::error::Result;
use backup_core::history::RunStatus;
use tracing::info;

/// 显示备份历史记录
pub fn run_history(app: &CliApp, limit: Option<usize>) -> Result<()> {
    let records = app.scheduler.history()?;

    if records.is_empty() {
        info!("📦 暂无备份记录");
        info!("💡 使用以下命令创建备份:");
        info!("   backup-cli run");
        return Ok(());
    }

    info!("📦 备份历史");
    info!("============");

    // 统计信息
    let total = records.len();
    let mut success = 0;
    let mut partial = 0;
    let mut failed = 0;

    let shown: Vec<_> = match limit {
        Some(n) => records.iter().rev().take(n).rev().collect(),
        None => records.iter().collect(),
    };

    // 详细信息表头
    info!(
        "{:<20} {:<12} {:<10} {:<10} {:<24} {}",
        "时间", "状态", "大小", "校验和", "远端文件ID", "压缩包"
    );
    info!("{}", "-".repeat(100));

    for record in &shown {
        let status_display = match record.status {
            RunStatus::Success => "✅ 成功",
            RunStatus::PartialFailure => "⚠️ 部分失败",
            RunStatus::Failure => "❌ 失败",
        };

        let size_display = if record.artifact_size > 1024 * 1024 {
            format!("{:.1}MB", record.artifact_size as f64 / (1024.0 * 1024.0))
        } else if record.artifact_size > 1024 {
            format!("{:.1}KB", record.artifact_size as f64 / 1024.0)
        } else {
            format!("{}B", record.artifact_size)
        };

        // 校验和只显示前 8 位，完整值在日志文件里
        let checksum_display = if record.checksum.is_empty() {
            "---".to_string()
        } else {
            record.checksum.chars().take(8).collect()
        };

        let remote_display = if record.remote_file_id.is_empty() {
            "---"
        } else {
            record.remote_file_id.as_str()
        };

        // 获取文件名而不是完整路径用于显示
        let artifact_display = std::path::Path::new(&record.artifact_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "---".to_string());

        info!(
            "{:<20} {:<12} {:<10} {:<10} {:<24} {}",
            record
                .timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            status_display,
            size_display,
            checksum_display,
            remote_display,
            artifact_display
        );

        if !record.message.is_empty() {
            info!("     └ {}", record.message);
        }
    }

    for record in &records {
        match record.status {
            RunStatus::Success => success += 1,
            RunStatus::PartialFailure => partial += 1,
            RunStatus::Failure => failed += 1,
        }
    }

    info!("{}", "-".repeat(100));

    // 统计摘要
    info!("📊 备份统计:");
    info!("   总次数: {}", total);
    info!("   成功: {} ✅", success);
    if partial > 0 {
        info!("   部分失败: {} ⚠️  (本地产物就绪，上传未完成)", partial);
    }
    if failed > 0 {
        info!("   失败: {} ❌", failed);
    }

    Ok(())
}
