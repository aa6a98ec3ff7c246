/// 备份产物相关常量
pub mod backup {
    use std::path::{Path, PathBuf};

    /// 备份文件前缀
    pub const ARTIFACT_PREFIX: &str = "backup-";

    /// 备份文件扩展名
    pub const ARTIFACT_EXTENSION: &str = ".zip";

    /// 嵌入文件名的时间戳格式（UTC，秒级精度）
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

    /// 默认的备份存储目录名
    pub const STORAGE_DIR_NAME: &str = "backups";

    /// 默认自动备份间隔（分钟）
    pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;

    /// 获取默认备份存储目录（用于配置）
    pub fn get_default_storage_dir() -> PathBuf {
        Path::new(".").join(STORAGE_DIR_NAME)
    }
}

/// 操作日志相关常量
pub mod history {
    use std::path::{Path, PathBuf};

    /// 操作日志文件名
    pub const LOG_FILE_NAME: &str = "backup_log.csv";

    /// 日志表头，列顺序固定，缺失字段写空串而不是省略
    pub const LOG_HEADER: &str =
        "date_time,source,zip_path,zip_size,checksum,drive_file_id,status,message";

    /// 获取默认操作日志路径
    pub fn get_log_file_path() -> PathBuf {
        Path::new(".").join(LOG_FILE_NAME)
    }
}

/// 远端存储相关常量
pub mod remote {
    /// 默认远端存储服务地址
    pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

    /// 上传端点
    pub const UPLOAD_ENDPOINT: &str = "/api/v1/files/upload";

    /// User-Agent头
    pub const USER_AGENT: &str = "backup-cli/1.0";
}

/// 配置文件相关常量
pub mod config {
    use std::path::{Path, PathBuf};

    /// 默认配置文件名
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// 获取默认配置文件路径
    pub fn get_config_file_path() -> PathBuf {
        Path::new(".").join(CONFIG_FILE_NAME)
    }
}
