use crate::constants::{backup, remote};
use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use toml;

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub backup: JobConfig,
    pub remote: RemoteConfig,
}

/// 单次备份任务配置，引擎每轮只读取快照，从不修改
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobConfig {
    /// 备份源路径（文件或目录）
    pub source_path: String,
    /// 备份压缩包的本地存放目录
    pub local_dest_dir: String,
    /// 远端目标文件夹 ID，空串表示默认根目录
    #[serde(default)]
    pub remote_folder_id: String,
    /// 自动备份间隔（分钟，最小 1）
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

/// 远端存储服务配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RemoteConfig {
    /// 远端存储服务地址
    pub base_url: String,
    /// 访问令牌，空串表示尚未认证
    #[serde(default)]
    pub token: String,
}

fn default_interval_minutes() -> u64 {
    backup::DEFAULT_INTERVAL_MINUTES
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backup: JobConfig {
                source_path: String::new(),
                local_dest_dir: backup::get_default_storage_dir()
                    .to_string_lossy()
                    .to_string(),
                remote_folder_id: String::new(),
                interval_minutes: backup::DEFAULT_INTERVAL_MINUTES,
            },
            remote: RemoteConfig {
                base_url: remote::DEFAULT_BASE_URL.to_string(),
                token: String::new(),
            },
        }
    }
}

impl AppConfig {
    /// 智能查找并加载配置文件
    /// 按优先级查找：config.toml -> backup-client.toml -> .backup-client.toml
    pub fn find_and_load_config() -> Result<Self> {
        let config_files = ["config.toml", "backup-client.toml", ".backup-client.toml"];

        for config_file in &config_files {
            if Path::new(config_file).exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Self::load_from_file(config_file);
            }
        }

        Err(BackupError::ConfigNotFound)
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Err(BackupError::ConfigNotFound);
        }

        let content = fs::read_to_string(&path)?;
        let mut config: AppConfig = toml::from_str(&content)?;

        // 间隔下限为 1 分钟
        if config.backup.interval_minutes < 1 {
            tracing::warn!("interval_minutes 小于 1，已调整为 1 分钟");
            config.backup.interval_minutes = 1;
        }

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_with_comments();
        fs::write(&path, content)?;
        Ok(())
    }

    /// 生成带注释的TOML配置
    fn to_toml_with_comments(&self) -> String {
        const TEMPLATE: &str = include_str!("../templates/config.toml.template");

        TEMPLATE
            .replace("{source_path}", &self.backup.source_path)
            .replace("{local_dest_dir}", &self.backup.local_dest_dir)
            .replace("{remote_folder_id}", &self.backup.remote_folder_id)
            .replace(
                "{interval_minutes}",
                &self.backup.interval_minutes.to_string(),
            )
            .replace("{base_url}", &self.remote.base_url)
            .replace("{token}", &self.remote.token)
    }

    /// 确保备份存储目录存在
    pub fn ensure_storage_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.backup.local_dest_dir)?;
        Ok(())
    }

    /// 获取备份存储目录路径
    pub fn get_storage_dir(&self) -> PathBuf {
        PathBuf::from(&self.backup.local_dest_dir)
    }
}
