use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("配置错误: {0}")]
    Config(#[from] toml::de::Error),

    #[error("配置文件未找到")]
    ConfigNotFound,

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP 请求错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("ZIP 文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("目录遍历错误: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("路径错误: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    #[error("备份源不存在: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("备份目录不可写: {0}")]
    DestUnwritable(String),

    #[error("读取归档文件失败: {0}")]
    ReadError(String),

    #[error("远端存储未认证，请重新授权后再试")]
    AuthRequired,

    #[error("上传失败: {0}")]
    UploadFailed(String),

    #[error("已有备份任务正在执行")]
    RunInProgress,

    #[error("写入操作日志失败: {0}")]
    LogWrite(String),

    #[error("自定义错误: {0}")]
    Custom(String),
}

impl BackupError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn dest_unwritable(msg: impl Into<String>) -> Self {
        Self::DestUnwritable(msg.into())
    }

    pub fn read_error(msg: impl Into<String>) -> Self {
        Self::ReadError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn log_write(msg: impl Into<String>) -> Self {
        Self::LogWrite(msg.into())
    }
}
