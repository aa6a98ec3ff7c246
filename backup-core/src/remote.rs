use crate::config::RemoteConfig;
use crate::constants::remote;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use reqwest::{Body, Client, multipart};
use serde::Deserialize;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

/// 远端存储能力，引擎只依赖这一个上传操作
///
/// 认证、会话等事务全部留在实现侧，引擎不接触任何凭据。
/// 该接口不保证幂等：重试的一轮备份会产生新的产物和新的远端对象。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 上传本地文件到指定的远端文件夹，返回远端文件 ID
    ///
    /// `remote_folder_id` 为空串表示上传到默认根目录。
    async fn upload(&self, local_path: &Path, remote_folder_id: &str) -> Result<String>;
}

/// 基于 HTTP 的远端存储适配器
///
/// 以 multipart 流式上传，带 Bearer 令牌认证。
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

/// 上传接口响应
#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        let token = if config.token.is_empty() {
            None
        } else {
            Some(config.token.clone())
        };
        Self::new(config.base_url.clone(), token)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upload(&self, local_path: &Path, remote_folder_id: &str) -> Result<String> {
        // 没有可用凭据时直接终止本轮，由操作员在带外重新授权
        let token = self.token.as_deref().ok_or(BackupError::AuthRequired)?;

        let file_name = local_path
            .file_name()
            .ok_or_else(|| BackupError::upload_failed("无法获取产物文件名"))?
            .to_string_lossy()
            .to_string();

        let file = tokio::fs::File::open(local_path).await.map_err(|e| {
            BackupError::upload_failed(format!("无法打开产物 {}: {}", local_path.display(), e))
        })?;
        let file_size = file
            .metadata()
            .await
            .map_err(|e| BackupError::upload_failed(format!("读取产物元数据失败: {e}")))?
            .len();

        // 流式上传，大文件不会整体载入内存
        let stream = ReaderStream::new(file);
        let part = multipart::Part::stream_with_length(Body::wrap_stream(stream), file_size)
            .file_name(file_name.clone());

        let mut form = multipart::Form::new().part("file", part);
        if !remote_folder_id.is_empty() {
            form = form.text("folder_id", remote_folder_id.to_string());
        }

        let url = format!("{}{}", self.base_url, remote::UPLOAD_ENDPOINT);
        info!("开始上传: {} -> {}", file_name, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, remote::USER_AGENT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackupError::upload_failed(format!("上传请求失败: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let upload_response: UploadResponse = response
                .json()
                .await
                .map_err(|e| BackupError::upload_failed(format!("解析上传响应失败: {e}")))?;
            info!("上传成功，远端文件 ID: {}", upload_response.id);
            Ok(upload_response.id)
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            error!("上传被拒绝，凭据已失效: {}", status);
            Err(BackupError::AuthRequired)
        } else {
            let text = response.text().await.unwrap_or_default();
            error!("上传失败: {} - {}", status, text);
            Err(BackupError::upload_failed(format!("{status} - {text}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_token_is_auth_required() {
        let temp_dir = tempdir().unwrap();
        let artifact = temp_dir.path().join("backup.zip");
        std::fs::write(&artifact, "zip bytes").unwrap();

        let store = HttpRemoteStore::new("http://127.0.0.1:3000", None);
        let result = store.upload(&artifact, "").await;
        assert!(matches!(result, Err(BackupError::AuthRequired)));
    }

    #[test]
    fn test_empty_config_token_means_unauthenticated() {
        let config = RemoteConfig {
            base_url: "http://127.0.0.1:3000".to_string(),
            token: String::new(),
        };
        let store = HttpRemoteStore::from_config(&config);
        assert!(store.token.is_none());
    }
}
