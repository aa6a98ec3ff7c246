use crate::constants::history;
use crate::error::{BackupError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 单轮备份的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// 归档、校验、上传全部完成
    Success,
    /// 本地产物和校验和就绪，但上传失败
    PartialFailure,
    /// 归档或校验失败，没有可上传的产物
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "Success",
            RunStatus::PartialFailure => "PartialFailure",
            RunStatus::Failure => "Failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Success" => Some(RunStatus::Success),
            "PartialFailure" => Some(RunStatus::PartialFailure),
            "Failure" => Some(RunStatus::Failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 操作记录，每轮备份恰好追加一条，写入后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// 本轮备份的开始时间
    pub timestamp: DateTime<Utc>,
    pub source_path: String,
    /// 归档失败时为空串
    pub artifact_path: String,
    pub artifact_size: u64,
    /// 校验失败时为空串
    pub checksum: String,
    /// 上传失败时为空串
    pub remote_file_id: String,
    pub status: RunStatus,
    pub message: String,
}

/// 追加式操作日志，备份历史的唯一可信来源
///
/// 每条记录作为单行一次性写入并刷盘，崩溃最多损坏正在写的那一行，
/// 已写入的记录不受影响。
#[derive(Debug, Clone)]
pub struct OperationLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条操作记录，文件不存在时先写表头
    pub fn append(&self, record: &OperationRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| BackupError::log_write("日志锁已失效"))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BackupError::log_write(format!("创建日志目录失败 {}: {}", parent.display(), e))
                })?;
            }
        }

        let needs_header = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        // 整条记录组装成一个缓冲，单次写入后立即刷盘
        let mut buffer = String::new();
        if needs_header {
            buffer.push_str(history::LOG_HEADER);
            buffer.push('\n');
        }
        buffer.push_str(&format_row(record));
        buffer.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                BackupError::log_write(format!("打开日志文件失败 {}: {}", self.path.display(), e))
            })?;

        file.write_all(buffer.as_bytes())
            .map_err(|e| BackupError::log_write(format!("追加日志失败: {e}")))?;
        file.flush()
            .map_err(|e| BackupError::log_write(format!("刷新日志失败: {e}")))?;

        Ok(())
    }

    /// 读取全部记录，最旧的在前；日志不存在视为空历史
    pub fn read_all(&self) -> Result<Vec<OperationRecord>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| BackupError::log_write("日志锁已失效"))?;

        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let mut records = Vec::new();

        for (index, line) in content.lines().enumerate() {
            // 跳过表头和空行
            if index == 0 || line.trim().is_empty() {
                continue;
            }

            records.push(parse_row(line).ok_or_else(|| {
                BackupError::custom(format!("日志第 {} 行格式无效", index + 1))
            })?);
        }

        Ok(records)
    }
}

/// 列顺序固定：date_time,source,zip_path,zip_size,checksum,drive_file_id,status,message
fn format_row(record: &OperationRecord) -> String {
    // message 里的换行压成空格，保证一条记录始终是一行
    let message = record
        .message
        .replace('\r', " ")
        .replace('\n', " ");

    [
        record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        record.source_path.clone(),
        record.artifact_path.clone(),
        record.artifact_size.to_string(),
        record.checksum.clone(),
        record.remote_file_id.clone(),
        record.status.as_str().to_string(),
        message,
    ]
    .iter()
    .map(|field| escape_field(field))
    .collect::<Vec<_>>()
    .join(",")
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn parse_row(line: &str) -> Option<OperationRecord> {
    let fields = split_row(line);
    if fields.len() != 8 {
        return None;
    }

    let timestamp = DateTime::parse_from_rfc3339(&fields[0])
        .ok()?
        .with_timezone(&Utc);
    let artifact_size = if fields[3].is_empty() {
        0
    } else {
        fields[3].parse().ok()?
    };
    let status = RunStatus::parse(&fields[6])?;

    Some(OperationRecord {
        timestamp,
        source_path: fields[1].clone(),
        artifact_path: fields[2].clone(),
        artifact_size,
        checksum: fields[4].clone(),
        remote_file_id: fields[5].clone(),
        status,
        message: fields[7].clone(),
    })
}

fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
    }

    fields.push(current);
    fields
}
