use crate::error::{BackupError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 计算文件的SHA256哈希值，返回小写十六进制字符串
///
/// 以 1MB 块流式读取，不会把整个文件载入内存。
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        BackupError::read_error(format!("无法打开文件 {}: {}", path.display(), e))
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| {
            BackupError::read_error(format!("读取文件失败 {}: {}", path.display(), e))
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    let hash = hasher.finalize();
    Ok(format!("{hash:x}"))
}
