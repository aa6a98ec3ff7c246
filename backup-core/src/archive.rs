use crate::constants::backup;
use crate::error::{BackupError, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// 一次备份产出的压缩包
#[derive(Debug, Clone)]
pub struct Artifact {
    /// 压缩包在本地的路径
    pub path: PathBuf,
    /// 从落盘文件读取的实际大小，不做估算
    pub size_bytes: u64,
    /// 本轮备份的开始时间，同时嵌入在文件名中
    pub created_at: DateTime<Utc>,
}

/// 把源路径打包为带时间戳的 ZIP 压缩包
///
/// 源是单个文件时，文件位于压缩包根部；源是目录时，保留完整的相对路径树。
/// 中途失败会先删除写了一半的压缩包再返回错误，目标目录里不会留下损坏产物。
pub fn create_archive(
    source_path: &Path,
    local_dest_dir: &Path,
    started_at: DateTime<Utc>,
) -> Result<Artifact> {
    if !source_path.exists() {
        return Err(BackupError::SourceNotFound(source_path.to_path_buf()));
    }

    std::fs::create_dir_all(local_dest_dir).map_err(|e| {
        BackupError::dest_unwritable(format!("{}: {}", local_dest_dir.display(), e))
    })?;

    let out_path = resolve_artifact_path(source_path, local_dest_dir, started_at);

    let file = File::create(&out_path).map_err(|e| {
        BackupError::dest_unwritable(format!("{}: {}", out_path.display(), e))
    })?;

    if let Err(e) = write_entries(file, source_path) {
        // 不留下损坏的半成品
        let _ = std::fs::remove_file(&out_path);
        return Err(e);
    }

    let size_bytes = std::fs::metadata(&out_path)?.len();

    Ok(Artifact {
        path: out_path,
        size_bytes,
        created_at: started_at,
    })
}

/// 推导产物文件名 backup-<base>-<YYYYMMDD-HHMMSS>.zip
///
/// 同一秒内的重名（例如两次手动触发）追加数字后缀，绝不覆盖已有文件。
fn resolve_artifact_path(
    source_path: &Path,
    local_dest_dir: &Path,
    started_at: DateTime<Utc>,
) -> PathBuf {
    let raw_base = if source_path.is_file() {
        source_path.file_stem()
    } else {
        source_path.file_name()
    };
    let mut base = safe_name(&raw_base.map(|s| s.to_string_lossy()).unwrap_or_default());
    if base.is_empty() {
        base = "backup".to_string();
    }

    let stem = format!(
        "{}{}-{}",
        backup::ARTIFACT_PREFIX,
        base,
        started_at.format(backup::TIMESTAMP_FORMAT)
    );

    let candidate = local_dest_dir.join(format!("{}{}", stem, backup::ARTIFACT_EXTENSION));
    if !candidate.exists() {
        return candidate;
    }

    let mut n = 1u32;
    loop {
        let candidate =
            local_dest_dir.join(format!("{}-{}{}", stem, n, backup::ARTIFACT_EXTENSION));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// 过滤文件名中的特殊字符，只保留字母数字和 `- _ . ` 及空格
fn safe_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

fn write_entries(file: File, source_path: &Path) -> Result<()> {
    let mut archive = ZipWriter::new(file);

    // 固定每个条目的修改时间和权限，内容相同的源树总是产出逐字节相同的压缩包
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    if source_path.is_file() {
        let name = source_path
            .file_name()
            .ok_or_else(|| BackupError::custom("无法获取源文件名"))?
            .to_string_lossy()
            .to_string();

        archive.start_file(name, options)?;
        let mut input = File::open(source_path)?;
        io::copy(&mut input, &mut archive)?;
    } else {
        // 排序遍历保证条目顺序稳定
        for entry in WalkDir::new(source_path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = entry.path().strip_prefix(source_path)?;

            // 在Windows上，确保使用Unix风格的路径分隔符用于zip归档
            let archive_path = if cfg!(windows) {
                relative_path.display().to_string().replace('\\', "/")
            } else {
                relative_path.display().to_string()
            };

            archive.start_file(archive_path, options)?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut archive)?;
        }
    }

    archive.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_file;
    use chrono::TimeZone;
    use std::io::Read;
    use tempfile::tempdir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
    }

    fn read_entry(zip_path: &Path, name: &str) -> String {
        let file = File::open(zip_path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_archive_single_file() {
        let source_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = source_dir.path().join("hello.txt");
        std::fs::write(&source, "0123456789").unwrap();

        let artifact = create_archive(&source, dest_dir.path(), fixed_time()).unwrap();

        assert!(artifact.path.exists());
        assert!(artifact.size_bytes > 0);
        let file_name = artifact.path.file_name().unwrap().to_string_lossy();
        assert_eq!(&*file_name, "backup-hello-20240301-123045.zip");

        // 单个文件位于压缩包根部
        assert_eq!(read_entry(&artifact.path, "hello.txt"), "0123456789");
    }

    #[test]
    fn test_archive_directory_tree() {
        let source_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        std::fs::write(source_dir.path().join("a.txt"), "aaa").unwrap();
        std::fs::create_dir_all(source_dir.path().join("sub")).unwrap();
        std::fs::write(source_dir.path().join("sub").join("b.txt"), "bbb").unwrap();

        let artifact = create_archive(source_dir.path(), dest_dir.path(), fixed_time()).unwrap();

        assert_eq!(read_entry(&artifact.path, "a.txt"), "aaa");
        // 相对路径保留，分隔符固定为 /
        assert_eq!(read_entry(&artifact.path, "sub/b.txt"), "bbb");
    }

    #[test]
    fn test_source_not_found() {
        let dest_dir = tempdir().unwrap();
        let missing = dest_dir.path().join("no-such-source");

        let result = create_archive(&missing, &dest_dir.path().join("out"), fixed_time());
        assert!(matches!(result, Err(BackupError::SourceNotFound(_))));
        // 源校验失败时不应创建目标目录
        assert!(!dest_dir.path().join("out").exists());
    }

    #[test]
    fn test_same_second_collision_gets_suffix() {
        let source_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let source = source_dir.path().join("data.txt");
        std::fs::write(&source, "x").unwrap();

        let first = create_archive(&source, dest_dir.path(), fixed_time()).unwrap();
        let second = create_archive(&source, dest_dir.path(), fixed_time()).unwrap();

        assert!(first.path.exists());
        assert!(second.path.exists());
        assert_ne!(first.path, second.path);
        let second_name = second.path.file_name().unwrap().to_string_lossy();
        assert_eq!(&*second_name, "backup-data-20240301-123045-1.zip");
    }

    #[test]
    fn test_identical_content_yields_identical_checksum() {
        let source_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        std::fs::write(source_dir.path().join("a.txt"), "same bytes").unwrap();
        std::fs::create_dir_all(source_dir.path().join("sub")).unwrap();
        std::fs::write(source_dir.path().join("sub").join("b.txt"), "more bytes").unwrap();

        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 8, 15, 0).unwrap();

        let first = create_archive(source_dir.path(), dest_dir.path(), earlier).unwrap();
        let second = create_archive(source_dir.path(), dest_dir.path(), later).unwrap();

        // 文件名不同（时间戳不同），但内容相同的源树产出相同的校验和
        assert_ne!(first.path, second.path);
        assert_eq!(
            sha256_file(&first.path).unwrap(),
            sha256_file(&second.path).unwrap()
        );
    }
}
