use crate::archive;
use crate::config::JobConfig;
use crate::error::{BackupError, Result};
use crate::hash;
use crate::history::{OperationLog, OperationRecord, RunStatus};
use crate::remote::RemoteStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 调度器状态快照
///
/// 只在调度器内部的锁下修改，对外只暴露克隆出来的快照。
/// 进程重启后不保留，自动备份需要重新启动。
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerState {
    /// 自动备份是否已启动
    pub armed: bool,
    /// 当前是否有一轮备份正在执行
    pub running: bool,
    pub interval_minutes: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            armed: false,
            running: false,
            interval_minutes: 0,
            last_run_at: None,
            next_run_at: None,
        }
    }
}

struct TimerHandle {
    token: CancellationToken,
}

/// 备份调度器
///
/// 驱动 归档 -> 校验 -> 上传 -> 记录 流水线，支持手动触发和定时触发。
/// 两条触发路径竞争同一把单轮互斥锁，任何时刻至多有一轮备份在执行；
/// 定时触发撞上在途备份时跳过，手动触发则被拒绝，从不排队。
#[derive(Clone)]
pub struct BackupScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    remote: Arc<dyn RemoteStore>,
    history: OperationLog,
    state: Mutex<SchedulerState>,
    /// 单轮互斥锁，try_lock 失败即表示已有备份在途
    run_gate: tokio::sync::Mutex<()>,
    timer: Mutex<Option<TimerHandle>>,
}

impl BackupScheduler {
    pub fn new(remote: Arc<dyn RemoteStore>, history: OperationLog) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                remote,
                history,
                state: Mutex::new(SchedulerState::default()),
                run_gate: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// 立即执行一轮备份
    ///
    /// 返回时操作记录一定已经落盘。已有备份在途时返回 `RunInProgress`，
    /// 不排队等待；失败时错误同样返回给调用方，便于控制面即时反馈。
    pub async fn run_once(&self, config: &JobConfig) -> Result<OperationRecord> {
        let Ok(_guard) = self.inner.run_gate.try_lock() else {
            return Err(BackupError::RunInProgress);
        };
        self.inner.execute_run(config).await
    }

    /// 启动自动备份，按配置的间隔周期触发，首轮立即执行
    ///
    /// 已处于启动状态时忽略重复请求。
    pub async fn start(&self, config: JobConfig) -> Result<()> {
        let interval_minutes = config.interval_minutes.max(1);
        self.start_with_period(config, Duration::from_secs(interval_minutes * 60))
    }

    fn start_with_period(&self, config: JobConfig, period: Duration) -> Result<()> {
        let mut timer = self.inner.timer_guard();
        if timer.is_some() {
            warn!("自动备份已在运行，忽略重复的启动请求");
            return Ok(());
        }

        let interval_minutes = config.interval_minutes.max(1);
        let token = CancellationToken::new();
        *timer = Some(TimerHandle {
            token: token.clone(),
        });
        drop(timer);

        {
            let mut state = self.inner.state_guard();
            state.armed = true;
            state.interval_minutes = interval_minutes;
            state.next_run_at = Some(Utc::now());
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.timer_loop(config, period, token).await;
        });

        info!("自动备份已启动，间隔 {} 分钟", interval_minutes);
        Ok(())
    }

    /// 停止自动备份
    ///
    /// 只撤销定时器；已经开始的一轮备份会正常跑完并落盘记录。
    /// 未启动时忽略停止请求。
    pub async fn stop(&self) {
        let handle = self.inner.timer_guard().take();
        match handle {
            None => warn!("自动备份未在运行，忽略停止请求"),
            Some(handle) => {
                handle.token.cancel();
                let mut state = self.inner.state_guard();
                state.armed = false;
                state.next_run_at = None;
                info!("自动备份已停止，进行中的备份会正常完成");
            }
        }
    }

    /// 获取调度器状态快照
    pub fn state(&self) -> SchedulerState {
        self.inner.state_guard().clone()
    }

    /// 读取全部历史记录，最旧的在前
    pub fn history(&self) -> Result<Vec<OperationRecord>> {
        self.inner.history.read_all()
    }
}

impl SchedulerInner {
    fn state_guard(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer_guard(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn timer_loop(
        self: Arc<Self>,
        config: JobConfig,
        period: Duration,
        token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    {
                        let delta = chrono::Duration::from_std(period)
                            .unwrap_or_else(|_| chrono::Duration::zero());
                        self.state_guard().next_run_at = Some(Utc::now() + delta);
                    }

                    match self.run_gate.try_lock() {
                        Err(_) => {
                            debug!("上一轮备份仍在执行，跳过本次定时触发");
                        }
                        Ok(_guard) => match self.execute_run(&config).await {
                            Ok(record) => {
                                info!("定时备份完成: {}", record.artifact_path);
                            }
                            Err(BackupError::LogWrite(msg)) => {
                                // 无法记录历史是唯一不可恢复的状况，停止调度而不是静默丢失记录
                                error!("无法写入操作日志，自动备份已停止: {}", msg);
                                *self.timer_guard() = None;
                                let mut state = self.state_guard();
                                state.armed = false;
                                state.next_run_at = None;
                                break;
                            }
                            Err(e) => {
                                // 记录已落盘，操作员通过历史发现失败
                                error!("定时备份失败: {}", e);
                            }
                        },
                    }
                }
            }
        }
    }

    /// 执行一轮备份，调用前必须已持有单轮互斥锁
    async fn execute_run(&self, config: &JobConfig) -> Result<OperationRecord> {
        let started_at = Utc::now();
        {
            let mut state = self.state_guard();
            state.running = true;
            state.last_run_at = Some(started_at);
        }

        let result = self.run_pipeline(config, started_at).await;

        self.state_guard().running = false;
        result
    }

    /// 流水线：归档 -> 校验 -> 上传 -> 记录
    ///
    /// 无论在哪一阶段失败，本轮都恰好追加一条操作记录，之后的阶段不再执行。
    async fn run_pipeline(
        &self,
        config: &JobConfig,
        started_at: DateTime<Utc>,
    ) -> Result<OperationRecord> {
        let source = PathBuf::from(&config.source_path);
        let dest_dir = PathBuf::from(&config.local_dest_dir);

        info!("开始备份: {}", source.display());

        // 1. 归档（阻塞 IO，放到专用线程执行）
        let artifact = {
            let source = source.clone();
            let dest_dir = dest_dir.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                archive::create_archive(&source, &dest_dir, started_at)
            })
            .await?;

            match outcome {
                Ok(artifact) => artifact,
                Err(e) => {
                    error!("归档失败: {}", e);
                    let record = OperationRecord {
                        timestamp: started_at,
                        source_path: config.source_path.clone(),
                        artifact_path: String::new(),
                        artifact_size: 0,
                        checksum: String::new(),
                        remote_file_id: String::new(),
                        status: RunStatus::Failure,
                        message: e.to_string(),
                    };
                    self.history.append(&record)?;
                    return Err(e);
                }
            }
        };
        info!(
            "归档完成: {} ({} 字节)",
            artifact.path.display(),
            artifact.size_bytes
        );

        // 2. 计算校验和
        let checksum = {
            let path = artifact.path.clone();
            let outcome = tokio::task::spawn_blocking(move || hash::sha256_file(&path)).await?;

            match outcome {
                Ok(checksum) => checksum,
                Err(e) => {
                    error!("计算校验和失败: {}", e);
                    let record = OperationRecord {
                        timestamp: started_at,
                        source_path: config.source_path.clone(),
                        artifact_path: artifact.path.display().to_string(),
                        artifact_size: artifact.size_bytes,
                        checksum: String::new(),
                        remote_file_id: String::new(),
                        status: RunStatus::Failure,
                        message: e.to_string(),
                    };
                    self.history.append(&record)?;
                    return Err(e);
                }
            }
        };
        info!("校验和: sha256={}", checksum);

        // 3. 上传（单轮内不重试，失败交给下一轮定时备份）
        let remote_file_id = match self
            .remote
            .upload(&artifact.path, &config.remote_folder_id)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("上传失败: {}", e);
                let record = OperationRecord {
                    timestamp: started_at,
                    source_path: config.source_path.clone(),
                    artifact_path: artifact.path.display().to_string(),
                    artifact_size: artifact.size_bytes,
                    checksum: checksum.clone(),
                    remote_file_id: String::new(),
                    status: RunStatus::PartialFailure,
                    message: e.to_string(),
                };
                self.history.append(&record)?;
                return Err(e);
            }
        };

        // 4. 记录成功
        let record = OperationRecord {
            timestamp: started_at,
            source_path: config.source_path.clone(),
            artifact_path: artifact.path.display().to_string(),
            artifact_size: artifact.size_bytes,
            checksum,
            remote_file_id,
            status: RunStatus::Success,
            message: String::new(),
        };
        self.history.append(&record)?;

        info!("备份完成: {}", record.artifact_path);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};
    use tokio::sync::Notify;

    /// 可控的远端存储桩
    #[derive(Default)]
    struct MockRemote {
        auth_required: bool,
        fail_upload: bool,
        /// 设置后上传会阻塞到 notify_one 为止，用于制造在途备份
        gate: Option<Arc<Notify>>,
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl RemoteStore for MockRemote {
        async fn upload(&self, _local_path: &Path, _remote_folder_id: &str) -> Result<String> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.auth_required {
                return Err(BackupError::AuthRequired);
            }
            if self.fail_upload {
                return Err(BackupError::upload_failed("模拟网络故障"));
            }
            let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("remote-{n}"))
        }
    }

    struct Fixture {
        _source_dir: TempDir,
        work_dir: TempDir,
        config: JobConfig,
        scheduler: BackupScheduler,
    }

    fn fixture(remote: MockRemote) -> Fixture {
        let source_dir = tempdir().unwrap();
        let work_dir = tempdir().unwrap();

        let source = source_dir.path().join("data.bin");
        std::fs::write(&source, "0123456789").unwrap();

        let config = JobConfig {
            source_path: source.to_string_lossy().to_string(),
            local_dest_dir: work_dir.path().join("backups").to_string_lossy().to_string(),
            remote_folder_id: String::new(),
            interval_minutes: 1,
        };

        let history = OperationLog::new(work_dir.path().join("backup_log.csv"));
        let scheduler = BackupScheduler::new(Arc::new(remote), history);

        Fixture {
            _source_dir: source_dir,
            work_dir,
            config,
            scheduler,
        }
    }

    async fn wait_for_records(scheduler: &BackupScheduler, count: usize) -> Vec<OperationRecord> {
        for _ in 0..200 {
            let records = scheduler.history().unwrap();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("等待历史记录超时");
    }

    // 场景 A：单个小文件，全流程成功
    #[tokio::test]
    async fn test_run_once_success() {
        let f = fixture(MockRemote::default());

        let record = f.scheduler.run_once(&f.config).await.unwrap();

        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.checksum.len(), 64);
        assert_eq!(record.remote_file_id, "remote-1");
        assert_eq!(record.message, "");

        let artifact = PathBuf::from(&record.artifact_path);
        assert!(artifact.exists());
        assert_eq!(record.artifact_size, std::fs::metadata(&artifact).unwrap().len());

        let records = f.scheduler.history().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].remote_file_id, "remote-1");

        let state = f.scheduler.state();
        assert!(!state.running);
        assert!(!state.armed);
        assert!(state.last_run_at.is_some());
    }

    // 场景 B：备份源不存在，失败记录里所有产物字段为空
    #[tokio::test]
    async fn test_run_once_source_missing() {
        let mut f = fixture(MockRemote::default());
        f.config.source_path = f
            .work_dir
            .path()
            .join("no-such-source")
            .to_string_lossy()
            .to_string();

        let result = f.scheduler.run_once(&f.config).await;
        assert!(matches!(result, Err(BackupError::SourceNotFound(_))));

        // 没有产生任何压缩包
        assert!(!PathBuf::from(&f.config.local_dest_dir).exists());

        let records = f.scheduler.history().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::Failure);
        assert_eq!(records[0].artifact_path, "");
        assert_eq!(records[0].checksum, "");
        assert_eq!(records[0].remote_file_id, "");
        assert!(!records[0].message.is_empty());
    }

    // 场景 C：归档和校验成功，上传因未认证失败
    #[tokio::test]
    async fn test_run_once_auth_required_is_partial_failure() {
        let f = fixture(MockRemote {
            auth_required: true,
            ..Default::default()
        });

        let result = f.scheduler.run_once(&f.config).await;
        assert!(matches!(result, Err(BackupError::AuthRequired)));

        let records = f.scheduler.history().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::PartialFailure);
        assert_eq!(records[0].checksum.len(), 64);
        assert_eq!(records[0].remote_file_id, "");
        // 本地产物保留，由操作员决定去留
        assert!(PathBuf::from(&records[0].artifact_path).exists());
    }

    #[tokio::test]
    async fn test_run_once_upload_failure_is_partial_failure() {
        let f = fixture(MockRemote {
            fail_upload: true,
            ..Default::default()
        });

        let result = f.scheduler.run_once(&f.config).await;
        assert!(matches!(result, Err(BackupError::UploadFailed(_))));

        let records = f.scheduler.history().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::PartialFailure);
        assert!(records[0].message.contains("模拟网络故障"));
    }

    // 在途备份期间的手动触发被拒绝，且不会多写记录
    #[tokio::test]
    async fn test_run_once_while_running_is_rejected() {
        let gate = Arc::new(Notify::new());
        let f = fixture(MockRemote {
            gate: Some(gate.clone()),
            ..Default::default()
        });

        let scheduler = f.scheduler.clone();
        let config = f.config.clone();
        let first = tokio::spawn(async move { scheduler.run_once(&config).await });

        // 等首轮拿到互斥锁并卡在上传阶段
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(f.scheduler.state().running);

        let second = f.scheduler.run_once(&f.config).await;
        assert!(matches!(second, Err(BackupError::RunInProgress)));

        gate.notify_one();
        let record = first.await.unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Success);

        // 被拒绝的触发没有追加第二条记录
        let records = f.scheduler.history().unwrap();
        assert_eq!(records.len(), 1);
    }

    // 场景 D：定时触发撞上在途备份时跳过，窗口内只落一条记录
    #[tokio::test]
    async fn test_timer_skips_ticks_while_run_in_flight() {
        let gate = Arc::new(Notify::new());
        let f = fixture(MockRemote {
            gate: Some(gate.clone()),
            ..Default::default()
        });

        f.scheduler
            .start_with_period(f.config.clone(), Duration::from_millis(25))
            .unwrap();
        assert!(f.scheduler.state().armed);

        // 首轮立即触发并卡在上传，期间多个 tick 到期都应被跳过
        tokio::time::sleep(Duration::from_millis(150)).await;

        f.scheduler.stop().await;
        gate.notify_one();

        let records = wait_for_records(&f.scheduler, 1).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::Success);

        // 在途的那一轮收尾后回到空闲状态
        for _ in 0..200 {
            if !f.scheduler.state().running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let state = f.scheduler.state();
        assert!(!state.armed);
        assert!(!state.running);
        assert!(state.next_run_at.is_none());
    }

    // 重复 start 与空闲时 stop 都是安静的 no-op
    #[tokio::test]
    async fn test_start_twice_and_stop_idle_are_noops() {
        let gate = Arc::new(Notify::new());
        let f = fixture(MockRemote {
            gate: Some(gate.clone()),
            ..Default::default()
        });

        // 空闲时 stop 不改变状态
        f.scheduler.stop().await;
        assert!(!f.scheduler.state().armed);

        f.scheduler
            .start_with_period(f.config.clone(), Duration::from_millis(50))
            .unwrap();
        f.scheduler
            .start_with_period(f.config.clone(), Duration::from_millis(50))
            .unwrap();
        assert!(f.scheduler.state().armed);

        // 让首轮先触发并卡在上传，再停止
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.scheduler.stop().await;
        gate.notify_one();

        let records = wait_for_records(&f.scheduler, 1).await;
        // 只有第一个定时器在跑，窗口内恰好一条记录
        assert_eq!(records.len(), 1);
        assert!(!f.scheduler.state().armed);
    }

    // 手动触发在 Armed 状态下同样可用，完成后保持 Armed
    #[tokio::test]
    async fn test_run_once_while_armed_keeps_armed() {
        let f = fixture(MockRemote::default());

        // 间隔放大到分钟级，首轮立即触发后定时器长期静默
        f.scheduler
            .start_with_period(f.config.clone(), Duration::from_secs(600))
            .unwrap();

        let records = wait_for_records(&f.scheduler, 1).await;
        assert_eq!(records.len(), 1);

        // 首轮可能尚未释放互斥锁，碰到 RunInProgress 就稍后重试
        let record = loop {
            match f.scheduler.run_once(&f.config).await {
                Err(BackupError::RunInProgress) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                other => break other.unwrap(),
            }
        };
        assert_eq!(record.status, RunStatus::Success);
        assert!(f.scheduler.state().armed);

        f.scheduler.stop().await;
        let records = f.scheduler.history().unwrap();
        assert_eq!(records.len(), 2);
    }
}
