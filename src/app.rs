//! 应用 - 顶层编排
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建存储、补全后端和调度器
//! 2. **接收文档**：扫描输入目录中的 `*.json` 文档，每个文档一个实例
//! 3. **恢复与运行**：运行所有未完成的实例（包括上次启动遗留的实例）
//! 4. **全局统计**：汇总所有实例的处理结果

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::orchestrator::{BatchIntake, InstanceScheduler, OrchestrationController, RunStats};
use crate::services::{
    AnswerService, FileRecordStore, OpenAiCompletionBackend, SaveService, StoreLocation,
};
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::{FileHistoryStore, InstanceId};

/// 应用主结构
pub struct App {
    config: Config,
    scheduler: InstanceScheduler,
    intake: BatchIntake,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate().context("配置校验失败")?;

        log_startup(
            &config.chat_model_deployment_name,
            config.max_concurrent_instances,
        );

        let history = Arc::new(FileHistoryStore::from_config(&config));
        let store = Arc::new(FileRecordStore::from_config(&config));
        let backend = Arc::new(OpenAiCompletionBackend::new(&config));

        let controller = OrchestrationController::new(
            history,
            AnswerService::new(backend),
            SaveService::new(store, StoreLocation::from_config(&config)),
        );
        let scheduler = InstanceScheduler::new(controller, config.max_concurrent_instances);
        let intake = BatchIntake::new(scheduler.clone());

        Ok(Self {
            config,
            scheduler,
            intake,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        // 接收所有待处理的文档
        let scheduled = self.ingest_inputs().await?;
        info!("✓ 本次接收 {} 个新实例", scheduled.len());

        // 新实例和上次遗留的实例都还没有完成
        let pending = self
            .scheduler
            .pending_instances()
            .await
            .context("无法读取执行历史")?;

        if pending.is_empty() {
            warn!("⚠️ 没有需要处理的实例，程序结束");
            return Ok(RunStats::default());
        }

        let resumed = pending.iter().filter(|id| !scheduled.contains(id)).count();
        if resumed > 0 {
            info!("🔁 发现 {} 个未完成的实例，恢复执行", resumed);
        }

        let stats = self.scheduler.run_instances(pending).await;

        print_final_stats(stats.completed, stats.suspended, stats.saved, stats.failed);

        Ok(stats)
    }

    /// 扫描输入目录并接收每个文档
    async fn ingest_inputs(&self) -> Result<Vec<InstanceId>> {
        info!("\n📁 正在扫描待处理的文档...");

        let mut scheduled = Vec::new();
        for path in list_input_files(Path::new(&self.config.input_folder)).await? {
            let name = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();

            let bytes = fs::read(&path)
                .await
                .with_context(|| format!("无法读取文档: {}", path.display()))?;

            // 接收失败已经记录日志
            if let Ok(instance_id) = self.intake.ingest(&name, &bytes).await {
                scheduled.push(instance_id);
            }

            self.cleanup_file(&path).await?;
        }

        Ok(scheduled)
    }

    /// 清理已接收的文档
    async fn cleanup_file(&self, path: &Path) -> Result<()> {
        if !self.config.remove_processed_inputs {
            return Ok(());
        }
        fs::remove_file(path)
            .await
            .with_context(|| format!("无法删除文件: {}", path.display()))?;
        info!(
            "🗑️ 文档已删除: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        Ok(())
    }
}

/// 列出目录中的 `*.json` 文档（按文件名排序）
async fn list_input_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let exists = fs::try_exists(folder)
        .await
        .with_context(|| format!("无法访问输入目录: {}", folder.display()))?;
    if !exists {
        warn!("⚠️ 输入目录不存在: {}", folder.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_input_files_only_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = list_input_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn test_missing_input_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = list_input_files(&dir.path().join("absent")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_input_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, "x").unwrap();

        assert!(list_input_files(&file.join("input")).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_inputs_schedule_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("empty.json"), "").unwrap();
        std::fs::write(input.join("broken.json"), "{not json").unwrap();

        let config = Config {
            input_folder: input.display().to_string(),
            history_dir: dir.path().join("history").display().to_string(),
            store_root: dir.path().join("store").display().to_string(),
            ..Config::default()
        };

        let app = App::initialize(config).unwrap();
        let stats = app.run().await.unwrap();

        assert_eq!(stats, RunStats::default());
        assert!(!input.join("empty.json").exists());
        assert!(!dir.path().join("history").exists());
    }
}
