//! 实例调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **创建实例**：为批次分配新标识，并在返回前把 `InstanceStarted` 写入历史
//! 2. **发现未完成实例**：进程重启后从历史中找出需要恢复的实例
//! 3. **并发控制**：每个实例一个 tokio 任务，用 Semaphore 限制同时运行的实例数
//!
//! 实例之间不共享可变状态；同一实例内部的条目始终顺序执行。

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::error::AppResult;
use crate::models::Batch;
use crate::orchestrator::controller::{BatchOutcome, OrchestrationController};
use crate::workflow::{HistoryEvent, HistoryStore, InstanceId, ReplayState};

/// 一轮执行的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// 到达 Completed 的实例
    pub completed: usize,
    /// 因检查点失败等原因未能完成的实例（下次启动时恢复）
    pub suspended: usize,
    /// 保存成功的条目
    pub saved: usize,
    /// 失败的条目
    pub failed: usize,
}

impl RunStats {
    fn record(&mut self, outcome: &BatchOutcome) {
        self.completed += 1;
        self.saved += outcome.saved();
        self.failed += outcome.failed();
    }
}

/// 实例调度器
#[derive(Clone)]
pub struct InstanceScheduler {
    history: Arc<dyn HistoryStore>,
    controller: OrchestrationController,
    max_concurrent_instances: usize,
}

impl InstanceScheduler {
    pub fn new(controller: OrchestrationController, max_concurrent_instances: usize) -> Self {
        Self {
            history: controller.history().clone(),
            controller,
            max_concurrent_instances: max_concurrent_instances.max(1),
        }
    }

    pub fn controller(&self) -> &OrchestrationController {
        &self.controller
    }

    /// 为批次创建一个新实例
    ///
    /// 返回时实例已经持久化，即使进程立刻退出也能在重启后恢复
    pub async fn schedule_new_instance(&self, batch: Batch) -> AppResult<InstanceId> {
        let instance_id = InstanceId::generate();
        self.history
            .append(
                &instance_id,
                &HistoryEvent::InstanceStarted {
                    batch,
                    scheduled_utc: Utc::now(),
                },
            )
            .await?;
        Ok(instance_id)
    }

    /// 列出历史中尚未完成的实例
    ///
    /// 历史无法读取或无法回放的实例会记录错误并跳过，不影响其他实例
    pub async fn pending_instances(&self) -> AppResult<Vec<InstanceId>> {
        let mut pending = Vec::new();
        for instance_id in self.history.list_instances().await? {
            let events = match self.history.load(&instance_id).await {
                Ok(events) => events,
                Err(e) => {
                    error!("[实例 {}] ❌ 历史无法读取，跳过: {}", instance_id, e);
                    continue;
                }
            };
            match ReplayState::from_events(&instance_id, &events) {
                Ok(state) if !state.is_completed() => pending.push(instance_id),
                Ok(_) => {}
                Err(e) => error!("[实例 {}] ❌ 历史无法回放，跳过: {}", instance_id, e),
            }
        }
        Ok(pending)
    }

    /// 执行单个实例
    pub async fn run_instance(&self, instance_id: &InstanceId) -> AppResult<BatchOutcome> {
        self.controller.run(instance_id).await
    }

    /// 并发执行一组实例
    pub async fn run_instances(&self, instance_ids: Vec<InstanceId>) -> RunStats {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_instances));
        let mut handles = Vec::with_capacity(instance_ids.len());

        for instance_id in instance_ids {
            let semaphore = semaphore.clone();
            let controller = self.controller.clone();
            let task_instance_id = instance_id.clone();

            let handle = tokio::spawn(async move {
                // Semaphore 不会被关闭
                let _permit = semaphore.acquire_owned().await.ok();
                controller.run(&task_instance_id).await
            });
            handles.push((instance_id, handle));
        }

        let mut stats = RunStats::default();
        for (instance_id, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => stats.record(&outcome),
                Ok(Err(e)) => {
                    error!(
                        "[实例 {}] ❌ 执行中断，将在下次启动时恢复: {}",
                        instance_id, e
                    );
                    stats.suspended += 1;
                }
                Err(e) => {
                    error!("[实例 {}] ❌ 任务执行失败: {}", instance_id, e);
                    stats.suspended += 1;
                }
            }
        }

        info!(
            "📦 本轮实例: 完成 {}, 挂起 {}",
            stats.completed, stats.suspended
        );

        stats
    }
}
