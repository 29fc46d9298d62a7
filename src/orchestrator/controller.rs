//! 编排控制器 - 编排层
//!
//! ## 职责
//!
//! 驱动一个实例从开始到完成：Validating → Running → Completed。
//!
//! ## 核心功能
//!
//! 1. **校验**：从历史中取出批次并校验，无效批次直接完成
//! 2. **遍历条目**：按原始顺序逐项执行，不并行
//! 3. **失败隔离**：单个条目失败只记录日志，不中止批次
//! 4. **确定性回放**：每次都从历史开头重新执行决策逻辑，已完成的步骤不再调用
//!
//! 批次级别没有失败状态：只要能写入检查点，实例总会到达 Completed。

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::AppResult;
use crate::services::{AnswerService, SaveService};
use crate::workflow::{
    HistoryEvent, HistoryStore, InstanceId, ItemCtx, ItemFlow, ItemOutcome, ReplaySafeLogger,
    ReplayState, WorkflowInstance, WorkflowState,
};

/// 一次执行的批次结果
///
/// 只用于日志和测试，不持久化
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub instance_id: InstanceId,
    pub state: WorkflowState,
    pub items: Vec<ItemOutcome>,
    /// 从历史取得的步骤数
    pub replayed_steps: usize,
    /// 本次实际调用的步骤数
    pub live_steps: usize,
}

impl BatchOutcome {
    fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            state: WorkflowState::Validating,
            items: Vec::new(),
            replayed_steps: 0,
            live_steps: 0,
        }
    }

    pub fn attempted(&self) -> usize {
        self.items.len()
    }

    pub fn saved(&self) -> usize {
        self.items.iter().filter(|item| item.is_saved()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.saved()
    }
}

/// 编排控制器
#[derive(Clone)]
pub struct OrchestrationController {
    history: Arc<dyn HistoryStore>,
    item_flow: ItemFlow,
}

impl OrchestrationController {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        answer_service: AnswerService,
        save_service: SaveService,
    ) -> Self {
        let item_flow = ItemFlow::new(history.clone(), answer_service, save_service);
        Self { history, item_flow }
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// 执行（或恢复执行）一个实例
    ///
    /// 只有读取或写入历史失败时返回 `Err`；此时实例保持未完成，可以稍后再次执行
    pub async fn run(&self, instance_id: &InstanceId) -> AppResult<BatchOutcome> {
        let events = self.history.load(instance_id).await?;
        let replay = ReplayState::from_events(instance_id, &events)?;

        let mut instance = WorkflowInstance::new(instance_id.clone(), replay.batch().clone());
        let mut outcome = BatchOutcome::new(instance_id.clone());
        // 整个实例已经完成时，所有日志都是重复的
        let instance_log = ReplaySafeLogger::new(replay.is_completed());
        let prefix = format!("[实例 {}]", instance_id);

        // ========== Validating ==========
        if !instance.batch().is_valid() {
            instance_log.error(&prefix, "收到无效批次，不处理任何条目");
            self.complete(&mut instance, &replay).await?;
            outcome.state = instance.state();
            return Ok(outcome);
        }

        // ========== Running ==========
        instance.start_running();
        let total = instance.batch().len();
        let resume_index = replay.resume_index();

        if replay.is_completed() {
            instance_log.info(&prefix, "实例已完成，仅回放历史");
        } else if resume_index > 0 || replay.item(resume_index).has_in_flight_step() {
            info!(
                "{} ▶️ 从第 {}/{} 项恢复执行（前 {} 项已在历史中，共 {} 个已记录步骤）",
                prefix,
                resume_index + 1,
                total,
                resume_index,
                replay.recorded_steps()
            );
            if replay.item(resume_index).has_in_flight_step() {
                info!(
                    "{} 第 {} 项在中断时有未完成的调用，将重新调用",
                    prefix,
                    resume_index + 1
                );
            }
        } else {
            info!("{} 开始处理，共 {} 项", prefix, total);
        }

        while let Some((index, request)) = instance.current() {
            let ctx = ItemCtx::new(instance_id.clone(), index, total, request);
            let run = self.item_flow.run(&ctx, request, replay.item(index)).await?;

            outcome.replayed_steps += run.replayed_steps;
            outcome.live_steps += run.live_steps;
            outcome.items.push(run.outcome);
            instance.advance();
        }

        // ========== Completed ==========
        self.complete(&mut instance, &replay).await?;
        outcome.state = instance.state();

        instance_log.info(
            &prefix,
            format!(
                "✅ 实例完成: 保存 {}, 失败 {}, 总计 {}",
                outcome.saved(),
                outcome.failed(),
                outcome.attempted()
            ),
        );

        Ok(outcome)
    }

    async fn complete(&self, instance: &mut WorkflowInstance, replay: &ReplayState) -> AppResult<()> {
        if !replay.is_completed() {
            self.history
                .append(
                    instance.id(),
                    &HistoryEvent::InstanceCompleted {
                        completed_utc: Utc::now(),
                    },
                )
                .await?;
        }
        instance.complete();
        Ok(())
    }
}
