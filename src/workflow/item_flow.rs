//! 条目处理流程 - 流程层
//!
//! 核心职责：定义"一个请求"的完整处理流程
//!
//! 流程顺序：
//! 1. 回答（已记录则直接使用历史结果）
//! 2. 回答为空 → 记为失败，结束
//! 3. 保存（已记录则直接使用历史结果）
//!
//! 每次外部调用前后都写入历史检查点。外部调用的错误和 panic 都在本层转换为
//! `ItemOutcome::Failed`，只有检查点写入失败才会以 `Err` 返回。

use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{AnswerResult, Record};
use crate::services::{AnswerService, SaveService};
use crate::workflow::history::{AnswerOutcome, HistoryEvent, HistoryStore, SaveOutcome};
use crate::workflow::item_ctx::ItemCtx;
use crate::workflow::replay::{ItemHistory, SaveTicket};
use crate::workflow::replay_log::ReplaySafeLogger;

/// 失败发生的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Answer,
    Save,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Answer => f.write_str("回答"),
            Stage::Save => f.write_str("保存"),
        }
    }
}

/// 条目处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// 已保存
    Saved { index: usize, record: Record },
    /// 没有可用回答，未尝试保存
    NoAnswer { index: usize },
    /// 记录不完整，保存被拒绝
    Rejected { index: usize },
    /// 外部调用失败
    Failed {
        index: usize,
        stage: Stage,
        error: String,
    },
}

impl ItemOutcome {
    pub fn index(&self) -> usize {
        match self {
            ItemOutcome::Saved { index, .. }
            | ItemOutcome::NoAnswer { index }
            | ItemOutcome::Rejected { index }
            | ItemOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, ItemOutcome::Saved { .. })
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            ItemOutcome::Saved { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// 单个条目一次执行的结果
#[derive(Debug, Clone)]
pub struct ItemRun {
    pub outcome: ItemOutcome,
    /// 从历史中取得、没有再次调用的步骤数
    pub replayed_steps: usize,
    /// 本次实际调用的步骤数
    pub live_steps: usize,
}

/// 条目处理流程
///
/// - 编排单个条目的回答 → 保存
/// - 决定哪个步骤使用历史、哪个步骤实际调用
/// - 不遍历批次，不关心实例状态
#[derive(Clone)]
pub struct ItemFlow {
    history: Arc<dyn HistoryStore>,
    answer_service: AnswerService,
    save_service: SaveService,
}

impl ItemFlow {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        answer_service: AnswerService,
        save_service: SaveService,
    ) -> Self {
        Self {
            history,
            answer_service,
            save_service,
        }
    }

    pub async fn run(&self, ctx: &ItemCtx, request: &str, recorded: ItemHistory) -> AppResult<ItemRun> {
        let mut replayed_steps = 0;
        let mut live_steps = 0;

        // ========== 步骤 1: 回答 ==========
        let (answer, answer_replayed) = match recorded.answer.clone() {
            Some(outcome) => {
                replayed_steps += 1;
                (outcome, true)
            }
            None => {
                live_steps += 1;
                (self.answer_live(ctx, request, recorded.answer_scheduled).await?, false)
            }
        };

        let response = match answer {
            AnswerOutcome::Answered(response) => response,
            AnswerOutcome::NoContent => {
                ReplaySafeLogger::new(answer_replayed).error(
                    ctx,
                    format!("处理请求 [{}] 失败：模型没有返回内容", request),
                );
                return Ok(ItemRun {
                    outcome: ItemOutcome::NoAnswer { index: ctx.index },
                    replayed_steps,
                    live_steps,
                });
            }
            AnswerOutcome::Failed(error) => {
                ReplaySafeLogger::new(answer_replayed).error(
                    ctx,
                    format!(
                        "处理请求 [{}] 时发生异常 ({}): [{}]",
                        request,
                        Stage::Answer,
                        error
                    ),
                );
                return Ok(ItemRun {
                    outcome: ItemOutcome::Failed {
                        index: ctx.index,
                        stage: Stage::Answer,
                        error,
                    },
                    replayed_steps,
                    live_steps,
                });
            }
        };

        // ========== 步骤 2: 保存 ==========
        let (saved, save_replayed) = match recorded.save.clone() {
            Some(outcome) => {
                replayed_steps += 1;
                (outcome, true)
            }
            None => {
                live_steps += 1;
                let answer = AnswerResult::new(request, response);
                (self.save_live(ctx, answer, recorded.save_ticket.clone()).await?, false)
            }
        };

        let log = ReplaySafeLogger::new(save_replayed);
        let outcome = match saved {
            SaveOutcome::Saved(record) => {
                log.info(
                    ctx,
                    format!("✓ 已保存记录 [{}]（请求: {}）", record.id, ctx.request_preview),
                );
                ItemOutcome::Saved {
                    index: ctx.index,
                    record,
                }
            }
            SaveOutcome::Rejected => {
                log.warn(
                    ctx,
                    format!("⚠️ 请求 [{}] 的记录不完整，未保存", request),
                );
                ItemOutcome::Rejected { index: ctx.index }
            }
            SaveOutcome::Failed(error) => {
                log.error(
                    ctx,
                    format!(
                        "处理请求 [{}] 时发生异常 ({}): [{}]",
                        request,
                        Stage::Save,
                        error
                    ),
                );
                ItemOutcome::Failed {
                    index: ctx.index,
                    stage: Stage::Save,
                    error,
                }
            }
        };

        Ok(ItemRun {
            outcome,
            replayed_steps,
            live_steps,
        })
    }

    /// 实际调用回答服务，前后写入检查点
    async fn answer_live(
        &self,
        ctx: &ItemCtx,
        request: &str,
        was_in_flight: bool,
    ) -> AppResult<AnswerOutcome> {
        if was_in_flight {
            tracing::info!("{} 回答调用在中断时未完成，重新调用", ctx);
        } else {
            self.checkpoint(ctx, HistoryEvent::AnswerScheduled { index: ctx.index })
                .await?;
        }

        let outcome = match guarded(self.answer_service.answer(request)).await {
            Ok(Some(text)) => AnswerOutcome::Answered(text),
            Ok(None) => AnswerOutcome::NoContent,
            Err(detail) => AnswerOutcome::Failed(detail),
        };

        self.checkpoint(
            ctx,
            HistoryEvent::AnswerCompleted {
                index: ctx.index,
                outcome: outcome.clone(),
            },
        )
        .await?;

        Ok(outcome)
    }

    /// 实际调用保存服务，前后写入检查点
    ///
    /// 中断时仍在进行的保存沿用已记录的标识，"不存在则创建"保证只有一条记录
    async fn save_live(
        &self,
        ctx: &ItemCtx,
        answer: AnswerResult,
        recorded_ticket: Option<SaveTicket>,
    ) -> AppResult<SaveOutcome> {
        let ticket = match recorded_ticket {
            Some(ticket) => {
                tracing::info!(
                    "{} 保存调用在中断时未完成，沿用记录标识 [{}] 重新调用",
                    ctx,
                    ticket.record_id
                );
                ticket
            }
            None => {
                let ticket = SaveTicket::generate();
                self.checkpoint(
                    ctx,
                    HistoryEvent::SaveScheduled {
                        index: ctx.index,
                        record_id: ticket.record_id.clone(),
                        created_utc: ticket.created_utc,
                    },
                )
                .await?;
                ticket
            }
        };

        let outcome = match guarded(self.save_service.save(
            answer,
            &ticket.record_id,
            ticket.created_utc,
        ))
        .await
        {
            Ok(Some(record)) => SaveOutcome::Saved(record),
            Ok(None) => SaveOutcome::Rejected,
            Err(detail) => SaveOutcome::Failed(detail),
        };

        self.checkpoint(
            ctx,
            HistoryEvent::SaveCompleted {
                index: ctx.index,
                outcome: outcome.clone(),
            },
        )
        .await?;

        Ok(outcome)
    }

    async fn checkpoint(&self, ctx: &ItemCtx, event: HistoryEvent) -> AppResult<()> {
        self.history.append(&ctx.instance_id, &event).await
    }
}

/// 执行一次外部调用，把错误和 panic 都转换为错误描述
async fn guarded<T, F>(call: F) -> Result<T, String>
where
    F: Future<Output = AppResult<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panic: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知 panic".to_string()
    }
}
