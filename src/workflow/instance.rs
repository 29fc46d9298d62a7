//! 工作流实例
//!
//! 一个实例 = 对一个批次的一次可持久、可独立调度的执行

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use crate::models::Batch;

/// 实例标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// 生成新的实例标识
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 实例状态：Validating → Running → Completed
///
/// 批次级别没有 Failed 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Validating,
    Running,
    Completed,
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowState::Validating => "Validating",
            WorkflowState::Running => "Running",
            WorkflowState::Completed => "Completed",
        };
        f.write_str(name)
    }
}

/// 工作流实例
///
/// 只由编排控制器推进
#[derive(Debug, Clone)]
pub struct WorkflowInstance {
    id: InstanceId,
    batch: Batch,
    state: WorkflowState,
    cursor: usize,
}

impl WorkflowInstance {
    pub fn new(id: InstanceId, batch: Batch) -> Self {
        Self {
            id,
            batch,
            state: WorkflowState::Validating,
            cursor: 0,
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn start_running(&mut self) {
        if self.state == WorkflowState::Validating {
            self.state = WorkflowState::Running;
        }
    }

    pub fn complete(&mut self) {
        self.state = WorkflowState::Completed;
    }

    /// 当前条目（索引, 请求）；全部尝试完毕或不在 Running 状态时返回 None
    pub fn current(&self) -> Option<(usize, &str)> {
        if self.state != WorkflowState::Running {
            return None;
        }
        self.batch
            .requests()
            .get(self.cursor)
            .map(|request| (self.cursor, request.as_str()))
    }

    /// 标记当前条目已尝试
    pub fn advance(&mut self) {
        if self.cursor < self.batch.len() {
            self.cursor += 1;
        }
    }
}
