//! 状态投影：状态变更事件、转换记录与对外状态快照
//!
//! 状态机内部持有完整的 TaskRun；对外（广播订阅者、status 指令、诊断）只暴露这些轻量、可序列化的投影。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::recovery::ErrorStats;
use crate::tasks::{TaskContext, TaskKind};

/// 每次状态转换广播的事件
#[derive(Clone, Debug, Serialize)]
pub struct StateChange {
    pub from: TaskKind,
    pub to: TaskKind,
    pub context: TaskContext,
    pub generation: u64,
}

/// 转换历史中的一条记录（仅用于诊断）
#[derive(Clone, Debug, Serialize)]
pub struct TransitionRecord {
    pub from: TaskKind,
    pub to: TaskKind,
    pub context: TaskContext,
    pub timestamp: DateTime<Utc>,
    pub generation: u64,
}

/// BotContext::status() 返回的快照
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub current_state: TaskKind,
    pub busy: bool,
    pub context: TaskContext,
    pub generation: u64,
    pub error_stats: ErrorStats,
}
