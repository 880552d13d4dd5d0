//! 错误恢复协调器
//!
//! 所有失败（指令体、任务体、分发边界的校验失败）都汇入 [`RecoveryCoordinator::handle`]：
//! 归一化 → 计数 → 日志与聊天提示 → 有限次自动恢复 → 打断状态机回到 idle。
//! 处理流程本身出错时执行紧急清理，并吞掉之后的所有错误。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::RecoverySection;
use crate::core::error::{BotError, ErrorKind};
use crate::core::state_machine::{TaskFailureHandler, TaskStateMachine};
use crate::tasks::TaskKind;
use crate::world::GameClient;

/// 各错误类别的恢复动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// 停止移动并暂停一段时间
    StopAndPause,
    /// 停止移动并重置移动参数
    StopAndResetMovements,
    /// 关闭打开的容器窗口
    CloseWindow,
    StopMovement,
}

impl RecoveryStrategy {
    pub fn for_kind(kind: ErrorKind) -> Option<Self> {
        match kind {
            ErrorKind::Movement => Some(RecoveryStrategy::StopAndPause),
            ErrorKind::Pathfinding => Some(RecoveryStrategy::StopAndResetMovements),
            ErrorKind::Inventory => Some(RecoveryStrategy::CloseWindow),
            ErrorKind::Timeout => Some(RecoveryStrategy::StopMovement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HandleOptions {
    /// 不发送聊天提示
    pub silent: bool,
    pub skip_recovery: bool,
    /// 出错的任务运行；状态机已进入新的运行时跳过恢复动作与打断
    pub generation: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    NotAttempted,
    Recovered { attempt: u32 },
    /// 恢复动作本身失败
    Failed { attempt: u32 },
    /// 超过尝试上限，静默放弃
    Exhausted,
}

/// 一次 handle 的结果
#[derive(Debug, Clone)]
pub struct HandleReport {
    pub error: BotError,
    pub recovery: RecoveryOutcome,
    /// 是否打断了正在运行的任务
    pub interrupted: bool,
    /// 是否走了紧急清理
    pub emergency: bool,
}

/// 错误统计（status 快照的一部分）
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorStats {
    pub total: u64,
    pub by_kind: BTreeMap<String, u64>,
    pub emergency_cleanups: u64,
}

type ErrorKey = (ErrorKind, String);

#[derive(Debug)]
struct Attempts {
    count: u32,
    last: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    occurrences: HashMap<ErrorKey, u64>,
    attempts: HashMap<ErrorKey, Attempts>,
    stats: ErrorStats,
}

pub struct RecoveryCoordinator {
    client: Arc<dyn GameClient>,
    machine: Arc<TaskStateMachine>,
    config: RecoverySection,
    counters: Mutex<Counters>,
}

impl RecoveryCoordinator {
    pub fn new(
        client: Arc<dyn GameClient>,
        machine: Arc<TaskStateMachine>,
        config: RecoverySection,
    ) -> Self {
        Self {
            client,
            machine,
            config,
            counters: Mutex::new(Counters::default()),
        }
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.counters().stats.clone()
    }

    /// 处理一个错误；context 标识错误来源（如 `command:goto`、`task:mining`）
    pub async fn handle(
        &self,
        error: impl Into<anyhow::Error>,
        context: &str,
        options: HandleOptions,
    ) -> HandleReport {
        let error = BotError::normalize(error.into());
        match self.process(&error, context, options).await {
            Ok((recovery, interrupted)) => HandleReport {
                error,
                recovery,
                interrupted,
                emergency: false,
            },
            Err(e) => {
                tracing::error!(error_id = %error.id, handler_error = %e, "Error handler failed, running emergency cleanup");
                self.emergency_cleanup().await;
                HandleReport {
                    error,
                    recovery: RecoveryOutcome::NotAttempted,
                    interrupted: true,
                    emergency: true,
                }
            }
        }
    }

    async fn process(
        &self,
        error: &BotError,
        context: &str,
        options: HandleOptions,
    ) -> anyhow::Result<(RecoveryOutcome, bool)> {
        let key = (error.kind, context.to_string());
        let occurrences = {
            let mut counters = self.counters();
            counters.stats.total += 1;
            *counters
                .stats
                .by_kind
                .entry(error.kind.as_str().to_string())
                .or_default() += 1;
            let n = counters.occurrences.entry(key.clone()).or_default();
            *n += 1;
            *n
        };
        if occurrences > self.config.recurrence_warn_threshold {
            tracing::warn!(kind = %error.kind, context, occurrences, "Error keeps recurring");
        }

        let input_rejection = error.kind.is_input_rejection();
        if input_rejection {
            tracing::info!(context, data = %error.log_data(), "Input rejected");
        } else {
            tracing::error!(context, data = %error.log_data(), "Handled error");
        }

        if !options.silent {
            self.client.chat(&error.user_message()).await?;
        }

        let recovery = if error.recoverable() && !options.skip_recovery && !input_rejection {
            self.recover(error, key, options.generation).await?
        } else {
            RecoveryOutcome::NotAttempted
        };

        let interrupted = match (input_rejection, options.generation) {
            (true, _) => false,
            (false, Some(generation)) => self.machine.interrupt_if(generation, "error").await?,
            (false, None) => self.machine.interrupt("error").await?,
        };
        Ok((recovery, interrupted))
    }

    /// 出错的运行已被 stop 或新指令替换
    fn superseded(&self, generation: Option<u64>) -> bool {
        generation.is_some_and(|g| self.machine.generation() != g)
    }

    /// 同一 (kind, context) 在 attempt_reset_secs 内最多尝试 max_attempts 次，第 n 次之前退避 base * 2^(n-1)
    async fn recover(
        &self,
        error: &BotError,
        key: ErrorKey,
        generation: Option<u64>,
    ) -> anyhow::Result<RecoveryOutcome> {
        let Some(strategy) = RecoveryStrategy::for_kind(error.kind) else {
            return Ok(RecoveryOutcome::NotAttempted);
        };
        if self.superseded(generation) {
            tracing::debug!(kind = %error.kind, "Failed run already replaced, skipping recovery");
            return Ok(RecoveryOutcome::NotAttempted);
        }

        let attempt = {
            let now = Instant::now();
            let reset_after = Duration::from_secs(self.config.attempt_reset_secs);
            let mut counters = self.counters();
            let entry = counters.attempts.entry(key).or_insert(Attempts {
                count: 0,
                last: now,
            });
            if now.duration_since(entry.last) > reset_after {
                entry.count = 0;
            }
            entry.count += 1;
            entry.last = now;
            entry.count
        };
        if attempt > self.config.max_attempts {
            tracing::warn!(kind = %error.kind, attempt, "Recovery attempts exhausted, giving up");
            return Ok(RecoveryOutcome::Exhausted);
        }

        let backoff = self.config.base_backoff_ms.saturating_mul(1 << (attempt - 1).min(16));
        tokio::time::sleep(Duration::from_millis(backoff)).await;
        if self.superseded(generation) {
            tracing::debug!(kind = %error.kind, attempt, "Failed run replaced during backoff, skipping recovery");
            return Ok(RecoveryOutcome::NotAttempted);
        }

        if let Err(e) = self.apply(strategy).await {
            tracing::warn!(?strategy, attempt, error = %e, "Recovery strategy failed");
            return Ok(RecoveryOutcome::Failed { attempt });
        }
        tracing::info!(?strategy, attempt, "Recovery strategy applied");
        self.client.chat("🔄 Attempting automatic recovery...").await?;
        Ok(RecoveryOutcome::Recovered { attempt })
    }

    async fn apply(&self, strategy: RecoveryStrategy) -> anyhow::Result<()> {
        match strategy {
            RecoveryStrategy::StopAndPause => {
                self.client.stop_movement().await?;
                tokio::time::sleep(Duration::from_millis(self.config.movement_pause_ms)).await;
            }
            RecoveryStrategy::StopAndResetMovements => {
                self.client.stop_movement().await?;
                self.client.reset_movements().await?;
            }
            RecoveryStrategy::CloseWindow => self.client.close_window().await?,
            RecoveryStrategy::StopMovement => self.client.stop_movement().await?,
        }
        Ok(())
    }

    /// 尽力而为：停止移动、通知、回到 idle；任何一步失败都忽略
    async fn emergency_cleanup(&self) {
        self.counters().stats.emergency_cleanups += 1;
        if let Err(e) = self.client.stop_movement().await {
            tracing::debug!(error = %e, "Emergency stop failed");
        }
        if let Err(e) = self
            .client
            .chat("⚠️ A critical error occurred. Stopping all actions.")
            .await
        {
            tracing::debug!(error = %e, "Emergency notice failed");
        }
        if let Err(e) = self.machine.interrupt("emergency").await {
            tracing::debug!(error = %e, "Emergency interrupt failed");
        }
    }
}

#[async_trait]
impl TaskFailureHandler for RecoveryCoordinator {
    async fn handle_task_failure(&self, error: anyhow::Error, task: TaskKind, generation: u64) {
        let context = format!("task:{task}");
        let options = HandleOptions {
            generation: Some(generation),
            ..HandleOptions::default()
        };
        self.handle(error, &context, options).await;
    }
}
