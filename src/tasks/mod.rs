//! 任务状态：封闭的 TaskKind 枚举 + 每种状态一个 TaskBehavior 实现
//!
//! 状态机持有 `TaskKind -> Arc<dyn TaskBehavior>` 能力表；行为提供允许指令表、后台任务体、
//! exit 清理钩子与 interrupt 钩子。任务上下文（目标坐标、方块名与数量等）随状态一起保存。

pub mod building;
pub mod collecting;
pub mod following;
pub mod idle;
pub mod mining;
pub mod moving;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AppConfig;
use crate::core::InterruptFlag;
use crate::world::{BlockPos, GameClient};

pub use building::BuildingTask;
pub use collecting::CollectingTask;
pub use following::FollowingTask;
pub use idle::IdleTask;
pub use mining::MiningTask;
pub use moving::MovingTask;

/// 任意任务状态下都允许执行的指令
pub const ALWAYS_ALLOWED: &[&str] = &["stop", "help", "pos", "health", "status"];

/// 任务状态标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Idle,
    Moving,
    Mining,
    Building,
    Following,
    Collecting,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Idle => "idle",
            TaskKind::Moving => "moving",
            TaskKind::Mining => "mining",
            TaskKind::Building => "building",
            TaskKind::Following => "following",
            TaskKind::Collecting => "collecting",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(TaskKind::Idle),
            "moving" => Ok(TaskKind::Moving),
            "mining" => Ok(TaskKind::Mining),
            "building" => Ok(TaskKind::Building),
            "following" => Ok(TaskKind::Following),
            "collecting" => Ok(TaskKind::Collecting),
            other => Err(format!("Unknown state: {other}")),
        }
    }
}

/// 可建造的结构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Structure {
    Tower,
}

impl Structure {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tower" | "塔" => Some(Structure::Tower),
            _ => None,
        }
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Structure::Tower => f.write_str("tower"),
        }
    }
}

/// 任务上下文
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskContext {
    #[default]
    None,
    Goto { goal: BlockPos },
    Mine { block: String, count: u32 },
    Build { structure: Structure, size: u32 },
    Follow { target: String },
    Collect { item: Option<String> },
}

/// 任务体使用的节奏与搜索参数（来自 [limits] 与 [timeouts]）
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub dig_delay: Duration,
    pub build_step_delay: Duration,
    pub item_collect_delay: Duration,
    pub max_mine_distance: u32,
    pub item_collect_radius: u32,
    pub follow_range: f64,
}

impl TaskSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            dig_delay: Duration::from_millis(cfg.timeouts.dig_delay_ms),
            build_step_delay: Duration::from_millis(cfg.timeouts.build_step_delay_ms),
            item_collect_delay: Duration::from_millis(cfg.timeouts.item_collect_delay_ms),
            max_mine_distance: cfg.limits.max_mine_distance,
            item_collect_radius: cfg.limits.item_collect_radius,
            follow_range: cfg.limits.follow_range,
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 一次任务运行：generation 唯一标识这次进入状态
#[derive(Clone)]
pub struct TaskRun {
    pub generation: u64,
    pub context: TaskContext,
    pub client: Arc<dyn GameClient>,
    pub settings: Arc<TaskSettings>,
    pub interrupt: InterruptFlag,
}

impl TaskRun {
    pub fn new(
        generation: u64,
        context: TaskContext,
        client: Arc<dyn GameClient>,
        settings: Arc<TaskSettings>,
    ) -> Self {
        Self {
            generation,
            context,
            client,
            settings,
            interrupt: InterruptFlag::new(),
        }
    }

    /// 聊天失败只记录日志，不影响任务
    pub async fn say(&self, message: &str) {
        if let Err(e) = self.client.chat(message).await {
            tracing::warn!(error = %e, "Failed to send chat message");
        }
    }
}

/// 任务状态行为
#[async_trait]
pub trait TaskBehavior: Send + Sync {
    fn kind(&self) -> TaskKind;

    /// 本状态下是否允许执行该指令（默认仅 ALWAYS_ALLOWED）
    fn allows(&self, command: &str) -> bool {
        ALWAYS_ALLOWED.contains(&command)
    }

    /// 是否有后台任务体（idle 没有）
    fn has_body(&self) -> bool {
        true
    }

    /// 进入状态后、任务体启动前调用
    async fn enter(&self, _run: &TaskRun) -> anyhow::Result<()> {
        Ok(())
    }

    /// 后台任务体：由状态机在进入状态后 spawn；须在子步骤之间检查 run.interrupt
    async fn body(&self, run: TaskRun) -> anyhow::Result<()>;

    /// 离开状态时的清理
    async fn exit(&self, _run: &TaskRun) -> anyhow::Result<()> {
        Ok(())
    }

    /// 外部请求取消时调用（在状态机切回 idle 之前）
    async fn interrupt(&self, _run: &TaskRun, _reason: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 默认能力表
pub fn default_behaviors() -> HashMap<TaskKind, Arc<dyn TaskBehavior>> {
    let behaviors: Vec<Arc<dyn TaskBehavior>> = vec![
        Arc::new(IdleTask),
        Arc::new(MovingTask),
        Arc::new(MiningTask),
        Arc::new(BuildingTask),
        Arc::new(FollowingTask),
        Arc::new(CollectingTask),
    ];
    behaviors.into_iter().map(|b| (b.kind(), b)).collect()
}
