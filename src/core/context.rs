//! 运行时上下文：启动时构建一次，显式传给分发器与指令体

use std::sync::Arc;

use crate::commands::CommandRegistry;
use crate::config::AppConfig;
use crate::core::recovery::RecoveryCoordinator;
use crate::core::state::StatusSnapshot;
use crate::core::state_machine::TaskStateMachine;
use crate::dispatch::{DispatchGuard, InputFilter};
use crate::observability::MetricsCollector;
use crate::world::GameClient;

pub struct BotContext {
    pub config: Arc<AppConfig>,
    pub client: Arc<dyn GameClient>,
    pub registry: Arc<CommandRegistry>,
    pub machine: Arc<TaskStateMachine>,
    pub guard: DispatchGuard,
    pub filter: InputFilter,
    pub recovery: Arc<RecoveryCoordinator>,
    pub metrics: MetricsCollector,
}

impl BotContext {
    /// 同步状态快照
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            current_state: self.machine.current_task(),
            busy: self.machine.is_busy(),
            context: self.machine.current_context(),
            generation: self.machine.generation(),
            error_stats: self.recovery.error_stats(),
        }
    }
}
