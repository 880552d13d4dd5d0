//! 机器人构建器：统一的组件初始化
//!
//! 按依赖顺序组装：状态机 → 恢复协调器（绑定为任务失败处理方）→ 指令注册表 → 分发守卫与过滤器。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

use crate::commands::{register_builtin, CommandDescriptor, CommandRegistry};
use crate::config::AppConfig;
use crate::core::context::BotContext;
use crate::core::recovery::RecoveryCoordinator;
use crate::core::state_machine::{TaskFailureHandler, TaskStateMachine};
use crate::dispatch::{DispatchGuard, InputFilter};
use crate::observability::MetricsCollector;
use crate::tasks::{default_behaviors, TaskBehavior, TaskKind, TaskSettings};
use crate::world::GameClient;

pub struct BotBuilder {
    config: AppConfig,
    client: Arc<dyn GameClient>,
    behaviors: HashMap<TaskKind, Arc<dyn TaskBehavior>>,
    extra_commands: Vec<CommandDescriptor>,
    builtin_commands: bool,
}

impl BotBuilder {
    pub fn new(config: AppConfig, client: Arc<dyn GameClient>) -> Self {
        Self {
            config,
            client,
            behaviors: default_behaviors(),
            extra_commands: Vec::new(),
            builtin_commands: true,
        }
    }

    /// 追加指令（在内置指令之后注册，冲突按 duplicate_policy 处理）
    pub fn with_command(mut self, descriptor: CommandDescriptor) -> Self {
        self.extra_commands.push(descriptor);
        self
    }

    /// 替换某个状态的行为
    pub fn with_behavior(mut self, behavior: Arc<dyn TaskBehavior>) -> Self {
        self.behaviors.insert(behavior.kind(), behavior);
        self
    }

    pub fn without_builtin_commands(mut self) -> Self {
        self.builtin_commands = false;
        self
    }

    pub fn build(self) -> anyhow::Result<Arc<BotContext>> {
        let config = Arc::new(self.config);

        let machine = TaskStateMachine::new(
            self.behaviors,
            self.client.clone(),
            Arc::new(TaskSettings::from_config(&config)),
            config.state.history_capacity,
        );
        let recovery = Arc::new(RecoveryCoordinator::new(
            self.client.clone(),
            machine.clone(),
            config.recovery.clone(),
        ));
        let handler: Arc<dyn TaskFailureHandler> = recovery.clone();
        machine.bind_failure_handler(Arc::downgrade(&handler));

        let mut registry = CommandRegistry::new(config.dispatch.duplicate_policy);
        if self.builtin_commands {
            register_builtin(&mut registry, &config)?;
        }
        for descriptor in self.extra_commands {
            registry.register(descriptor)?;
        }

        let filter = InputFilter::from_config(&config.dispatch)
            .context("Invalid dispatch.deny_patterns")?;

        Ok(Arc::new(BotContext {
            guard: DispatchGuard::from_config(&config.dispatch),
            filter,
            client: self.client,
            registry: Arc::new(registry),
            machine,
            recovery,
            metrics: MetricsCollector::new(),
            config,
        }))
    }
}
