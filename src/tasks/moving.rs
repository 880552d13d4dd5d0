//! 移动状态：寻路到目标坐标，到达后自动回到 idle

use async_trait::async_trait;

use super::{TaskBehavior, TaskContext, TaskKind, TaskRun};
use crate::core::BotError;

pub struct MovingTask;

#[async_trait]
impl TaskBehavior for MovingTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Moving
    }

    async fn body(&self, run: TaskRun) -> anyhow::Result<()> {
        let TaskContext::Goto { goal } = run.context else {
            tracing::warn!("Moving state entered without a goal");
            return Ok(());
        };

        match run.client.goto(goal).await {
            Ok(()) => {
                run.say("Reached the destination.").await;
                Ok(())
            }
            // stop_movement 打断的寻路不算失败
            Err(_) if run.interrupt.is_raised() => Ok(()),
            Err(e) => Err(BotError::movement(format!("{e:#}"))
                .with_context("goal", goal)
                .into()),
        }
    }

    async fn interrupt(&self, run: &TaskRun, _reason: &str) -> anyhow::Result<()> {
        run.client.stop_movement().await
    }
}
