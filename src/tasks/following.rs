//! 跟随状态：设置跟随目标后挂起，直到被中断

use async_trait::async_trait;

use super::{TaskBehavior, TaskContext, TaskKind, TaskRun};

pub struct FollowingTask;

#[async_trait]
impl TaskBehavior for FollowingTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Following
    }

    async fn body(&self, run: TaskRun) -> anyhow::Result<()> {
        let TaskContext::Follow { target } = &run.context else {
            tracing::warn!("Following state entered without a target");
            return Ok(());
        };

        run.client.follow(target, run.settings.follow_range).await?;
        run.say(&format!("Following {target}! Say \"stop\" to stop."))
            .await;
        run.interrupt.raised().await;
        Ok(())
    }

    async fn exit(&self, run: &TaskRun) -> anyhow::Result<()> {
        run.client.stop_movement().await?;
        run.say("Stopped following.").await;
        Ok(())
    }
}
