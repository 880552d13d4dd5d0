//! 收集状态：逐个走到附近的掉落物处拾取

use async_trait::async_trait;

use super::{TaskBehavior, TaskContext, TaskKind, TaskRun, ALWAYS_ALLOWED};

pub struct CollectingTask;

#[async_trait]
impl TaskBehavior for CollectingTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Collecting
    }

    fn allows(&self, command: &str) -> bool {
        ALWAYS_ALLOWED.contains(&command) || command == "inv"
    }

    async fn body(&self, run: TaskRun) -> anyhow::Result<()> {
        let item = match &run.context {
            TaskContext::Collect { item } => item.clone(),
            _ => None,
        };
        let label = item.as_deref().unwrap_or("items");

        let items = run
            .client
            .dropped_items(item.as_deref(), run.settings.item_collect_radius)
            .await?;
        if items.is_empty() {
            run.say(&format!("No {label} found nearby.")).await;
            return Ok(());
        }

        run.say(&format!("Collecting {} {label}...", items.len()))
            .await;
        for dropped in items {
            if run.interrupt.is_raised() {
                return Ok(());
            }
            if let Err(e) = run.client.goto(dropped.position.block()).await {
                if run.interrupt.is_raised() {
                    return Ok(());
                }
                // 单个掉落物不可达不终止任务
                tracing::warn!(item = %dropped.name, error = %e, "Could not path to item");
                continue;
            }
            if !run.interrupt.pause(run.settings.item_collect_delay).await {
                return Ok(());
            }
        }

        run.say("Finished collecting.").await;
        Ok(())
    }

    async fn interrupt(&self, run: &TaskRun, reason: &str) -> anyhow::Result<()> {
        run.say(&format!("⚠️ Collecting interrupted (reason: {reason})"))
            .await;
        Ok(())
    }

    async fn exit(&self, run: &TaskRun) -> anyhow::Result<()> {
        run.client.stop_movement().await
    }
}
