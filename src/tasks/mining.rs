//! 采掘状态：搜索附近方块，逐个挖掘，每次挖掘之间检查中断

use async_trait::async_trait;

use super::{TaskBehavior, TaskContext, TaskKind, TaskRun, ALWAYS_ALLOWED};

pub struct MiningTask;

#[async_trait]
impl TaskBehavior for MiningTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Mining
    }

    fn allows(&self, command: &str) -> bool {
        ALWAYS_ALLOWED.contains(&command) || command == "inv"
    }

    async fn body(&self, run: TaskRun) -> anyhow::Result<()> {
        let TaskContext::Mine { block, count } = &run.context else {
            tracing::warn!("Mining state entered without a block target");
            return Ok(());
        };
        let count = *count as usize;

        let found = run
            .client
            .find_blocks(block, run.settings.max_mine_distance, count * 5)
            .await?;
        let targets: Vec<_> = found.into_iter().take(count).collect();
        if targets.is_empty() {
            anyhow::bail!("No {block} found nearby");
        }

        run.say(&format!("Mining {} {block}...", targets.len())).await;
        for pos in targets {
            if run.interrupt.is_raised() {
                return Ok(());
            }
            run.client.dig(pos).await?;
            tracing::debug!(block = %block, at = %pos, "Dug block");
            if !run.interrupt.pause(run.settings.dig_delay).await {
                return Ok(());
            }
        }

        run.say("Mining complete!").await;
        Ok(())
    }

    async fn interrupt(&self, run: &TaskRun, reason: &str) -> anyhow::Result<()> {
        run.say(&format!("⚠️ Mining interrupted (reason: {reason})"))
            .await;
        Ok(())
    }
}
