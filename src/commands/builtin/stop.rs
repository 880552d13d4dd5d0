use async_trait::async_trait;

use crate::commands::CommandBody;
use crate::core::BotContext;

pub struct Stop;

#[async_trait]
impl CommandBody for Stop {
    async fn run(&self, ctx: &BotContext, username: &str, _args: &[String]) -> anyhow::Result<()> {
        if ctx.machine.interrupt("user_request").await? {
            tracing::info!(user = %username, "Task stopped on request");
            ctx.client.chat("Stopped.").await?;
        }
        Ok(())
    }
}
