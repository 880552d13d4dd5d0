use std::time::Duration;

use async_trait::async_trait;

use super::start_task;
use crate::commands::{validators, CommandBody};
use crate::core::BotContext;
use crate::tasks::{TaskContext, TaskKind};
use crate::world::Control;

/// forward / back / left / right 最长按键秒数
pub const MAX_NUDGE_SECS: u32 = 30;
const DEFAULT_NUDGE_SECS: u32 = 3;

pub struct Goto;

#[async_trait]
impl CommandBody for Goto {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let goal = validators::parse_coordinates(args)?;
        start_task(
            ctx,
            TaskKind::Moving,
            TaskContext::Goto { goal },
            Some(format!("Moving to {goal}")),
        )
        .await
    }
}

pub struct Come;

#[async_trait]
impl CommandBody for Come {
    async fn run(&self, ctx: &BotContext, username: &str, _args: &[String]) -> anyhow::Result<()> {
        let Some(position) = ctx.client.player_position(username).await? else {
            ctx.client.chat(&format!("I can't see you, {username}.")).await?;
            return Ok(());
        };
        start_task(
            ctx,
            TaskKind::Moving,
            TaskContext::Goto {
                goal: position.block(),
            },
            Some(format!("Coming to you, {username}!")),
        )
        .await
    }
}

pub struct Follow;

#[async_trait]
impl CommandBody for Follow {
    async fn run(&self, ctx: &BotContext, username: &str, args: &[String]) -> anyhow::Result<()> {
        let target = args.first().map_or(username, String::as_str);
        if ctx.client.player_position(target).await?.is_none() {
            ctx.client.chat(&format!("I can't see {target}.")).await?;
            return Ok(());
        }
        start_task(
            ctx,
            TaskKind::Following,
            TaskContext::Follow {
                target: target.to_string(),
            },
            None,
        )
        .await
    }
}

/// 按住一个方向键若干秒后松开；不经过状态机
pub struct Nudge {
    control: Control,
    announce: &'static str,
}

impl Nudge {
    pub fn new(control: Control, announce: &'static str) -> Self {
        Self { control, announce }
    }
}

#[async_trait]
impl CommandBody for Nudge {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let secs = validators::parse_count(args.first(), DEFAULT_NUDGE_SECS, 1, MAX_NUDGE_SECS)?;
        ctx.client.clear_controls().await?;
        ctx.client.set_control(self.control, true).await?;
        ctx.client.chat(self.announce).await?;

        let client = ctx.client.clone();
        let control = self.control;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(u64::from(secs))).await;
            if let Err(e) = client.set_control(control, false).await {
                tracing::warn!(%control, error = %e, "Failed to release control");
                return;
            }
            if let Err(e) = client.chat("Stopped.").await {
                tracing::warn!(error = %e, "Failed to send chat message");
            }
        });
        Ok(())
    }
}

pub struct Jump;

#[async_trait]
impl CommandBody for Jump {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        ctx.client.set_control(Control::Jump, true).await?;
        ctx.client.set_control(Control::Jump, false).await?;
        ctx.client.chat("Jump!").await
    }
}
