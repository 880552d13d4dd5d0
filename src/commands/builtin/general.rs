use async_trait::async_trait;

use crate::commands::CommandBody;
use crate::core::BotContext;

pub struct Hello;

#[async_trait]
impl CommandBody for Hello {
    async fn run(&self, ctx: &BotContext, username: &str, _args: &[String]) -> anyhow::Result<()> {
        ctx.client.chat(&format!("Hello, {username}!")).await
    }
}

pub struct GoodMorning;

#[async_trait]
impl CommandBody for GoodMorning {
    async fn run(&self, ctx: &BotContext, username: &str, _args: &[String]) -> anyhow::Result<()> {
        ctx.client
            .chat(&format!("Good morning, {username}! Let's have a great day!"))
            .await
    }
}

pub struct GoodNight;

#[async_trait]
impl CommandBody for GoodNight {
    async fn run(&self, ctx: &BotContext, username: &str, _args: &[String]) -> anyhow::Result<()> {
        ctx.client
            .chat(&format!("Good night, {username}! Sweet dreams!"))
            .await
    }
}

pub struct Thanks;

#[async_trait]
impl CommandBody for Thanks {
    async fn run(&self, ctx: &BotContext, username: &str, _args: &[String]) -> anyhow::Result<()> {
        ctx.client.chat(&format!("You're welcome, {username}!")).await
    }
}
