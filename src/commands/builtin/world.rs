use async_trait::async_trait;

use super::start_task;
use crate::commands::{validators, CommandBody};
use crate::core::{BotContext, BotError};
use crate::tasks::{Structure, TaskContext, TaskKind};

pub struct Mine;

#[async_trait]
impl CommandBody for Mine {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let block = validators::sanitize_item_name(args.first().map_or("", String::as_str))?;
        let count = validators::parse_count(args.get(1), 1, 1, ctx.config.limits.max_mine_count)?;
        start_task(ctx, TaskKind::Mining, TaskContext::Mine { block, count }, None).await
    }
}

pub fn structure_arg(_ctx: &BotContext, _username: &str, args: &[String]) -> Result<(), BotError> {
    parse_structure(args).map(|_| ())
}

fn parse_structure(args: &[String]) -> Result<Structure, BotError> {
    let raw = args.first().map_or("", String::as_str);
    Structure::parse(raw)
        .ok_or_else(|| BotError::validation("Only `tower` can be built right now.").with_context("structure", raw))
}

pub struct Build;

#[async_trait]
impl CommandBody for Build {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let structure = parse_structure(args)?;
        let limits = &ctx.config.limits;
        let size = validators::parse_count(args.get(1), limits.default_tower_height, 1, limits.max_build_size)?;
        start_task(ctx, TaskKind::Building, TaskContext::Build { structure, size }, None).await
    }
}

pub struct Collect;

#[async_trait]
impl CommandBody for Collect {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let item = args
            .first()
            .map(|raw| validators::sanitize_item_name(raw))
            .transpose()?;
        start_task(ctx, TaskKind::Collecting, TaskContext::Collect { item }, None).await
    }
}
