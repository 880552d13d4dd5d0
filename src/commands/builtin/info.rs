use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::commands::CommandBody;
use crate::core::BotContext;

pub struct Pos;

#[async_trait]
impl CommandBody for Pos {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let pos = ctx.client.position().await?.block();
        ctx.client
            .chat(&format!("Position: x={}, y={}, z={}", pos.x, pos.y, pos.z))
            .await
    }
}

pub struct Health;

#[async_trait]
impl CommandBody for Health {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let vitals = ctx.client.vitals().await?;
        ctx.client
            .chat(&format!("Health: {:.0}/20, Food: {}/20", vitals.health, vitals.food))
            .await
    }
}

pub struct Status;

#[async_trait]
impl CommandBody for Status {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let status = ctx.status();
        let task = if status.busy {
            format!("busy ({})", status.current_state)
        } else {
            "idle".to_string()
        };
        ctx.client
            .chat(&format!(
                "Status: {task}, errors handled: {}",
                status.error_stats.total
            ))
            .await
    }
}

pub struct Help;

#[async_trait]
impl CommandBody for Help {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let Some(topic) = args.first() else {
            let names: Vec<String> = ctx.registry.descriptors().iter().map(|d| d.name.clone()).collect();
            return ctx
                .client
                .chat(&format!("Commands: {}", names.join(", ")))
                .await;
        };

        match ctx.registry.get(topic) {
            Some(descriptor) if descriptor.aliases.is_empty() => {
                ctx.client
                    .chat(&format!("{}: {}", descriptor.name, descriptor.description))
                    .await
            }
            Some(descriptor) => {
                ctx.client
                    .chat(&format!(
                        "{}: {} (aliases: {})",
                        descriptor.name,
                        descriptor.description,
                        descriptor.aliases.join(", ")
                    ))
                    .await
            }
            None => ctx.client.chat(&format!("Unknown command: {topic}")).await,
        }
    }
}

/// 游戏内 tick 换算为 时:分（tick 0 是早上 6 点）
pub fn clock_time(ticks: u32) -> (u32, u32) {
    let hours = (ticks / 1000 + 6) % 24;
    let minutes = (ticks % 1000) * 60 / 1000;
    (hours, minutes)
}

pub struct Time;

#[async_trait]
impl CommandBody for Time {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let (hours, minutes) = clock_time(ctx.client.time_of_day().await?);
        ctx.client.chat(&format!("Time: {hours}:{minutes:02}")).await
    }
}

pub struct Players;

#[async_trait]
impl CommandBody for Players {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let players = ctx.client.nearby_players().await?;
        if players.is_empty() {
            return ctx.client.chat("No players nearby.").await;
        }
        let here = ctx.client.position().await?;
        ctx.client
            .chat(&format!("=== Nearby players ({}) ===", players.len()))
            .await?;
        for player in &players {
            let distance = player.position.distance_to(here).floor();
            ctx.client
                .chat(&format!("{}: {distance}m", player.username))
                .await?;
        }
        Ok(())
    }
}

const MOB_RADIUS: u32 = 20;

pub struct Mobs;

#[async_trait]
impl CommandBody for Mobs {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let mobs = ctx.client.nearby_mobs(MOB_RADIUS).await?;
        if mobs.is_empty() {
            return ctx.client.chat("No mobs nearby.").await;
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for mob in &mobs {
            *counts.entry(mob.kind.as_str()).or_default() += 1;
        }
        ctx.client
            .chat(&format!("=== Nearby mobs ({}) ===", mobs.len()))
            .await?;
        for (kind, count) in counts {
            ctx.client.chat(&format!("{kind}: {count}")).await?;
        }
        Ok(())
    }
}

/// 周围 5x5x5 立方体内数量最多的几种方块
pub struct Blocks;

const BLOCK_SCAN_REACH: i32 = 2;
const BLOCK_LIST_LIMIT: usize = 5;

#[async_trait]
impl CommandBody for Blocks {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let center = ctx.client.position().await?.block();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for dx in -BLOCK_SCAN_REACH..=BLOCK_SCAN_REACH {
            for dy in -BLOCK_SCAN_REACH..=BLOCK_SCAN_REACH {
                for dz in -BLOCK_SCAN_REACH..=BLOCK_SCAN_REACH {
                    match ctx.client.block_at(center.offset(dx, dy, dz)).await? {
                        Some(name) if name != "air" => *counts.entry(name).or_default() += 1,
                        _ => {}
                    }
                }
            }
        }
        if counts.is_empty() {
            return ctx.client.chat("Nothing notable nearby.").await;
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ctx.client.chat("=== Nearby blocks (5x5x5) ===").await?;
        for (name, count) in ranked.into_iter().take(BLOCK_LIST_LIMIT) {
            ctx.client.chat(&format!("{name}: {count}")).await?;
        }
        Ok(())
    }
}
