use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::commands::{validators, CommandBody};
use crate::core::BotContext;

pub struct DropItem;

#[async_trait]
impl CommandBody for DropItem {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let item = validators::sanitize_item_name(args.first().map_or("", String::as_str))?;
        let quantity = args
            .get(1)
            .map(|raw| validators::parse_count(Some(raw), 1, 1, u32::MAX))
            .transpose()?;

        let held: u32 = ctx
            .client
            .inventory()
            .await?
            .iter()
            .filter(|s| s.name == item)
            .map(|s| s.count)
            .sum();
        if held == 0 {
            ctx.client
                .chat(&format!("{item} was not found in the inventory."))
                .await?;
            return Ok(());
        }

        let amount = quantity.map_or(held, |q| q.min(held));
        let dropped = ctx.client.toss(&item, amount).await?;
        ctx.client.chat(&format!("Dropped {dropped} {item}.")).await?;
        Ok(())
    }
}

pub struct Inv;

#[async_trait]
impl CommandBody for Inv {
    async fn run(&self, ctx: &BotContext, _username: &str, _args: &[String]) -> anyhow::Result<()> {
        let stacks = ctx.client.inventory().await?;
        if stacks.is_empty() {
            ctx.client.chat("The inventory is empty.").await?;
            return Ok(());
        }

        let mut totals: BTreeMap<&str, u32> = BTreeMap::new();
        for stack in &stacks {
            *totals.entry(stack.name.as_str()).or_default() += stack.count;
        }
        ctx.client
            .chat(&format!("=== Inventory ({}/36) ===", stacks.len()))
            .await?;
        for (name, count) in totals {
            ctx.client.chat(&format!("{name}: {count}")).await?;
        }
        Ok(())
    }
}
