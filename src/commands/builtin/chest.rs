//! chest 指令：查看、存入、取出附近容器中的物品
//!
//! 客户端调用出错时归为 Inventory 类；无论成功与否都会关闭容器窗口。

use async_trait::async_trait;

use crate::commands::{validators, CommandBody};
use crate::core::{BotContext, BotError};
use crate::world::BlockPos;

const SEARCH_RADIUS: u32 = 16;
const VIEWABLE: &[&str] = &["chest", "trapped_chest", "ender_chest"];
/// 末影箱的内容属于各玩家，不往里存
const STORABLE: &[&str] = &["chest", "trapped_chest"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChestAction {
    Open,
    Store,
    Take,
}

fn parse_action(args: &[String]) -> Result<ChestAction, BotError> {
    match args.first().map(String::as_str) {
        Some("open" | "開く") => Ok(ChestAction::Open),
        Some("store" | "保管") => Ok(ChestAction::Store),
        Some("take" | "取り出す") => Ok(ChestAction::Take),
        _ => Err(BotError::validation(
            "Invalid subcommand. Use `open`, `store` or `take`.",
        )),
    }
}

pub fn chest_args(_ctx: &BotContext, _username: &str, args: &[String]) -> Result<(), BotError> {
    if parse_action(args)? == ChestAction::Take && args.get(1).map_or(true, |a| a.trim().is_empty()) {
        return Err(BotError::validation("Specify an item to take."));
    }
    Ok(())
}

/// 各种容器方块中离机器人最近的一个
async fn nearest_container(ctx: &BotContext, kinds: &[&str]) -> anyhow::Result<Option<BlockPos>> {
    let here = ctx.client.position().await?;
    let mut nearest: Option<(f64, BlockPos)> = None;
    for kind in kinds {
        let found = ctx.client.find_blocks(kind, SEARCH_RADIUS, 1).await?;
        if let Some(pos) = found.into_iter().next() {
            let distance = pos.center().distance_to(here);
            if nearest.map_or(true, |(best, _)| distance < best) {
                nearest = Some((distance, pos));
            }
        }
    }
    Ok(nearest.map(|(_, pos)| pos))
}

pub struct Chest;

impl Chest {
    async fn show(&self, ctx: &BotContext, at: BlockPos) -> anyhow::Result<()> {
        let contents = ctx.client.open_container(at).await?;
        if contents.is_empty() {
            return ctx.client.chat("The chest is empty.").await;
        }
        let listing: Vec<String> = contents
            .iter()
            .map(|stack| format!("{} x{}", stack.name, stack.count))
            .collect();
        ctx.client
            .chat(&format!("Chest contents: {}", listing.join(", ")))
            .await
    }

    async fn store(&self, ctx: &BotContext, at: BlockPos) -> anyhow::Result<()> {
        ctx.client.open_container(at).await?;
        let stacks = ctx.client.inventory().await?;
        if stacks.is_empty() {
            return ctx.client.chat("Nothing to store.").await;
        }
        let mut kinds = 0;
        for stack in &stacks {
            ctx.client.deposit(&stack.name, stack.count).await?;
            kinds += 1;
        }
        ctx.client
            .chat(&format!("Stored {kinds} kinds of items in the chest."))
            .await
    }

    async fn take(
        &self,
        ctx: &BotContext,
        at: BlockPos,
        item: &str,
        quantity: Option<u32>,
    ) -> anyhow::Result<()> {
        let available: u32 = ctx
            .client
            .open_container(at)
            .await?
            .iter()
            .filter(|s| s.name == item)
            .map(|s| s.count)
            .sum();
        if available == 0 {
            return ctx.client.chat(&format!("{item} is not in the chest.")).await;
        }
        let taken = ctx
            .client
            .withdraw(item, quantity.map_or(available, |q| q.min(available)))
            .await?;
        ctx.client
            .chat(&format!("Took {taken} {item} from the chest."))
            .await
    }
}

#[async_trait]
impl CommandBody for Chest {
    async fn run(&self, ctx: &BotContext, _username: &str, args: &[String]) -> anyhow::Result<()> {
        let action = parse_action(args)?;
        let take = match action {
            ChestAction::Take => {
                let item = validators::sanitize_item_name(args.get(1).map_or("", String::as_str))?;
                let quantity = args
                    .get(2)
                    .map(|raw| validators::parse_count(Some(raw), 1, 1, u32::MAX))
                    .transpose()?;
                Some((item, quantity))
            }
            _ => None,
        };

        let kinds = if action == ChestAction::Open { VIEWABLE } else { STORABLE };
        let Some(at) = nearest_container(ctx, kinds).await? else {
            return ctx.client.chat("No chest nearby.").await;
        };

        let outcome = match (action, &take) {
            (ChestAction::Open, _) => self.show(ctx, at).await,
            (ChestAction::Store, _) => self.store(ctx, at).await,
            (ChestAction::Take, Some((item, quantity))) => self.take(ctx, at, item, *quantity).await,
            (ChestAction::Take, None) => Ok(()),
        };
        let closed = ctx.client.close_window().await;
        outcome.map_err(|e| BotError::inventory(format!("{e:#}")).with_context("chest", at))?;
        closed
    }
}
