//! 内置指令集

mod chest;
mod general;
mod info;
mod inventory;
mod movement;
mod stop;
mod world;

use std::time::Duration;

use super::{validators, CommandDescriptor, CommandRegistry, PermissionTier};
use crate::config::AppConfig;
use crate::core::{BotContext, RegistryError};
use crate::tasks::{TaskContext, TaskKind};
use crate::world::Control;

/// 注册全部内置指令
pub fn register_builtin(registry: &mut CommandRegistry, config: &AppConfig) -> Result<(), RegistryError> {
    let task_cooldown = Duration::from_millis(config.timeouts.task_command_cooldown_ms);

    let descriptors = vec![
        CommandDescriptor::new("goto", "Move to coordinates. Usage: goto <x> <y> <z>", movement::Goto)
            .alias("移動")
            .validator(validators::coordinates()),
        CommandDescriptor::new(
            "forward",
            "Walk forward for a few seconds. Usage: forward [seconds]",
            movement::Nudge::new(Control::Forward, "Moving forward..."),
        )
        .alias("前")
        .validator(validators::optional_count(0, 1, |_| movement::MAX_NUDGE_SECS)),
        CommandDescriptor::new(
            "back",
            "Walk backward for a few seconds. Usage: back [seconds]",
            movement::Nudge::new(Control::Back, "Moving backward..."),
        )
        .alias("後ろ")
        .validator(validators::optional_count(0, 1, |_| movement::MAX_NUDGE_SECS)),
        CommandDescriptor::new(
            "left",
            "Strafe left for a few seconds. Usage: left [seconds]",
            movement::Nudge::new(Control::Left, "Moving left..."),
        )
        .alias("左")
        .validator(validators::optional_count(0, 1, |_| movement::MAX_NUDGE_SECS)),
        CommandDescriptor::new(
            "right",
            "Strafe right for a few seconds. Usage: right [seconds]",
            movement::Nudge::new(Control::Right, "Moving right..."),
        )
        .alias("右")
        .validator(validators::optional_count(0, 1, |_| movement::MAX_NUDGE_SECS)),
        CommandDescriptor::new("jump", "Jump once.", movement::Jump).alias("ジャンプ"),
        CommandDescriptor::new("come", "Come to the player who called.", movement::Come).alias("おいで"),
        CommandDescriptor::new("follow", "Follow a player. Usage: follow [player]", movement::Follow)
            .alias("ついてきて"),
        CommandDescriptor::new("stop", "Stop the current task.", stop::Stop)
            .alias("停止")
            .alias("ストップ"),
        CommandDescriptor::new("mine", "Mine nearby blocks. Usage: mine <block> [count]", world::Mine)
            .alias("採掘")
            .cooldown(task_cooldown)
            .validator(validators::require_arg(0, "Specify a block name."))
            .validator(validators::optional_count(1, 1, |ctx| ctx.config.limits.max_mine_count)),
        CommandDescriptor::new("build", "Build a structure. Usage: build tower [size]", world::Build)
            .alias("建築")
            .cooldown(task_cooldown)
            .validator(validators::require_arg(0, "Specify a structure type (e.g. tower)."))
            .validator(world::structure_arg)
            .validator(validators::optional_count(1, 1, |ctx| ctx.config.limits.max_build_size)),
        CommandDescriptor::new("collect", "Collect dropped items. Usage: collect [item]", world::Collect)
            .alias("収集"),
        CommandDescriptor::new("drop", "Drop an item. Usage: drop <item> [count]", inventory::DropItem)
            .alias("捨てる")
            .tier(PermissionTier::Trusted)
            .validator(validators::require_arg(0, "Specify an item name."))
            .validator(validators::optional_count(1, 1, |_| u32::MAX)),
        CommandDescriptor::new(
            "chest",
            "Use a nearby chest. Usage: chest <open|store|take> [item] [count]",
            chest::Chest,
        )
        .alias("チェスト")
        .validator(chest::chest_args)
        .validator(validators::optional_count(2, 1, |_| u32::MAX)),
        CommandDescriptor::new("inv", "Show the inventory.", inventory::Inv)
            .alias("inventory")
            .alias("インベントリ"),
        CommandDescriptor::new("pos", "Show the current position.", info::Pos).alias("位置"),
        CommandDescriptor::new("health", "Show health and food.", info::Health).alias("体力"),
        CommandDescriptor::new("time", "Show the in-game time.", info::Time).alias("時間"),
        CommandDescriptor::new("players", "List nearby players.", info::Players).alias("プレイヤー"),
        CommandDescriptor::new("mobs", "List nearby mobs.", info::Mobs).alias("モブ"),
        CommandDescriptor::new("blocks", "List blocks around the bot.", info::Blocks).alias("ブロック"),
        CommandDescriptor::new("status", "Show the current task.", info::Status).alias("状態"),
        CommandDescriptor::new("help", "List commands. Usage: help [command]", info::Help).alias("ヘルプ"),
        CommandDescriptor::new("hello", "Say hello.", general::Hello).alias("こんにちは"),
        CommandDescriptor::new("goodmorning", "Say good morning.", general::GoodMorning).alias("おはよう"),
        CommandDescriptor::new("goodnight", "Say good night.", general::GoodNight).alias("おやすみ"),
        CommandDescriptor::new("thanks", "Reply to thanks.", general::Thanks)
            .alias("thank")
            .alias("ありがとう"),
    ];

    for descriptor in descriptors {
        registry.register(descriptor)?;
    }
    tracing::info!(keys = registry.len(), "Built-in commands registered");
    Ok(())
}

/// 启动长任务：已忙则提示并放弃；ack 在转换前发送
async fn start_task(
    ctx: &BotContext,
    kind: TaskKind,
    context: TaskContext,
    ack: Option<String>,
) -> anyhow::Result<()> {
    if ctx.machine.is_busy() {
        ctx.client
            .chat(&format!("Busy with {}. Say \"stop\" first.", ctx.machine.current_task()))
            .await?;
        return Ok(());
    }
    if let Some(ack) = ack {
        ctx.client.chat(&ack).await?;
    }
    ctx.machine.transition_to(kind, context).await?;
    Ok(())
}
