//! 分发流程集成测试：BotContext + dispatch::handle 驱动内存模拟世界

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use craftbot::commands::{CommandBody, CommandDescriptor, DuplicatePolicy};
    use craftbot::config::AppConfig;
    use craftbot::core::{BotBuilder, BotContext, ErrorKind};
    use craftbot::dispatch::{handle, DispatchOutcome, Rejection};
    use craftbot::tasks::{TaskContext, TaskKind};
    use craftbot::world::{BlockPos, Control, GameClient, ItemStack, Position, SimOp, SimulatedWorld};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.dispatch.global_cooldown_ms = 0;
        config.timeouts.dig_delay_ms = 100;
        config
    }

    fn bot_with(config: AppConfig, world: &Arc<SimulatedWorld>) -> Arc<BotContext> {
        BotBuilder::new(config, world.clone()).build().unwrap()
    }

    fn bot(world: &Arc<SimulatedWorld>) -> Arc<BotContext> {
        bot_with(test_config(), world)
    }

    fn said(world: &SimulatedWorld, line: &str) -> bool {
        world.chat_log().iter().any(|m| m == line)
    }

    fn stone_row(world: SimulatedWorld) -> SimulatedWorld {
        world
            .with_block(BlockPos::new(1, 64, 0), "stone")
            .with_block(BlockPos::new(2, 64, 0), "stone")
            .with_block(BlockPos::new(3, 64, 0), "stone")
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_coordinates_rejected_without_transition() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        let outcome = handle(&ctx, "Alice", "goto abc 1 2").await;
        assert_eq!(outcome, DispatchOutcome::Rejected(ErrorKind::Validation));
        assert!(!ctx.machine.is_busy());
        assert!(ctx.machine.history().is_empty());
        assert!(said(&world, "❌ Invalid coordinates"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_goto_moves_and_returns_to_idle() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);
        let goal = BlockPos::new(10, 20, 30);

        assert_eq!(handle(&ctx, "Bob", "goto 10 20 30").await, DispatchOutcome::Completed);
        assert_eq!(ctx.machine.current_task(), TaskKind::Moving);
        assert_eq!(ctx.machine.current_context(), TaskContext::Goto { goal });
        assert!(said(&world, "Moving to (10, 20, 30)"));

        ctx.machine.wait_idle().await;
        assert!(!ctx.machine.is_busy());
        assert_eq!(world.current_position().unwrap().block(), goal);
        assert!(said(&world, "Reached the destination."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_mining() {
        let world = Arc::new(stone_row(SimulatedWorld::new("CraftBot")));
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Carol", "mine stone 3").await, DispatchOutcome::Completed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(world.dug().len(), 1);

        assert_eq!(handle(&ctx, "Carol", "stop").await, DispatchOutcome::Completed);
        assert!(!ctx.machine.is_busy());
        assert!(said(&world, "⚠️ Mining interrupted (reason: user_request)"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(world.dug().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_rejects_disallowed_command() {
        let world = Arc::new(
            stone_row(SimulatedWorld::new("CraftBot")).with_player("Steve", Position::new(4.0, 64.0, 4.0)),
        );
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Steve", "follow").await, DispatchOutcome::Completed);
        assert_eq!(ctx.machine.current_task(), TaskKind::Following);

        let outcome = handle(&ctx, "Dave", "mine stone").await;
        assert_eq!(
            outcome,
            DispatchOutcome::Busy {
                current: TaskKind::Following
            }
        );
        assert!(said(&world, "Currently running \"following\". Say \"stop\" to cancel it."));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(world.dug().is_empty());

        // 安全指令仍可执行
        assert_eq!(handle(&ctx, "Dave", "pos").await, DispatchOutcome::Completed);
        assert_eq!(ctx.machine.current_task(), TaskKind::Following);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inventory_allowed_while_mining() {
        let world = Arc::new(stone_row(SimulatedWorld::new("CraftBot")).with_item("bread", 2));
        let ctx = bot(&world);

        handle(&ctx, "Carol", "mine stone 3").await;
        assert_eq!(handle(&ctx, "Carol", "inv").await, DispatchOutcome::Completed);
        assert!(said(&world, "bread: 2"));
        assert_eq!(
            handle(&ctx, "Carol", "build tower").await,
            DispatchOutcome::Busy {
                current: TaskKind::Mining
            }
        );
    }

    #[tokio::test]
    async fn test_interrupt_from_idle_is_noop() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        assert!(!ctx.machine.interrupt("user_request").await.unwrap());
        assert!(!ctx.machine.interrupt("user_request").await.unwrap());
        assert_eq!(handle(&ctx, "Erin", "stop").await, DispatchOutcome::Completed);
        assert_eq!(ctx.machine.generation(), 0);
        assert!(world.chat_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_rejects_thirty_first_command() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        for _ in 0..30 {
            assert_eq!(handle(&ctx, "Fred", "hello").await, DispatchOutcome::Completed);
        }
        assert_eq!(
            handle(&ctx, "Fred", "hello").await,
            DispatchOutcome::RateLimited {
                retry_after: Duration::from_secs(60)
            }
        );
        // 其他用户不受影响
        assert_eq!(handle(&ctx, "Gina", "hello").await, DispatchOutcome::Completed);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(handle(&ctx, "Fred", "hello").await, DispatchOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_cooldown_drops_silently() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot_with(AppConfig::default(), &world);

        assert_eq!(handle(&ctx, "Hana", "hello").await, DispatchOutcome::Completed);
        assert_eq!(handle(&ctx, "Ivan", "hello").await, DispatchOutcome::GlobalCooldown);
        assert_eq!(world.chat_log().len(), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(handle(&ctx, "Ivan", "hello").await, DispatchOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alias_resolves_to_same_descriptor() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        let by_name = ctx.registry.get("goto").unwrap();
        let by_alias = ctx.registry.get("移動").unwrap();
        assert!(Arc::ptr_eq(&by_name, &by_alias));

        assert_eq!(handle(&ctx, "Jun", "移動 1 64 1").await, DispatchOutcome::Completed);
        assert_eq!(ctx.machine.current_task(), TaskKind::Moving);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_failure_returns_to_idle() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Kai", "mine diamond_ore").await, DispatchOutcome::Completed);
        ctx.machine.wait_idle().await;

        assert!(!ctx.machine.is_busy());
        assert!(said(&world, "Operation failed."));
        assert!(!world.chat_log().iter().any(|m| m.contains("diamond_ore")));
        assert_eq!(ctx.status().error_stats.total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_movement_failure_recovers() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);
        world.fail_next(SimOp::Goto, "No path to the goal");

        assert_eq!(handle(&ctx, "Lea", "goto 5 64 5").await, DispatchOutcome::Completed);
        ctx.machine.wait_idle().await;

        assert!(said(&world, "Movement failed. Please try again."));
        assert!(said(&world, "🔄 Attempting automatic recovery..."));
        assert!(world.stop_count() >= 1);
        assert_eq!(ctx.status().error_stats.by_kind["movement"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_tiers() {
        let world = Arc::new(SimulatedWorld::new("CraftBot").with_item("cobblestone", 5));
        let mut config = test_config();
        config.security.trusted = vec!["Tess".to_string()];
        let ctx = bot_with(config, &world);

        assert_eq!(
            handle(&ctx, "Mo", "drop cobblestone 2").await,
            DispatchOutcome::Rejected(ErrorKind::Permission)
        );
        assert!(said(&world, "🚫 drop requires trusted permission."));

        assert_eq!(handle(&ctx, "Tess", "drop cobblestone 2").await, DispatchOutcome::Completed);
        assert!(said(&world, "Dropped 2 cobblestone."));
        let inv = world.inventory().await.unwrap();
        assert_eq!(inv, vec![ItemStack { name: "cobblestone".into(), count: 3 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_cooldown() {
        let world = Arc::new(stone_row(SimulatedWorld::new("CraftBot")));
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Nia", "mine stone 1").await, DispatchOutcome::Completed);
        ctx.machine.wait_idle().await;

        let outcome = handle(&ctx, "Nia", "mine stone 1").await;
        assert!(matches!(outcome, DispatchOutcome::CoolingDown { .. }));
        assert!(world
            .chat_log()
            .iter()
            .any(|m| m.starts_with("⏱️ You can use mine again in")));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(handle(&ctx, "Nia", "mine stone 1").await, DispatchOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_tower_stacks_blocks() {
        let world = Arc::new(SimulatedWorld::new("CraftBot").with_item("cobblestone", 10));
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Olga", "build tower 3").await, DispatchOutcome::Completed);
        ctx.machine.wait_idle().await;

        let placed: Vec<BlockPos> = world.placed().into_iter().map(|(pos, _)| pos).collect();
        assert_eq!(
            placed,
            vec![
                BlockPos::new(2, 64, 0),
                BlockPos::new(2, 65, 0),
                BlockPos::new(2, 66, 0)
            ]
        );
        assert!(said(&world, "Construction complete!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_size_over_limit_rejected() {
        let world = Arc::new(SimulatedWorld::new("CraftBot").with_item("cobblestone", 10));
        let ctx = bot(&world);
        assert_eq!(
            handle(&ctx, "Olga", "build tower 500").await,
            DispatchOutcome::Rejected(ErrorKind::Validation)
        );
        assert_eq!(
            handle(&ctx, "Olga", "build castle").await,
            DispatchOutcome::Rejected(ErrorKind::Validation)
        );
        assert!(!ctx.machine.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_picks_up_dropped_items() {
        let world = Arc::new(SimulatedWorld::new("CraftBot").with_dropped("apple", Position::new(3.3, 64.0, 2.6)));
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Pia", "collect apple").await, DispatchOutcome::Completed);
        ctx.machine.wait_idle().await;

        let inv = world.inventory().await.unwrap();
        assert_eq!(inv, vec![ItemStack { name: "apple".into(), count: 1 }]);
        assert!(said(&world, "Finished collecting."));
    }

    #[tokio::test]
    async fn test_ignored_messages() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "CraftBot", "hello").await, DispatchOutcome::OwnMessage);
        assert_eq!(
            handle(&ctx, "Quinn", "goto ../../etc 1 2").await,
            DispatchOutcome::Filtered(Rejection::Suspicious)
        );
        assert_eq!(handle(&ctx, "Quinn", "   ").await, DispatchOutcome::Filtered(Rejection::Empty));
        assert_eq!(handle(&ctx, "Quinn", "dance").await, DispatchOutcome::UnknownCommand);
        assert!(world.chat_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_snapshot_serializes() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);
        handle(&ctx, "Rae", "goto 3 64 3").await;

        let json = serde_json::to_value(ctx.status()).unwrap();
        assert_eq!(json["current_state"], "moving");
        assert_eq!(json["busy"], true);
        assert_eq!(json["context"]["goto"]["goal"]["y"], 64);
        assert_eq!(json["error_stats"]["total"], 0);
    }

    struct Wave;

    #[async_trait]
    impl CommandBody for Wave {
        async fn run(&self, ctx: &BotContext, username: &str, _args: &[String]) -> anyhow::Result<()> {
            ctx.client.chat(&format!("*waves at {username}*")).await
        }
    }

    #[tokio::test]
    async fn test_custom_command_and_duplicate_policy() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = BotBuilder::new(test_config(), world.clone())
            .with_command(CommandDescriptor::new("wave", "Wave back.", Wave).alias("hi"))
            .build()
            .unwrap();
        assert_eq!(handle(&ctx, "Sam", "HI").await, DispatchOutcome::Completed);
        assert!(said(&world, "*waves at Sam*"));

        let mut config = test_config();
        config.dispatch.duplicate_policy = DuplicatePolicy::Reject;
        let result = BotBuilder::new(config, world.clone())
            .with_command(CommandDescriptor::new("wave", "Wave back.", Wave).alias("hello"))
            .build();
        assert!(result.is_err());
    }
    #[tokio::test(start_paused = true)]
    async fn test_chest_store_take_and_open() {
        let chest = BlockPos::new(3, 64, 0);
        let world = Arc::new(
            SimulatedWorld::new("CraftBot")
                .with_item("cobblestone", 10)
                .with_item("bread", 2)
                .with_container(chest, "chest", &[("iron_ingot", 5)]),
        );
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Gwen", "chest store").await, DispatchOutcome::Completed);
        assert!(said(&world, "Stored 2 kinds of items in the chest."));
        assert!(world.inventory_snapshot().is_empty());

        assert_eq!(handle(&ctx, "Gwen", "chest take bread 1").await, DispatchOutcome::Completed);
        assert!(said(&world, "Took 1 bread from the chest."));
        assert_eq!(
            world.inventory_snapshot(),
            vec![ItemStack { name: "bread".into(), count: 1 }]
        );

        assert_eq!(handle(&ctx, "Gwen", "チェスト open").await, DispatchOutcome::Completed);
        assert!(said(&world, "Chest contents: iron_ingot x5, cobblestone x10, bread x1"));
        assert_eq!(world.windows_closed(), 3);
        assert!(!ctx.machine.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chest_arguments_validated() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        assert_eq!(
            handle(&ctx, "Hank", "chest burn").await,
            DispatchOutcome::Rejected(ErrorKind::Validation)
        );
        assert!(said(&world, "❌ Invalid subcommand. Use `open`, `store` or `take`."));
        assert_eq!(
            handle(&ctx, "Hank", "chest take").await,
            DispatchOutcome::Rejected(ErrorKind::Validation)
        );
        assert!(said(&world, "❌ Specify an item to take."));

        assert_eq!(handle(&ctx, "Hank", "chest open").await, DispatchOutcome::Completed);
        assert!(said(&world, "No chest nearby."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chest_failure_closes_window_and_recovers() {
        let world = Arc::new(
            SimulatedWorld::new("CraftBot").with_container(BlockPos::new(1, 64, 1), "chest", &[]),
        );
        let ctx = bot(&world);
        world.fail_next(SimOp::Container, "window desync");

        assert_eq!(
            handle(&ctx, "Ivy", "chest open").await,
            DispatchOutcome::Failed(ErrorKind::Inventory)
        );
        assert!(said(&world, "Inventory operation failed."));
        assert!(said(&world, "🔄 Attempting automatic recovery..."));
        // 指令自身关闭一次，CloseWindow 恢复再关闭一次
        assert_eq!(world.windows_closed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_commands_describe_surroundings() {
        let world = Arc::new(
            stone_row(SimulatedWorld::new("CraftBot"))
                .with_block(BlockPos::new(0, 63, 0), "dirt")
                .with_time(6000)
                .with_player("Zed", Position::new(4.5, 64.0, 0.5))
                .with_mob("zombie", Position::new(5.0, 64.0, 5.0))
                .with_mob("zombie", Position::new(-5.0, 64.0, 5.0))
                .with_mob("creeper", Position::new(80.0, 64.0, 0.0)),
        );
        let ctx = bot(&world);

        for command in ["time", "players", "mobs", "blocks"] {
            assert_eq!(handle(&ctx, "Jill", command).await, DispatchOutcome::Completed);
        }
        assert!(said(&world, "Time: 12:00"));
        assert!(said(&world, "=== Nearby players (1) ==="));
        assert!(said(&world, "Zed: 4m"));
        assert!(said(&world, "=== Nearby mobs (2) ==="));
        assert!(said(&world, "zombie: 2"));
        assert!(!world.chat_log().iter().any(|m| m.starts_with("creeper")));
        assert!(said(&world, "=== Nearby blocks (5x5x5) ==="));
        assert!(said(&world, "stone: 2"));
        assert!(said(&world, "dirt: 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_greetings() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        handle(&ctx, "Kim", "goodmorning").await;
        handle(&ctx, "Kim", "おやすみ").await;
        handle(&ctx, "Kim", "thank").await;
        assert!(said(&world, "Good morning, Kim! Let's have a great day!"));
        assert!(said(&world, "Good night, Kim! Sweet dreams!"));
        assert!(said(&world, "You're welcome, Kim!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_controls_release_after_duration() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);

        assert_eq!(handle(&ctx, "Lou", "forward 2").await, DispatchOutcome::Completed);
        assert_eq!(world.active_controls(), vec![Control::Forward]);
        assert!(said(&world, "Moving forward..."));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(world.active_controls().is_empty());
        assert!(said(&world, "Stopped."));
        assert!(!ctx.machine.is_busy());

        assert_eq!(handle(&ctx, "Lou", "jump").await, DispatchOutcome::Completed);
        let log = world.control_log();
        assert_eq!(&log[log.len() - 2..], &[(Control::Jump, true), (Control::Jump, false)]);

        assert_eq!(
            handle(&ctx, "Lou", "left 99").await,
            DispatchOutcome::Rejected(ErrorKind::Validation)
        );
        assert!(said(&world, "❌ Count must be between 1 and 30"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failure_reported_generically() {
        let world = Arc::new(SimulatedWorld::new("CraftBot"));
        let ctx = bot(&world);
        world.remove_position();

        assert_eq!(
            handle(&ctx, "Max", "pos").await,
            DispatchOutcome::Failed(ErrorKind::Unclassified)
        );
        assert!(said(&world, "Operation failed."));
        assert!(!world.chat_log().iter().any(|m| m.contains("not spawned")));
    }
}
