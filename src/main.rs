//! CraftBot 演示入口
//!
//! 初始化日志、加载配置，在内存模拟世界上启动机器人；从标准输入读取 `玩家名: 消息` 行，
//! 机器人的聊天输出打印到标准输出。输入结束后等待当前任务完成再退出。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use craftbot::config::{load_config, AppConfig};
use craftbot::core::shutdown::{MovementCleanup, TaskCleanup};
use craftbot::core::{create_bot, BotEvent, ShutdownCoordinator, ShutdownManager, ShutdownReason};
use craftbot::world::{BlockPos, Position, SimulatedWorld};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// 解析 `name: message`
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (name, message) = line.split_once(':')?;
    let name = name.trim();
    (!name.is_empty()).then_some((name, message.trim()))
}

fn demo_world(username: &str) -> SimulatedWorld {
    let mut world = SimulatedWorld::new(username)
        .with_player("Steve", Position::new(4.5, 64.0, -3.5))
        .with_item("cobblestone", 32)
        .with_item("bread", 4)
        .with_dropped("apple", Position::new(3.3, 64.0, 2.6));
    for x in 2..6 {
        world = world.with_block(BlockPos::new(x, 63, 5), "stone");
    }
    world.with_block(BlockPos::new(-3, 62, 1), "coal_ore")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    craftbot::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let bot_name = config.bot.username.clone();

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    let world = Arc::new(demo_world(&bot_name).with_chat_sink(chat_tx));
    tokio::spawn(async move {
        while let Some(line) = chat_rx.recv().await {
            println!("<{bot_name}> {line}");
        }
    });

    let manager = Arc::new(ShutdownManager::new());
    manager.install_signal_handlers();
    let (events, ctx, event_loop) =
        create_bot(config, world.clone(), manager.token()).context("Failed to create bot")?;

    let mut coordinator = ShutdownCoordinator::new(manager.clone());
    coordinator.register(TaskCleanup::new(ctx.machine.clone()));
    coordinator.register(MovementCleanup::new(world.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = manager.wait_for_shutdown() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_line(&line) {
                    Some((username, message)) => {
                        let event = BotEvent::Chat {
                            username: username.to_string(),
                            message: message.to_string(),
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => eprintln!("expected `name: message`"),
                }
            }
        }
    }

    // Quit 排在已入队的聊天之后，循环先处理完它们再退出
    let _ = events.send(BotEvent::Quit);
    if let Err(e) = event_loop.await {
        tracing::error!(error = %e, "Event loop task failed");
        manager.shutdown(ShutdownReason::FatalError(e.to_string()));
    }
    if !manager.is_shutdown() {
        tokio::select! {
            _ = ctx.machine.wait_idle() => {}
            _ = manager.wait_for_shutdown() => {}
        }
        manager.shutdown(ShutdownReason::UserInitiated);
    }
    coordinator.run_cleanup().await;

    let status = serde_json::to_string(&ctx.status()).context("Failed to serialize status")?;
    tracing::info!(%status, metrics = ?ctx.metrics.report(), "Bot stopped");
    Ok(())
}
