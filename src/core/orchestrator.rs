//! 主控循环
//!
//! 外部游戏客户端把聊天事件送进一个通道；单个循环按到达顺序逐条交给分发器处理，
//! 同时定时清理限流 / 冷却表。Quit、通道关闭或关闭信号都会结束循环。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::builder::BotBuilder;
use crate::core::context::BotContext;
use crate::dispatch;
use crate::world::GameClient;

/// 送入主循环的事件
#[derive(Debug, Clone)]
pub enum BotEvent {
    Chat { username: String, message: String },
    Quit,
}

pub async fn run_event_loop(
    ctx: Arc<BotContext>,
    mut events: mpsc::UnboundedReceiver<BotEvent>,
    shutdown: CancellationToken,
) {
    let prune_every = Duration::from_secs(ctx.config.dispatch.prune_interval_secs.max(1));
    let mut prune = tokio::time::interval(prune_every);
    prune.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Event loop stopping on shutdown");
                break;
            }
            _ = prune.tick() => {
                ctx.guard.prune(tokio::time::Instant::now());
            }
            event = events.recv() => match event {
                Some(BotEvent::Chat { username, message }) => {
                    let outcome = dispatch::handle(&ctx, &username, &message).await;
                    tracing::debug!(user = %username, ?outcome, "Chat handled");
                }
                Some(BotEvent::Quit) | None => {
                    tracing::info!("Event loop finished");
                    break;
                }
            }
        }
    }
}

/// 构建机器人并启动主循环；返回事件发送端、上下文与循环句柄
pub fn create_bot(
    config: AppConfig,
    client: Arc<dyn GameClient>,
    shutdown: CancellationToken,
) -> anyhow::Result<(
    mpsc::UnboundedSender<BotEvent>,
    Arc<BotContext>,
    JoinHandle<()>,
)> {
    let ctx = BotBuilder::new(config, client).build()?;
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_event_loop(ctx.clone(), rx, shutdown));
    tracing::info!(username = %ctx.client.username(), "Bot started");
    Ok((tx, ctx, handle))
}
