//! 聊天指令分发
//!
//! [`handle`] 按固定顺序处理一条聊天消息，每一步都可能结束处理，返回值说明在哪一步结束。
//! 输入类失败（权限、校验、冷却）交给 RecoveryCoordinator 记录并提示，不会打断当前任务；
//! 指令体失败同样交给 RecoveryCoordinator，走完整的恢复流程。

use std::time::Duration;

use tokio::time::Instant;

use super::Rejection;
use crate::core::{BotContext, BotError, ErrorKind, HandleOptions};
use crate::tasks::TaskKind;

/// 分发结果：标识处理在哪一步结束
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 机器人自己的消息
    OwnMessage,
    Filtered(Rejection),
    RateLimited { retry_after: Duration },
    GlobalCooldown,
    UnknownCommand,
    /// 忙且当前任务不允许该指令
    Busy { current: TaskKind },
    /// 权限或校验失败
    Rejected(ErrorKind),
    CoolingDown { remaining: Duration },
    Completed,
    Failed(ErrorKind),
}

/// 整条消息转小写后按空白切分；第一个词为指令名
pub fn tokenize(message: &str) -> Option<(String, Vec<String>)> {
    let lower = message.to_lowercase();
    let mut parts = lower.split_whitespace().map(str::to_string);
    let name = parts.next()?;
    Some((name, parts.collect()))
}

async fn notify(ctx: &BotContext, message: &str) {
    if let Err(e) = ctx.client.chat(message).await {
        tracing::warn!(error = %e, "Failed to send notice");
    }
}

pub async fn handle(ctx: &BotContext, username: &str, raw: &str) -> DispatchOutcome {
    if username == ctx.client.username() {
        return DispatchOutcome::OwnMessage;
    }

    let message = match ctx.filter.check(raw) {
        Ok(message) => message,
        Err(rejection) => {
            tracing::debug!(user = %username, %rejection, "Message filtered");
            if ctx.config.dispatch.notify_rejections && rejection != Rejection::Empty {
                notify(ctx, &format!("⚠️ {rejection}")).await;
            }
            return DispatchOutcome::Filtered(rejection);
        }
    };

    let now = Instant::now();
    if let Err(retry_after) = ctx.guard.check_rate(username, now) {
        tracing::info!(user = %username, ?retry_after, "Rate limited");
        notify(
            ctx,
            &format!(
                "⏱️ Too many commands, {username}. Try again in {}s.",
                retry_after.as_secs().max(1)
            ),
        )
        .await;
        return DispatchOutcome::RateLimited { retry_after };
    }
    if !ctx.guard.check_global(now) {
        tracing::debug!(user = %username, "Dropped by global cooldown");
        return DispatchOutcome::GlobalCooldown;
    }

    let Some((name, args)) = tokenize(message) else {
        return DispatchOutcome::Filtered(Rejection::Empty);
    };
    let Some(descriptor) = ctx.registry.get(&name) else {
        tracing::debug!(user = %username, command = %name, "Unknown command ignored");
        return DispatchOutcome::UnknownCommand;
    };

    if ctx.machine.is_busy() && !ctx.machine.can_execute(&descriptor.name) {
        let current = ctx.machine.current_task();
        notify(
            ctx,
            &format!("Currently running \"{current}\". Say \"stop\" to cancel it."),
        )
        .await;
        return DispatchOutcome::Busy { current };
    }

    let context = format!("command:{}", descriptor.name);
    let tier = ctx.config.security.tier_of(username);
    if tier < descriptor.tier {
        let err = BotError::permission(format!(
            "{} requires {} permission.",
            descriptor.name, descriptor.tier
        ))
        .with_context("user", username)
        .with_context("tier", tier);
        ctx.recovery
            .handle(err, &context, HandleOptions::default())
            .await;
        return DispatchOutcome::Rejected(ErrorKind::Permission);
    }
    if let Err(err) = descriptor.validate(ctx, username, &args) {
        let kind = err.kind;
        ctx.recovery
            .handle(err.with_context("user", username), &context, HandleOptions::default())
            .await;
        return DispatchOutcome::Rejected(kind);
    }

    if let Some(remaining) = ctx.guard.cooldown_remaining(username, &descriptor.name, now) {
        let secs = remaining.as_secs_f64().ceil() as u64;
        let err = BotError::cooldown(format!("You can use {} again in {secs}s", descriptor.name))
            .with_context("user", username);
        ctx.recovery
            .handle(err, &context, HandleOptions::default())
            .await;
        return DispatchOutcome::CoolingDown { remaining };
    }
    ctx.guard
        .start_cooldown(username, &descriptor.name, descriptor.cooldown, now);

    let started = Instant::now();
    let result = descriptor.execute(ctx, username, &args).await;
    let elapsed = started.elapsed();
    ctx.metrics
        .record_command(&descriptor.name, elapsed, result.is_ok());

    let audit = serde_json::json!({
        "event": "command_audit",
        "command": descriptor.name,
        "user": username,
        "ok": result.is_ok(),
        "duration_ms": elapsed.as_millis() as u64,
        "args": args,
    });
    tracing::info!(audit = %audit.to_string(), "command");

    match result {
        Ok(()) => DispatchOutcome::Completed,
        Err(e) => {
            let err = BotError::normalize(e)
                .with_context("user", username)
                .with_context("message", message);
            let kind = err.kind;
            ctx.recovery
                .handle(err, &context, HandleOptions::default())
                .await;
            DispatchOutcome::Failed(kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let (name, args) = tokenize("GOTO 10  20\t30").unwrap();
        assert_eq!(name, "goto");
        assert_eq!(args, vec!["10", "20", "30"]);
        assert_eq!(tokenize("   "), None);
        let (name, args) = tokenize("ヘルプ").unwrap();
        assert_eq!(name, "ヘルプ");
        assert!(args.is_empty());
    }
}
