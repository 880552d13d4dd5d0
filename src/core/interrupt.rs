//! 协作式中断标记
//!
//! 每次进入任务状态都会创建一个新的 InterruptFlag（内部为 CancellationToken）。
//! 任务体在子步骤之间轮询，或用 pause() 让节奏等待与中断竞争；正在进行的单次客户端调用不会被强制终止。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    token: CancellationToken,
    /// 第一次触发时的原因
    reason: Arc<Mutex<Option<String>>>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发中断；重复触发保留最初的原因
    pub fn raise(&self, reason: &str) {
        {
            let mut slot = self.reason.lock().unwrap_or_else(|p| p.into_inner());
            if slot.is_none() {
                *slot = Some(reason.to_string());
            }
        }
        self.token.cancel();
    }

    pub fn is_raised(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// 等待中断发生
    pub async fn raised(&self) {
        self.token.cancelled().await;
    }

    /// 等待 duration；期间被中断返回 false
    pub async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => !self.is_raised(),
        }
    }
}
