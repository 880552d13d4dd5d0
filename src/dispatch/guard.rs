//! 限流与冷却
//!
//! - 每用户滑动窗口限流（默认 60 秒 30 条）
//! - 任意两条指令之间的全局冷却
//! - 每 (用户, 指令) 冷却
//!
//! 所有表都有容量上限，满时淘汰最久未活跃的键；prune() 由后台定时调用清理过期记录。
//! 时间一律由调用方传入（tokio Instant），便于在暂停时钟下测试。

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::DispatchSection;

#[derive(Debug)]
struct UserWindow {
    hits: VecDeque<Instant>,
    last_active: Instant,
}

#[derive(Debug)]
struct Cooldown {
    ready_at: Instant,
    last_active: Instant,
}

#[derive(Debug, Default)]
struct GuardState {
    windows: HashMap<String, UserWindow>,
    /// (用户, 指令) → 冷却记录
    cooldowns: HashMap<(String, String), Cooldown>,
    last_command: Option<Instant>,
}

#[derive(Debug)]
pub struct DispatchGuard {
    window: Duration,
    max_commands: usize,
    global_cooldown: Duration,
    capacity: usize,
    state: Mutex<GuardState>,
}

impl DispatchGuard {
    pub fn new(window: Duration, max_commands: usize, global_cooldown: Duration, capacity: usize) -> Self {
        Self {
            window,
            max_commands,
            global_cooldown,
            capacity: capacity.max(1),
            state: Mutex::new(GuardState::default()),
        }
    }

    pub fn from_config(cfg: &DispatchSection) -> Self {
        Self::new(
            cfg.rate_limit_window(),
            cfg.rate_limit_max_commands,
            cfg.global_cooldown(),
            cfg.tracked_keys_capacity,
        )
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// 滑动窗口限流；超限返回还需等待的时长，被拒绝的请求不计入窗口
    pub fn check_rate(&self, user: &str, now: Instant) -> Result<(), Duration> {
        let mut state = self.lock();
        if !state.windows.contains_key(user) && state.windows.len() >= self.capacity {
            evict_least_active(&mut state.windows, |w| w.last_active);
        }
        let entry = state.windows.entry(user.to_string()).or_insert_with(|| UserWindow {
            hits: VecDeque::new(),
            last_active: now,
        });
        entry.last_active = now;
        while entry
            .hits
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            entry.hits.pop_front();
        }
        if entry.hits.len() >= self.max_commands {
            let oldest = entry.hits.front().copied().unwrap_or(now);
            return Err((oldest + self.window).saturating_duration_since(now));
        }
        entry.hits.push_back(now);
        Ok(())
    }

    /// 全局冷却：通过时记录本次时刻
    pub fn check_global(&self, now: Instant) -> bool {
        let mut state = self.lock();
        if let Some(last) = state.last_command {
            if now.duration_since(last) < self.global_cooldown {
                return false;
            }
        }
        state.last_command = Some(now);
        true
    }

    pub fn cooldown_remaining(&self, user: &str, command: &str, now: Instant) -> Option<Duration> {
        let state = self.lock();
        let ready_at = state.cooldowns.get(&(user.to_string(), command.to_string()))?.ready_at;
        (ready_at > now).then(|| ready_at - now)
    }

    pub fn start_cooldown(&self, user: &str, command: &str, cooldown: Duration, now: Instant) {
        if cooldown.is_zero() {
            return;
        }
        let mut state = self.lock();
        let key = (user.to_string(), command.to_string());
        if !state.cooldowns.contains_key(&key) && state.cooldowns.len() >= self.capacity {
            evict_least_active(&mut state.cooldowns, |c| c.last_active);
        }
        state.cooldowns.insert(
            key,
            Cooldown {
                ready_at: now + cooldown,
                last_active: now,
            },
        );
    }

    /// 清理窗口外的限流记录与已到期的冷却
    pub fn prune(&self, now: Instant) {
        let mut state = self.lock();
        let window = self.window;
        state
            .windows
            .retain(|_, w| now.duration_since(w.last_active) < window);
        state.cooldowns.retain(|_, c| c.ready_at > now);
        tracing::debug!(
            users = state.windows.len(),
            cooldowns = state.cooldowns.len(),
            "Pruned dispatch guard"
        );
    }

    /// 当前跟踪的 (限流用户数, 冷却键数)
    pub fn tracked(&self) -> (usize, usize) {
        let state = self.lock();
        (state.windows.len(), state.cooldowns.len())
    }
}

fn evict_least_active<K, V>(entries: &mut HashMap<K, V>, last_active: impl Fn(&V) -> Instant)
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    if let Some(key) = entries
        .iter()
        .min_by_key(|(_, v)| last_active(v))
        .map(|(k, _)| k.clone())
    {
        tracing::debug!(key = ?key, "Evicting least active guard entry");
        entries.remove(&key);
    }
}
