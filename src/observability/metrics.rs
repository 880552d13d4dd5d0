//! 指令执行指标：次数、平均耗时、失败率

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default, Clone)]
struct CommandStats {
    count: u64,
    total: Duration,
    errors: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    pub count: u64,
    pub average_ms: f64,
    pub error_rate: f64,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    commands: Mutex<BTreeMap<String, CommandStats>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_command(&self, name: &str, duration: Duration, success: bool) {
        let mut commands = self.commands.lock().unwrap_or_else(|p| p.into_inner());
        let stats = commands.entry(name.to_string()).or_default();
        stats.count += 1;
        stats.total += duration;
        if !success {
            stats.errors += 1;
        }
    }

    pub fn report(&self) -> BTreeMap<String, CommandReport> {
        let commands = self.commands.lock().unwrap_or_else(|p| p.into_inner());
        commands
            .iter()
            .map(|(name, s)| {
                let count = s.count.max(1) as f64;
                (
                    name.clone(),
                    CommandReport {
                        count: s.count,
                        average_ms: s.total.as_secs_f64() * 1000.0 / count,
                        error_rate: s.errors as f64 / count,
                    },
                )
            })
            .collect()
    }
}
