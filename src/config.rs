//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CRAFTBOT__*` 覆盖（双下划线表示嵌套，如 `CRAFTBOT__DISPATCH__GLOBAL_COOLDOWN_MS=0`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::commands::{DuplicatePolicy, PermissionTier};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotSection,
    pub dispatch: DispatchSection,
    pub security: SecuritySection,
    pub limits: LimitsSection,
    pub timeouts: TimeoutsSection,
    pub recovery: RecoverySection,
    pub state: StateSection,
}

/// [bot] 段：连接参数（交给外部游戏客户端）与机器人用户名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotSection {
    pub username: String,
    pub host: String,
    pub port: u16,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            username: "CraftBot".to_string(),
            host: "localhost".to_string(),
            port: 25565,
        }
    }
}

/// [dispatch] 段：输入过滤、限流、全局冷却、注册冲突策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// 单条聊天最大字符数
    pub max_message_length: usize,
    /// 危险子串黑名单（正则，不区分大小写）
    pub deny_patterns: Vec<String>,
    /// 被过滤时是否在聊天里提示（默认静默）
    pub notify_rejections: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_commands: usize,
    /// 任意两条指令之间的最小间隔（全系统）
    pub global_cooldown_ms: u64,
    /// 限流 / 冷却表最多跟踪的键数，超出时淘汰最久未活跃的
    pub tracked_keys_capacity: usize,
    /// 后台清理间隔
    pub prune_interval_secs: u64,
    pub duplicate_policy: DuplicatePolicy,
}

fn default_deny_patterns() -> Vec<String> {
    vec![
        r"\.\./".into(),
        r"\.\.\\".into(),
        r"<\s*script".into(),
        r"javascript:".into(),
        r"\$\{".into(),
        r"\x00".into(),
    ]
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            max_message_length: 256,
            deny_patterns: default_deny_patterns(),
            notify_rejections: false,
            rate_limit_window_secs: 60,
            rate_limit_max_commands: 30,
            global_cooldown_ms: 500,
            tracked_keys_capacity: 1024,
            prune_interval_secs: 60,
            duplicate_policy: DuplicatePolicy::Override,
        }
    }
}

impl DispatchSection {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn global_cooldown(&self) -> Duration {
        Duration::from_millis(self.global_cooldown_ms)
    }
}

/// [security] 段：用户权限等级
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub admins: Vec<String>,
    pub trusted: Vec<String>,
    pub default_role: PermissionTier,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            trusted: Vec::new(),
            default_role: PermissionTier::Basic,
        }
    }
}

impl SecuritySection {
    /// 用户的权限等级（用户名不区分大小写）
    pub fn tier_of(&self, username: &str) -> PermissionTier {
        let listed = |names: &[String]| names.iter().any(|n| n.eq_ignore_ascii_case(username));
        if listed(&self.admins) {
            PermissionTier::Admin
        } else if listed(&self.trusted) {
            PermissionTier::Trusted
        } else {
            self.default_role
        }
    }
}

/// [limits] 段：搜索半径与数量上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_build_size: u32,
    pub default_tower_height: u32,
    pub max_mine_distance: u32,
    pub max_mine_count: u32,
    pub item_collect_radius: u32,
    pub follow_range: f64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_build_size: 20,
            default_tower_height: 5,
            max_mine_distance: 32,
            max_mine_count: 64,
            item_collect_radius: 16,
            follow_range: 3.0,
        }
    }
}

/// [timeouts] 段：任务子步骤之间的节奏（毫秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    pub dig_delay_ms: u64,
    pub item_collect_delay_ms: u64,
    pub build_step_delay_ms: u64,
    /// 长任务类指令（mine / build）的单用户冷却
    pub task_command_cooldown_ms: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            dig_delay_ms: 500,
            item_collect_delay_ms: 500,
            build_step_delay_ms: 1000,
            task_command_cooldown_ms: 3000,
        }
    }
}

/// [recovery] 段：自动恢复的次数上限与退避
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoverySection {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub movement_pause_ms: u64,
    /// 同一 (kind, context) 累计超过该次数时告警
    pub recurrence_warn_threshold: u64,
    /// 同一键在该时长内未再出现则重置尝试次数
    pub attempt_reset_secs: u64,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1000,
            movement_pause_ms: 1000,
            recurrence_warn_threshold: 5,
            attempt_reset_secs: 300,
        }
    }
}

/// [state] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateSection {
    pub history_capacity: usize,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            history_capacity: 10,
        }
    }
}

impl AppConfig {
    /// 取值范围检查
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.bot.host.is_empty() {
            errors.push("bot.host is required".to_string());
        }
        if self.bot.port == 0 {
            errors.push("bot.port must be between 1 and 65535".to_string());
        }
        if self.bot.username.chars().count() < 3 {
            errors.push("bot.username must be at least 3 characters long".to_string());
        }
        if !(1..=100).contains(&self.limits.max_build_size) {
            errors.push("limits.max_build_size must be between 1 and 100".to_string());
        }
        if self.limits.max_mine_count == 0 {
            errors.push("limits.max_mine_count must be at least 1".to_string());
        }
        if !(1..=64).contains(&self.limits.max_mine_distance) {
            errors.push("limits.max_mine_distance must be between 1 and 64".to_string());
        }
        if self.dispatch.rate_limit_max_commands == 0 {
            errors.push("dispatch.rate_limit_max_commands must be positive".to_string());
        }
        if self.state.history_capacity == 0 {
            errors.push("state.history_capacity must be positive".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// 从 config 目录加载配置，环境变量 CRAFTBOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CRAFTBOT__*（双下划线表示嵌套键）
/// 4. 校验取值范围，失败时返回 ConfigError::Message
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CRAFTBOT")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate().map_err(|errors| {
        config::ConfigError::Message(format!(
            "Configuration validation failed: {}",
            errors.join(", ")
        ))
    })?;
    Ok(cfg)
}
