//! 机器人错误分类与用户提示
//!
//! 所有失败最终都归一为 [`BotError`]：带分类标签（ErrorKind）、可恢复标记、上下文、时间戳与构造位置。
//! 与 RecoveryCoordinator 配合：根据 kind 决定是否尝试自动恢复、向聊天发送哪条固定提示。

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// 错误分类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Movement,
    Inventory,
    Pathfinding,
    Connection,
    Timeout,
    /// 用户输入问题
    Validation,
    Permission,
    Cooldown,
    /// 状态表中没有对应的任务行为
    UnknownState,
    /// 关键字归类失败的兜底
    Unclassified,
}

const CONNECTION_KEYWORDS: &[&str] = &[
    "connection",
    "disconnect",
    "socket",
    "econnreset",
    "econnrefused",
];
const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out", "deadline has elapsed"];
const MOVEMENT_KEYWORDS: &[&str] = &["path", "navigation", "goal", "move"];
const INVENTORY_KEYWORDS: &[&str] = &["inventory", "item", "equip"];

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Movement => "movement",
            ErrorKind::Inventory => "inventory",
            ErrorKind::Pathfinding => "pathfinding",
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Validation => "validation",
            ErrorKind::Permission => "permission",
            ErrorKind::Cooldown => "cooldown",
            ErrorKind::UnknownState => "unknown_state",
            ErrorKind::Unclassified => "unclassified",
        }
    }

    /// 是否存在自动恢复策略
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::Movement | ErrorKind::Inventory | ErrorKind::Pathfinding | ErrorKind::Timeout
        )
    }

    /// 在分发边界被拒绝的输入类错误：不触发恢复，也不打断当前任务
    pub fn is_input_rejection(self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::Permission | ErrorKind::Cooldown
        )
    }

    /// 固定的聊天提示模板；输入类错误的 `{detail}` 由校验器给出的面向用户文本填充
    pub fn user_template(self) -> &'static str {
        match self {
            ErrorKind::Movement => "Movement failed. Please try again.",
            ErrorKind::Inventory => "Inventory operation failed.",
            ErrorKind::Pathfinding => "Pathfinding failed.",
            ErrorKind::Connection => "A connection error occurred.",
            ErrorKind::Timeout => "The operation timed out.",
            ErrorKind::Validation => "❌ {detail}",
            ErrorKind::Permission => "🚫 {detail}",
            ErrorKind::Cooldown => "⏱️ {detail}",
            ErrorKind::UnknownState => "That task is not available.",
            ErrorKind::Unclassified => "Operation failed.",
        }
    }

    /// 按错误文本关键字归类；连接类优先，其次超时、移动、背包
    pub fn classify(message: &str) -> ErrorKind {
        let lower = message.to_lowercase();
        let hit = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
        if hit(CONNECTION_KEYWORDS) {
            ErrorKind::Connection
        } else if hit(TIMEOUT_KEYWORDS) {
            ErrorKind::Timeout
        } else if hit(MOVEMENT_KEYWORDS) {
            ErrorKind::Movement
        } else if hit(INVENTORY_KEYWORDS) {
            ErrorKind::Inventory
        } else {
            ErrorKind::Unclassified
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 统一错误对象：在抛出点构造，或由 [`BotError::normalize`] 从任意错误合成
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct BotError {
    pub id: Uuid,
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    /// 构造位置（替代调用栈）
    pub origin: &'static Location<'static>,
}

impl BotError {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
            origin: Location::caller(),
        }
    }

    #[track_caller]
    pub fn movement(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Movement, message)
    }

    #[track_caller]
    pub fn inventory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Inventory, message)
    }

    #[track_caller]
    pub fn pathfinding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Pathfinding, message)
    }

    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[track_caller]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    #[track_caller]
    pub fn cooldown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cooldown, message)
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }

    /// 发往聊天的文本：非输入类错误只用固定模板，避免泄露内部信息
    pub fn user_message(&self) -> String {
        let template = self.kind.user_template();
        if self.kind.is_input_rejection() {
            template.replace("{detail}", &self.message)
        } else {
            template.to_string()
        }
    }

    /// 结构化日志数据
    pub fn log_data(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "kind": self.kind,
            "message": self.message,
            "context": self.context,
            "recoverable": self.recoverable(),
            "timestamp": self.timestamp.to_rfc3339(),
            "origin": format!("{}:{}", self.origin.file(), self.origin.line()),
        })
    }

    /// 归一化：已是 BotError 则原样取出；tokio 超时归为 Timeout；其余按错误文本关键字归类
    #[track_caller]
    pub fn normalize(err: anyhow::Error) -> BotError {
        let err = match err.downcast::<BotError>() {
            Ok(bot_err) => return bot_err,
            Err(other) => other,
        };
        if err.is::<tokio::time::error::Elapsed>() {
            return BotError::new(ErrorKind::Timeout, err.to_string());
        }
        let message = format!("{err:#}");
        BotError::new(ErrorKind::classify(&message), message)
    }
}

/// 指令注册错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Command key already registered: {0}")]
    DuplicateKey(String),
}
