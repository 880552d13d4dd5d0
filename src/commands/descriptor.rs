//! 指令描述符
//!
//! 所有指令实现 CommandBody（异步执行体），由 CommandDescriptor 附加名称、别名、说明、权限等级、
//! 冷却与有序校验器，再注册到 CommandRegistry。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{BotContext, BotError};

/// 权限等级：basic < trusted < admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    Basic,
    Trusted,
    Admin,
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionTier::Basic => f.write_str("basic"),
            PermissionTier::Trusted => f.write_str("trusted"),
            PermissionTier::Admin => f.write_str("admin"),
        }
    }
}

/// 指令执行体
#[async_trait]
pub trait CommandBody: Send + Sync {
    async fn run(&self, ctx: &BotContext, username: &str, args: &[String]) -> anyhow::Result<()>;
}

/// 参数校验器：按注册顺序执行，第一个失败即中止
pub type Validator = Arc<dyn Fn(&BotContext, &str, &[String]) -> Result<(), BotError> + Send + Sync>;

pub struct CommandDescriptor {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub tier: PermissionTier,
    pub cooldown: Duration,
    validators: Vec<Validator>,
    body: Arc<dyn CommandBody>,
}

impl CommandDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl CommandBody + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: description.into(),
            tier: PermissionTier::Basic,
            cooldown: Duration::ZERO,
            validators: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn tier(mut self, tier: PermissionTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&BotContext, &str, &[String]) -> Result<(), BotError> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// 名称 + 别名
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn validate(&self, ctx: &BotContext, username: &str, args: &[String]) -> Result<(), BotError> {
        self.validators
            .iter()
            .try_for_each(|v| v(ctx, username, args))
    }

    pub async fn execute(&self, ctx: &BotContext, username: &str, args: &[String]) -> anyhow::Result<()> {
        self.body.run(ctx, username, args).await
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("tier", &self.tier)
            .field("cooldown", &self.cooldown)
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(PermissionTier::Basic < PermissionTier::Trusted);
        assert!(PermissionTier::Trusted < PermissionTier::Admin);
    }
}
