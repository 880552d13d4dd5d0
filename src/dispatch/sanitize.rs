//! 输入过滤：空消息、超长消息、黑名单子串（路径穿越、脚本注入标记等）

use regex::{RegexSet, RegexSetBuilder};
use thiserror::Error;

use crate::config::DispatchSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Empty message")]
    Empty,
    #[error("Message is too long")]
    TooLong,
    #[error("Message contains disallowed content")]
    Suspicious,
}

#[derive(Debug)]
pub struct InputFilter {
    max_length: usize,
    deny: RegexSet,
}

impl InputFilter {
    pub fn new(max_length: usize, deny_patterns: &[String]) -> Result<Self, regex::Error> {
        let deny = RegexSetBuilder::new(deny_patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { max_length, deny })
    }

    pub fn from_config(cfg: &DispatchSection) -> Result<Self, regex::Error> {
        Self::new(cfg.max_message_length, &cfg.deny_patterns)
    }

    /// 通过时返回去掉首尾空白的消息
    pub fn check<'a>(&self, raw: &'a str) -> Result<&'a str, Rejection> {
        let message = raw.trim();
        if message.is_empty() {
            return Err(Rejection::Empty);
        }
        if message.chars().count() > self.max_length {
            return Err(Rejection::TooLong);
        }
        if self.deny.is_match(message) {
            return Err(Rejection::Suspicious);
        }
        Ok(message)
    }
}
