//! 指令注册表
//!
//! 名称与每个别名都作为键，指向同一个 Arc<CommandDescriptor>。键统一小写。
//! 键冲突时按 DuplicatePolicy 处理：Override 后注册者覆盖（记录警告），Reject 整条注册失败。

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use super::CommandDescriptor;
use crate::core::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Override,
    Reject,
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<CommandDescriptor>>,
    policy: DuplicatePolicy,
}

impl CommandRegistry {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            commands: HashMap::new(),
            policy,
        }
    }

    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<Arc<CommandDescriptor>, RegistryError> {
        let descriptor = Arc::new(descriptor);
        let keys: Vec<String> = descriptor.keys().map(str::to_lowercase).collect();

        if self.policy == DuplicatePolicy::Reject {
            if let Some(taken) = keys.iter().find(|k| self.commands.contains_key(*k)) {
                return Err(RegistryError::DuplicateKey(taken.clone()));
            }
        }

        for key in keys {
            if let Some(previous) = self.commands.insert(key.clone(), descriptor.clone()) {
                tracing::warn!(
                    key = %key,
                    previous = %previous.name,
                    command = %descriptor.name,
                    "Command key overridden"
                );
            }
        }
        tracing::debug!(command = %descriptor.name, aliases = ?descriptor.aliases, "Registered command");
        Ok(descriptor)
    }

    pub fn get(&self, key: &str) -> Option<Arc<CommandDescriptor>> {
        self.commands.get(&key.to_lowercase()).cloned()
    }

    /// 去重后的描述符列表，按名称排序（help 用）
    pub fn descriptors(&self) -> Vec<Arc<CommandDescriptor>> {
        let mut list: Vec<Arc<CommandDescriptor>> = Vec::new();
        for descriptor in self.commands.values() {
            if !list.iter().any(|d| Arc::ptr_eq(d, descriptor)) {
                list.push(descriptor.clone());
            }
        }
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// 键的数量（含别名）
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
