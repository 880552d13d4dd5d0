//! CraftBot - 游戏聊天指令机器人
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与恢复、任务状态机、运行时上下文、主控循环、优雅关闭
//! - **commands**: 指令描述符、注册表、参数校验与内置指令
//! - **dispatch**: 聊天消息过滤、限流与冷却、指令分发
//! - **tasks**: 各任务状态的行为（移动、采掘、建造、跟随、收集）
//! - **world**: 游戏客户端抽象与内存模拟实现
//! - **observability**: 日志与指令指标

pub mod commands;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod observability;
pub mod tasks;
pub mod world;

pub use crate::core::{BotBuilder, BotContext, BotError, ErrorKind};
