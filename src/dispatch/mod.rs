//! 分发层：聊天消息 → 过滤 → 限流 → 指令查找 → 状态门控 → 校验 → 执行

pub mod dispatcher;
pub mod guard;
pub mod sanitize;

pub use dispatcher::{handle, tokenize, DispatchOutcome};
pub use guard::DispatchGuard;
pub use sanitize::{InputFilter, Rejection};
