//! 核心层：错误与恢复、任务状态机、运行时上下文、构建器、主控循环、优雅关闭

pub mod builder;
pub mod context;
pub mod error;
pub mod interrupt;
pub mod orchestrator;
pub mod recovery;
pub mod shutdown;
pub mod state;
pub mod state_machine;

pub use builder::BotBuilder;
pub use context::BotContext;
pub use error::{BotError, ErrorKind, RegistryError};
pub use interrupt::InterruptFlag;
pub use orchestrator::{create_bot, run_event_loop, BotEvent};
pub use recovery::{
    ErrorStats, HandleOptions, HandleReport, RecoveryCoordinator, RecoveryOutcome, RecoveryStrategy,
};
pub use shutdown::{ShutdownCoordinator, ShutdownManager, ShutdownReason};
pub use state::{StateChange, StatusSnapshot, TransitionRecord};
pub use state_machine::{TaskFailureHandler, TaskStateMachine};
