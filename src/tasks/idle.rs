//! 空闲状态：没有任务体，允许执行任何指令

use async_trait::async_trait;

use super::{TaskBehavior, TaskKind, TaskRun};

pub struct IdleTask;

#[async_trait]
impl TaskBehavior for IdleTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Idle
    }

    fn allows(&self, _command: &str) -> bool {
        true
    }

    fn has_body(&self) -> bool {
        false
    }

    async fn body(&self, _run: TaskRun) -> anyhow::Result<()> {
        Ok(())
    }
}
