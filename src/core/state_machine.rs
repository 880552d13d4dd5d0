//! 任务状态机
//!
//! 同一时刻只有一个当前状态。转换由异步互斥锁串行化；只读查询（is_busy / can_execute）是同步的。
//! 每次进入状态分配一个单调递增的 generation，任务体结束后仅当 generation 仍匹配时才切回 idle，
//! 这样被中断或被替换的旧任务体的迟到完成不会影响新状态。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, RwLockReadGuard, Weak};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use crate::core::error::{BotError, ErrorKind};
use crate::core::state::{StateChange, TransitionRecord};
use crate::tasks::{TaskBehavior, TaskContext, TaskKind, TaskRun, TaskSettings};
use crate::world::GameClient;

/// 任务体失败的接收方（由 RecoveryCoordinator 实现）
///
/// generation 是失败那次运行的标识；处理方据此判断状态机是否已经进入了新的任务。
#[async_trait]
pub trait TaskFailureHandler: Send + Sync {
    async fn handle_task_failure(&self, error: anyhow::Error, task: TaskKind, generation: u64);
}

struct ActiveState {
    kind: TaskKind,
    run: TaskRun,
}

pub struct TaskStateMachine {
    behaviors: HashMap<TaskKind, Arc<dyn TaskBehavior>>,
    client: Arc<dyn GameClient>,
    settings: Arc<TaskSettings>,
    current: RwLock<ActiveState>,
    history: Mutex<VecDeque<TransitionRecord>>,
    history_capacity: usize,
    transition_lock: tokio::sync::Mutex<()>,
    next_generation: AtomicU64,
    events: broadcast::Sender<StateChange>,
    failure_handler: OnceLock<Weak<dyn TaskFailureHandler>>,
    this: Weak<TaskStateMachine>,
}

impl TaskStateMachine {
    pub fn new(
        behaviors: HashMap<TaskKind, Arc<dyn TaskBehavior>>,
        client: Arc<dyn GameClient>,
        settings: Arc<TaskSettings>,
        history_capacity: usize,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let initial = TaskRun::new(0, TaskContext::None, client.clone(), settings.clone());
        Arc::new_cyclic(|this| Self {
            behaviors,
            client,
            settings,
            current: RwLock::new(ActiveState {
                kind: TaskKind::Idle,
                run: initial,
            }),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(1),
            transition_lock: tokio::sync::Mutex::new(()),
            next_generation: AtomicU64::new(0),
            events,
            failure_handler: OnceLock::new(),
            this: this.clone(),
        })
    }

    /// 绑定任务体失败的处理方；只能绑定一次
    pub fn bind_failure_handler(&self, handler: Weak<dyn TaskFailureHandler>) {
        if self.failure_handler.set(handler).is_err() {
            tracing::warn!("Task failure handler already bound, ignoring");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ActiveState> {
        self.current.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn current_task(&self) -> TaskKind {
        self.read().kind
    }

    pub fn current_context(&self) -> TaskContext {
        self.read().run.context.clone()
    }

    pub fn generation(&self) -> u64 {
        self.read().run.generation
    }

    pub fn is_busy(&self) -> bool {
        self.current_task() != TaskKind::Idle
    }

    /// 当前状态是否允许执行该指令；找不到行为时拒绝
    pub fn can_execute(&self, command: &str) -> bool {
        self.behaviors
            .get(&self.current_task())
            .map_or(false, |b| b.allows(command))
    }

    pub fn history(&self) -> Vec<TransitionRecord> {
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// 等待回到 idle
    pub async fn wait_idle(&self) {
        let mut rx = self.events.subscribe();
        while self.is_busy() {
            if let Err(broadcast::error::RecvError::Closed) = rx.recv().await {
                return;
            }
        }
    }

    /// 切换到 kind 状态
    ///
    /// 旧状态的 exit 钩子出错时转换中止，错误返回给调用方，当前状态不变。
    pub async fn transition_to(&self, kind: TaskKind, context: TaskContext) -> Result<(), BotError> {
        let _guard = self.transition_lock.lock().await;
        self.transition_locked(kind, context, false).await
    }

    /// 取消当前任务并回到 idle；idle 时不做任何事并返回 false
    pub async fn interrupt(&self, reason: &str) -> Result<bool, BotError> {
        let _guard = self.transition_lock.lock().await;
        self.interrupt_locked(None, reason).await
    }

    /// 仅当当前运行仍是 generation 时才取消；状态已被替换时返回 false
    pub async fn interrupt_if(&self, generation: u64, reason: &str) -> Result<bool, BotError> {
        let _guard = self.transition_lock.lock().await;
        self.interrupt_locked(Some(generation), reason).await
    }

    async fn interrupt_locked(&self, expected: Option<u64>, reason: &str) -> Result<bool, BotError> {
        let (kind, run) = {
            let cur = self.read();
            (cur.kind, cur.run.clone())
        };
        if kind == TaskKind::Idle {
            return Ok(false);
        }
        if expected.is_some_and(|g| g != run.generation) {
            tracing::debug!(task = %kind, generation = run.generation, reason, "Stale interrupt ignored");
            return Ok(false);
        }

        tracing::info!(task = %kind, reason, "Interrupting task");
        run.interrupt.raise(reason);
        if let Some(behavior) = self.behaviors.get(&kind) {
            if let Err(e) = behavior.interrupt(&run, reason).await {
                tracing::warn!(task = %kind, error = %e, "Interrupt hook failed");
            }
        }
        self.transition_locked(TaskKind::Idle, TaskContext::None, true)
            .await?;
        Ok(true)
    }

    /// tolerate_exit：完成 / 中断路径上 exit 出错只记日志，保证回到 idle
    async fn transition_locked(
        &self,
        kind: TaskKind,
        context: TaskContext,
        tolerate_exit: bool,
    ) -> Result<(), BotError> {
        let behavior = self.behaviors.get(&kind).cloned().ok_or_else(|| {
            BotError::new(ErrorKind::UnknownState, format!("Unknown state: {kind}"))
                .with_context("state", kind)
        })?;

        let (from, old_run) = {
            let cur = self.read();
            (cur.kind, cur.run.clone())
        };
        if let Some(old) = self.behaviors.get(&from) {
            if let Err(e) = old.exit(&old_run).await {
                if !tolerate_exit {
                    return Err(BotError::normalize(e).with_context("state", from));
                }
                tracing::warn!(task = %from, error = %e, "Exit hook failed");
            }
        }

        let run = self.swap(from, &old_run, kind, context);
        if let Err(e) = behavior.enter(&run).await {
            tracing::warn!(task = %kind, error = %e, "Enter hook failed, returning to idle");
            self.swap(kind, &run, TaskKind::Idle, TaskContext::None);
            return Err(BotError::normalize(e).with_context("state", kind));
        }
        if behavior.has_body() {
            self.spawn_body(behavior, run);
        }
        Ok(())
    }

    /// 替换当前状态：旧任务的中断标记被置位，generation 递增，记录历史并广播
    fn swap(&self, from: TaskKind, old_run: &TaskRun, kind: TaskKind, context: TaskContext) -> TaskRun {
        old_run.interrupt.raise("superseded");
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let run = TaskRun::new(
            generation,
            context.clone(),
            self.client.clone(),
            self.settings.clone(),
        );
        {
            let mut cur = self.current.write().unwrap_or_else(|p| p.into_inner());
            *cur = ActiveState {
                kind,
                run: run.clone(),
            };
        }
        {
            let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
            if history.len() == self.history_capacity {
                history.pop_front();
            }
            history.push_back(TransitionRecord {
                from,
                to: kind,
                context: context.clone(),
                timestamp: Utc::now(),
                generation,
            });
        }
        tracing::info!(from = %from, to = %kind, generation, "State transition");
        // 没有订阅者时 send 返回 Err，忽略
        let _ = self.events.send(StateChange {
            from,
            to: kind,
            context,
            generation,
        });
        run
    }

    /// 任务体在内层 task 中运行，panic 也按失败处理，保证最终回到 idle
    fn spawn_body(&self, behavior: Arc<dyn TaskBehavior>, run: TaskRun) {
        let machine = self.this.clone();
        let kind = behavior.kind();
        tokio::spawn(async move {
            let body_run = run.clone();
            let result = match tokio::spawn(async move { behavior.body(body_run).await }).await {
                Ok(result) => result,
                Err(join_error) => Err(anyhow::Error::new(
                    BotError::new(ErrorKind::Unclassified, format!("Task body aborted: {join_error}"))
                        .with_context("task", kind),
                )),
            };
            let Some(machine) = machine.upgrade() else {
                return;
            };
            match result {
                Ok(()) => tracing::debug!(task = %kind, generation = run.generation, "Task body finished"),
                Err(e) if run.interrupt.is_raised() => {
                    tracing::debug!(task = %kind, error = %e, "Task body ended after interrupt");
                }
                Err(e) => machine.report_failure(e, kind, run.generation).await,
            }
            machine.finish(run.generation).await;
        });
    }

    async fn report_failure(&self, error: anyhow::Error, kind: TaskKind, generation: u64) {
        match self.failure_handler.get().and_then(Weak::upgrade) {
            Some(handler) => handler.handle_task_failure(error, kind, generation).await,
            None => tracing::error!(task = %kind, error = %error, "Task failed with no failure handler bound"),
        }
    }

    /// 任务体结束：generation 仍匹配才切回 idle
    async fn finish(&self, generation: u64) {
        let _guard = self.transition_lock.lock().await;
        if self.generation() != generation {
            tracing::debug!(generation, "Stale task completion ignored");
            return;
        }
        if let Err(e) = self
            .transition_locked(TaskKind::Idle, TaskContext::None, true)
            .await
        {
            tracing::error!(error = %e, "Failed to return to idle after task completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::default_behaviors;
    use crate::world::{BlockPos, SimulatedWorld};
    use std::time::Duration;

    fn machine(world: Arc<SimulatedWorld>) -> Arc<TaskStateMachine> {
        let settings = TaskSettings {
            dig_delay: Duration::from_millis(100),
            ..TaskSettings::default()
        };
        TaskStateMachine::new(default_behaviors(), world, Arc::new(settings), 10)
    }

    struct Recorder(Mutex<Vec<(String, TaskKind)>>);

    #[async_trait]
    impl TaskFailureHandler for Recorder {
        async fn handle_task_failure(&self, error: anyhow::Error, task: TaskKind, _generation: u64) {
            self.0.lock().unwrap().push((error.to_string(), task));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_returns_to_idle_on_arrival() {
        let world = Arc::new(SimulatedWorld::new("bot"));
        let sm = machine(world.clone());
        let goal = BlockPos::new(10, 20, 30);

        sm.transition_to(TaskKind::Moving, TaskContext::Goto { goal })
            .await
            .unwrap();
        assert!(sm.is_busy());
        assert_eq!(sm.current_context(), TaskContext::Goto { goal });

        sm.wait_idle().await;
        assert_eq!(sm.current_task(), TaskKind::Idle);
        assert_eq!(world.current_position().unwrap().block(), goal);
        assert!(world.chat_log().contains(&"Reached the destination.".to_string()));

        let history = sm.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to, TaskKind::Moving);
        assert_eq!(history[1].to, TaskKind::Idle);
    }

    #[tokio::test]
    async fn test_interrupt_when_idle_is_noop() {
        let world = Arc::new(SimulatedWorld::new("bot"));
        let sm = machine(world.clone());
        assert!(!sm.interrupt("user_request").await.unwrap());
        assert!(!sm.interrupt("user_request").await.unwrap());
        assert_eq!(sm.generation(), 0);
        assert!(sm.history().is_empty());
        assert!(world.chat_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_mining_between_digs() {
        let world = Arc::new(
            SimulatedWorld::new("bot")
                .with_block(BlockPos::new(1, 64, 0), "stone")
                .with_block(BlockPos::new(2, 64, 0), "stone")
                .with_block(BlockPos::new(3, 64, 0), "stone"),
        );
        let sm = machine(world.clone());
        sm.transition_to(
            TaskKind::Mining,
            TaskContext::Mine {
                block: "stone".into(),
                count: 3,
            },
        )
        .await
        .unwrap();

        // 第一次挖掘后处于 100ms 的节奏等待中
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(world.dug().len(), 1);
        assert!(sm.interrupt("user_request").await.unwrap());
        assert!(!sm.is_busy());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(world.dug().len(), 1);
        assert!(world
            .chat_log()
            .contains(&"⚠️ Mining interrupted (reason: user_request)".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_completion_does_not_touch_new_state() {
        let world = Arc::new(SimulatedWorld::new("bot").with_player("Dave", crate::world::Position::new(3.0, 64.0, 3.0)));
        let sm = machine(world.clone());
        let goal = BlockPos::new(5, 64, 5);
        sm.transition_to(TaskKind::Moving, TaskContext::Goto { goal })
            .await
            .unwrap();
        let first = sm.generation();

        // 直接切换到 following，旧的移动任务体会因 superseded 结束
        sm.transition_to(
            TaskKind::Following,
            TaskContext::Follow {
                target: "Dave".into(),
            },
        )
        .await
        .unwrap();
        assert!(sm.generation() > first);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sm.current_task(), TaskKind::Following);

        assert!(sm.interrupt("user_request").await.unwrap());
        assert_eq!(sm.current_task(), TaskKind::Idle);
        assert_eq!(world.following(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_failure_is_reported_and_returns_to_idle() {
        let world = Arc::new(SimulatedWorld::new("bot"));
        let sm = machine(world.clone());
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let handler: Arc<dyn TaskFailureHandler> = recorder.clone();
        sm.bind_failure_handler(Arc::downgrade(&handler));

        sm.transition_to(
            TaskKind::Mining,
            TaskContext::Mine {
                block: "diamond_ore".into(),
                count: 1,
            },
        )
        .await
        .unwrap();
        sm.wait_idle().await;

        let failures = recorder.0.lock().unwrap().clone();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.contains("No diamond_ore found"));
        assert_eq!(failures[0].1, TaskKind::Mining);
    }

    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let world = Arc::new(SimulatedWorld::new("bot"));
        let mut behaviors = default_behaviors();
        behaviors.remove(&TaskKind::Building);
        let sm = TaskStateMachine::new(behaviors, world, Arc::new(TaskSettings::default()), 10);

        let err = sm
            .transition_to(
                TaskKind::Building,
                TaskContext::Build {
                    structure: crate::tasks::Structure::Tower,
                    size: 3,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownState);
        assert!(!sm.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_execute_follows_current_state() {
        let world = Arc::new(SimulatedWorld::new("bot").with_player("Erin", crate::world::Position::new(1.0, 64.0, 1.0)));
        let sm = machine(world);
        assert!(sm.can_execute("mine"));
        sm.transition_to(
            TaskKind::Following,
            TaskContext::Follow {
                target: "Erin".into(),
            },
        )
        .await
        .unwrap();
        assert!(sm.can_execute("stop"));
        assert!(!sm.can_execute("mine"));
        assert!(!sm.can_execute("inv"));
    }
    struct PanickyMove;

    #[async_trait]
    impl TaskBehavior for PanickyMove {
        fn kind(&self) -> TaskKind {
            TaskKind::Moving
        }

        async fn body(&self, _run: TaskRun) -> anyhow::Result<()> {
            panic!("pathfinder state corrupted");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_body_returns_to_idle() {
        let world = Arc::new(SimulatedWorld::new("bot"));
        let mut behaviors = default_behaviors();
        behaviors.insert(TaskKind::Moving, Arc::new(PanickyMove));
        let sm = TaskStateMachine::new(behaviors, world, Arc::new(TaskSettings::default()), 10);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let handler: Arc<dyn TaskFailureHandler> = recorder.clone();
        sm.bind_failure_handler(Arc::downgrade(&handler));

        sm.transition_to(TaskKind::Moving, TaskContext::Goto { goal: BlockPos::new(1, 64, 1) })
            .await
            .unwrap();
        sm.wait_idle().await;

        assert!(!sm.is_busy());
        let failures = recorder.0.lock().unwrap().clone();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1, TaskKind::Moving);

        // 之后仍可以开始新任务
        sm.transition_to(TaskKind::Moving, TaskContext::Goto { goal: BlockPos::new(2, 64, 2) })
            .await
            .unwrap();
        assert_eq!(sm.current_task(), TaskKind::Moving);
    }

    struct StickyFollow;

    #[async_trait]
    impl TaskBehavior for StickyFollow {
        fn kind(&self) -> TaskKind {
            TaskKind::Following
        }

        async fn body(&self, run: TaskRun) -> anyhow::Result<()> {
            run.interrupt.raised().await;
            Ok(())
        }

        async fn exit(&self, _run: &TaskRun) -> anyhow::Result<()> {
            anyhow::bail!("could not clear follow goal")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_hook_error_keeps_current_state() {
        let world = Arc::new(SimulatedWorld::new("bot"));
        let mut behaviors = default_behaviors();
        behaviors.insert(TaskKind::Following, Arc::new(StickyFollow));
        let sm = TaskStateMachine::new(behaviors, world, Arc::new(TaskSettings::default()), 10);

        sm.transition_to(TaskKind::Following, TaskContext::Follow { target: "Fay".into() })
            .await
            .unwrap();
        let generation = sm.generation();

        let err = sm
            .transition_to(TaskKind::Moving, TaskContext::Goto { goal: BlockPos::new(3, 64, 3) })
            .await
            .unwrap_err();
        assert!(err.message.contains("could not clear follow goal"));
        assert_eq!(err.context["state"], "following");
        assert_eq!(sm.current_task(), TaskKind::Following);
        assert_eq!(sm.generation(), generation);
        assert_eq!(sm.history().len(), 1);

        // 中断路径容忍 exit 错误
        assert!(sm.interrupt("user_request").await.unwrap());
        assert_eq!(sm.current_task(), TaskKind::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_if_ignores_replaced_run() {
        let world = Arc::new(SimulatedWorld::new("bot").with_travel(Duration::from_secs(1), 3));
        let sm = machine(world);
        sm.transition_to(TaskKind::Moving, TaskContext::Goto { goal: BlockPos::new(4, 64, 4) })
            .await
            .unwrap();
        let first = sm.generation();
        sm.interrupt("user_request").await.unwrap();
        sm.transition_to(TaskKind::Moving, TaskContext::Goto { goal: BlockPos::new(8, 64, 8) })
            .await
            .unwrap();

        assert!(!sm.interrupt_if(first, "error").await.unwrap());
        assert_eq!(sm.current_task(), TaskKind::Moving);
        let current = sm.generation();
        assert!(sm.interrupt_if(current, "error").await.unwrap());
        assert!(!sm.is_busy());
    }
}
