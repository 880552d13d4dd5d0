//! 内存模拟世界（用于测试与本地演示，无需连接服务器）
//!
//! 预置方块、玩家、背包与掉落物；寻路按固定步数 + 步间延迟推进，stop_movement 可中途打断；
//! 支持按操作注入一次性失败，便于覆盖错误恢复路径。

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    BlockPos, Control, DroppedItem, GameClient, ItemStack, MobInfo, PlayerInfo, Position, Vitals,
};

/// 可注入失败的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    Chat,
    Goto,
    Follow,
    Dig,
    Place,
    StopMovement,
    Inventory,
    Container,
}

#[derive(Debug, Default)]
struct WorldState {
    position: Option<Position>,
    health: f32,
    food: u32,
    players: HashMap<String, Position>,
    blocks: HashMap<BlockPos, String>,
    inventory: Vec<ItemStack>,
    dropped: Vec<DroppedItem>,
    chat: Vec<String>,
    dug: Vec<BlockPos>,
    placed: Vec<(BlockPos, String)>,
    following: Option<String>,
    movement_epoch: u64,
    stop_count: u32,
    reset_count: u32,
    windows_closed: u32,
    containers: HashMap<BlockPos, Vec<ItemStack>>,
    open_container: Option<BlockPos>,
    time_of_day: u32,
    mobs: Vec<MobInfo>,
    controls: BTreeSet<Control>,
    control_log: Vec<(Control, bool)>,
    failures: HashMap<SimOp, VecDeque<String>>,
}

/// 模拟客户端
pub struct SimulatedWorld {
    username: String,
    state: Mutex<WorldState>,
    step_delay: Duration,
    travel_steps: u32,
    chat_sink: Option<mpsc::UnboundedSender<String>>,
}

impl SimulatedWorld {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            state: Mutex::new(WorldState {
                position: Some(Position::new(0.5, 64.0, 0.5)),
                health: 20.0,
                food: 20,
                ..WorldState::default()
            }),
            step_delay: Duration::from_millis(50),
            travel_steps: 3,
            chat_sink: None,
        }
    }

    pub fn with_position(self, position: Position) -> Self {
        self.lock().position = Some(position);
        self
    }

    pub fn with_block(self, at: BlockPos, name: &str) -> Self {
        self.lock().blocks.insert(at, name.to_string());
        self
    }

    pub fn with_player(self, username: &str, position: Position) -> Self {
        self.lock().players.insert(username.to_string(), position);
        self
    }

    pub fn with_item(self, name: &str, count: u32) -> Self {
        add_item(&mut self.lock().inventory, name, count);
        self
    }

    pub fn with_dropped(self, name: &str, position: Position) -> Self {
        self.lock().dropped.push(DroppedItem {
            name: name.to_string(),
            position,
        });
        self
    }

    /// 在 at 放置一个容器方块（block 如 "chest"）并预置内容
    pub fn with_container(self, at: BlockPos, block: &str, items: &[(&str, u32)]) -> Self {
        {
            let mut s = self.lock();
            s.blocks.insert(at, block.to_string());
            let contents = s.containers.entry(at).or_default();
            for (name, count) in items {
                add_item(contents, name, *count);
            }
        }
        self
    }

    pub fn with_time(self, ticks: u32) -> Self {
        self.lock().time_of_day = ticks % 24000;
        self
    }

    pub fn with_mob(self, kind: &str, position: Position) -> Self {
        self.lock().mobs.push(MobInfo {
            kind: kind.to_string(),
            position,
        });
        self
    }

    /// 每一步寻路的耗时与步数
    pub fn with_travel(mut self, step_delay: Duration, steps: u32) -> Self {
        self.step_delay = step_delay;
        self.travel_steps = steps.max(1);
        self
    }

    /// 聊天同时转发到通道（演示程序打印用）
    pub fn with_chat_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.chat_sink = Some(sink);
        self
    }

    /// 让下一次 op 调用以 message 失败
    pub fn fail_next(&self, op: SimOp, message: impl Into<String>) {
        self.lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(message.into());
    }

    pub fn chat_log(&self) -> Vec<String> {
        self.lock().chat.clone()
    }

    pub fn dug(&self) -> Vec<BlockPos> {
        self.lock().dug.clone()
    }

    pub fn placed(&self) -> Vec<(BlockPos, String)> {
        self.lock().placed.clone()
    }

    pub fn current_position(&self) -> Option<Position> {
        self.lock().position
    }

    pub fn following(&self) -> Option<String> {
        self.lock().following.clone()
    }

    pub fn stop_count(&self) -> u32 {
        self.lock().stop_count
    }

    pub fn reset_count(&self) -> u32 {
        self.lock().reset_count
    }

    pub fn windows_closed(&self) -> u32 {
        self.lock().windows_closed
    }

    pub fn container_items(&self, at: BlockPos) -> Vec<ItemStack> {
        self.lock().containers.get(&at).cloned().unwrap_or_default()
    }

    pub fn inventory_snapshot(&self) -> Vec<ItemStack> {
        self.lock().inventory.clone()
    }

    /// 当前按下的控制键
    pub fn active_controls(&self) -> Vec<Control> {
        self.lock().controls.iter().copied().collect()
    }

    /// 按时间顺序的控制键变化
    pub fn control_log(&self) -> Vec<(Control, bool)> {
        self.lock().control_log.clone()
    }

    /// 模拟机器人实体消失（如重生前）
    pub fn remove_position(&self) {
        self.lock().position = None;
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure(&self, op: SimOp) -> anyhow::Result<()> {
        match self.lock().failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }

    fn here(&self) -> anyhow::Result<Position> {
        self.lock()
            .position
            .ok_or_else(|| anyhow::anyhow!("Bot entity is not spawned"))
    }
}

fn add_item(inventory: &mut Vec<ItemStack>, name: &str, count: u32) {
    match inventory.iter_mut().find(|s| s.name == name) {
        Some(stack) => stack.count += count,
        None => inventory.push(ItemStack {
            name: name.to_string(),
            count,
        }),
    }
}

fn take_item(inventory: &mut Vec<ItemStack>, name: &str, count: u32) -> Option<u32> {
    let stack = inventory.iter_mut().find(|s| s.name == name && s.count > 0)?;
    let taken = count.min(stack.count);
    stack.count -= taken;
    inventory.retain(|s| s.count > 0);
    Some(taken)
}

#[async_trait]
impl GameClient for SimulatedWorld {
    fn username(&self) -> &str {
        &self.username
    }

    async fn chat(&self, message: &str) -> anyhow::Result<()> {
        self.take_failure(SimOp::Chat)?;
        self.lock().chat.push(message.to_string());
        if let Some(sink) = &self.chat_sink {
            let _ = sink.send(message.to_string());
        }
        Ok(())
    }

    async fn position(&self) -> anyhow::Result<Position> {
        self.here()
    }

    async fn vitals(&self) -> anyhow::Result<Vitals> {
        let s = self.lock();
        Ok(Vitals {
            health: s.health,
            food: s.food,
        })
    }

    async fn player_position(&self, username: &str) -> anyhow::Result<Option<Position>> {
        let s = self.lock();
        Ok(s.players
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(username))
            .map(|(_, pos)| *pos))
    }

    async fn find_blocks(
        &self,
        block: &str,
        max_distance: u32,
        count: usize,
    ) -> anyhow::Result<Vec<BlockPos>> {
        let here = self.here()?;
        let s = self.lock();
        let mut found: Vec<(f64, BlockPos)> = s
            .blocks
            .iter()
            .filter(|(_, name)| name.as_str() == block)
            .map(|(pos, _)| (pos.center().distance_to(here), *pos))
            .filter(|(d, _)| *d <= f64::from(max_distance))
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(found.into_iter().take(count).map(|(_, pos)| pos).collect())
    }

    async fn dig(&self, at: BlockPos) -> anyhow::Result<()> {
        self.take_failure(SimOp::Dig)?;
        let mut s = self.lock();
        let name = s
            .blocks
            .remove(&at)
            .ok_or_else(|| anyhow::anyhow!("No block to dig at {at}"))?;
        s.dug.push(at);
        add_item(&mut s.inventory, &name, 1);
        Ok(())
    }

    async fn place_block(&self, item: &str, at: BlockPos) -> anyhow::Result<()> {
        self.take_failure(SimOp::Place)?;
        let mut s = self.lock();
        if s.blocks.contains_key(&at) {
            anyhow::bail!("Cannot place block at {at}: occupied");
        }
        take_item(&mut s.inventory, item, 1)
            .ok_or_else(|| anyhow::anyhow!("Item {item} not in inventory"))?;
        s.blocks.insert(at, item.to_string());
        s.placed.push((at, item.to_string()));
        Ok(())
    }

    async fn goto(&self, goal: BlockPos) -> anyhow::Result<()> {
        self.take_failure(SimOp::Goto)?;
        let epoch = {
            let mut s = self.lock();
            s.movement_epoch += 1;
            s.following = None;
            s.movement_epoch
        };
        for _ in 0..self.travel_steps {
            tokio::time::sleep(self.step_delay).await;
            if self.lock().movement_epoch != epoch {
                anyhow::bail!("Path was stopped before the goal was reached");
            }
        }
        let mut s = self.lock();
        s.position = Some(goal.center());
        let (picked, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut s.dropped)
            .into_iter()
            .partition(|item| item.position.block() == goal);
        s.dropped = remaining;
        for item in picked {
            add_item(&mut s.inventory, &item.name, 1);
        }
        Ok(())
    }

    async fn follow(&self, username: &str, _range: f64) -> anyhow::Result<()> {
        self.take_failure(SimOp::Follow)?;
        let mut s = self.lock();
        if !s.players.keys().any(|name| name.eq_ignore_ascii_case(username)) {
            anyhow::bail!("Cannot set follow goal: player {username} not visible");
        }
        s.movement_epoch += 1;
        s.following = Some(username.to_string());
        Ok(())
    }

    async fn stop_movement(&self) -> anyhow::Result<()> {
        self.take_failure(SimOp::StopMovement)?;
        let mut s = self.lock();
        s.movement_epoch += 1;
        s.following = None;
        s.stop_count += 1;
        Ok(())
    }

    async fn reset_movements(&self) -> anyhow::Result<()> {
        self.lock().reset_count += 1;
        Ok(())
    }

    async fn inventory(&self) -> anyhow::Result<Vec<ItemStack>> {
        self.take_failure(SimOp::Inventory)?;
        Ok(self.lock().inventory.clone())
    }

    async fn equip(&self, item: &str) -> anyhow::Result<()> {
        if self.lock().inventory.iter().any(|s| s.name == item) {
            Ok(())
        } else {
            anyhow::bail!("Cannot equip {item}: item not in inventory")
        }
    }

    async fn toss(&self, item: &str, count: u32) -> anyhow::Result<u32> {
        let here = self.here()?;
        let mut s = self.lock();
        let tossed = take_item(&mut s.inventory, item, count)
            .ok_or_else(|| anyhow::anyhow!("Item {item} not in inventory"))?;
        for _ in 0..tossed {
            s.dropped.push(DroppedItem {
                name: item.to_string(),
                position: here,
            });
        }
        Ok(tossed)
    }

    async fn dropped_items(
        &self,
        filter: Option<&str>,
        radius: u32,
    ) -> anyhow::Result<Vec<DroppedItem>> {
        let here = self.here()?;
        let s = self.lock();
        Ok(s.dropped
            .iter()
            .filter(|item| item.position.distance_to(here) < f64::from(radius))
            .filter(|item| filter.map_or(true, |f| item.name.contains(f)))
            .cloned()
            .collect())
    }

    async fn open_container(&self, at: BlockPos) -> anyhow::Result<Vec<ItemStack>> {
        self.take_failure(SimOp::Container)?;
        let mut s = self.lock();
        let contents = s
            .containers
            .get(&at)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No container at {at}"))?;
        s.open_container = Some(at);
        Ok(contents)
    }

    async fn deposit(&self, item: &str, count: u32) -> anyhow::Result<u32> {
        self.take_failure(SimOp::Container)?;
        let mut s = self.lock();
        let at = s
            .open_container
            .ok_or_else(|| anyhow::anyhow!("No container window is open"))?;
        let moved = take_item(&mut s.inventory, item, count)
            .ok_or_else(|| anyhow::anyhow!("Item {item} not in inventory"))?;
        add_item(s.containers.entry(at).or_default(), item, moved);
        Ok(moved)
    }

    async fn withdraw(&self, item: &str, count: u32) -> anyhow::Result<u32> {
        self.take_failure(SimOp::Container)?;
        let mut s = self.lock();
        let at = s
            .open_container
            .ok_or_else(|| anyhow::anyhow!("No container window is open"))?;
        let moved = s
            .containers
            .get_mut(&at)
            .and_then(|contents| take_item(contents, item, count))
            .ok_or_else(|| anyhow::anyhow!("Item {item} not in container"))?;
        add_item(&mut s.inventory, item, moved);
        Ok(moved)
    }

    async fn close_window(&self) -> anyhow::Result<()> {
        let mut s = self.lock();
        s.open_container = None;
        s.windows_closed += 1;
        Ok(())
    }

    async fn time_of_day(&self) -> anyhow::Result<u32> {
        Ok(self.lock().time_of_day)
    }

    async fn nearby_players(&self) -> anyhow::Result<Vec<PlayerInfo>> {
        let s = self.lock();
        let mut players: Vec<PlayerInfo> = s
            .players
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(&self.username))
            .map(|(name, pos)| PlayerInfo {
                username: name.clone(),
                position: *pos,
            })
            .collect();
        players.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(players)
    }

    async fn nearby_mobs(&self, radius: u32) -> anyhow::Result<Vec<MobInfo>> {
        let here = self.here()?;
        let s = self.lock();
        Ok(s.mobs
            .iter()
            .filter(|mob| mob.position.distance_to(here) <= f64::from(radius))
            .cloned()
            .collect())
    }

    async fn block_at(&self, at: BlockPos) -> anyhow::Result<Option<String>> {
        Ok(self.lock().blocks.get(&at).cloned())
    }

    async fn set_control(&self, control: Control, active: bool) -> anyhow::Result<()> {
        let mut s = self.lock();
        if active {
            s.controls.insert(control);
        } else {
            s.controls.remove(&control);
        }
        s.control_log.push((control, active));
        Ok(())
    }

    async fn clear_controls(&self) -> anyhow::Result<()> {
        self.lock().controls.clear();
        Ok(())
    }
}
