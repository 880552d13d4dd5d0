//! 游戏客户端抽象
//!
//! 任务体与指令通过 GameClient 访问世界：位置/状态查询、方块与掉落物搜索、挖掘与放置、寻路、背包、容器。
//! 所有调用都视为可能失败的黑盒异步操作；协议与寻路算法由外部客户端负责。

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 方块坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn center(self) -> Position {
        Position::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y),
            f64::from(self.z) + 0.5,
        )
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// 实体的精确位置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn block(self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn distance_to(self, other: Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// 体力与饱食度
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vitals {
    pub health: f32,
    pub food: u32,
}

/// 背包中的一组物品
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

/// 地面上的掉落物
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedItem {
    pub name: String,
    pub position: Position,
}

/// 视野内的其他玩家
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerInfo {
    pub username: String,
    pub position: Position,
}

/// 附近的生物
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MobInfo {
    pub kind: String,
    pub position: Position,
}

/// 手动移动控制键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Forward,
    Back,
    Left,
    Right,
    Jump,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Control::Forward => "forward",
            Control::Back => "back",
            Control::Left => "left",
            Control::Right => "right",
            Control::Jump => "jump",
        })
    }
}

/// 游戏客户端 trait：机器人与世界交互的唯一出口
#[async_trait]
pub trait GameClient: Send + Sync {
    /// 机器人自己的用户名（用于忽略自身聊天）
    fn username(&self) -> &str;

    /// 发送一行聊天
    async fn chat(&self, message: &str) -> anyhow::Result<()>;

    async fn position(&self) -> anyhow::Result<Position>;

    async fn vitals(&self) -> anyhow::Result<Vitals>;

    /// 按用户名查找在线玩家位置（不区分大小写），不在视野内返回 None
    async fn player_position(&self, username: &str) -> anyhow::Result<Option<Position>>;

    /// 在半径内搜索指定名称的方块，按距离由近到远，最多 count 个
    async fn find_blocks(
        &self,
        block: &str,
        max_distance: u32,
        count: usize,
    ) -> anyhow::Result<Vec<BlockPos>>;

    async fn dig(&self, at: BlockPos) -> anyhow::Result<()>;

    /// 手持 item 并放置到 at
    async fn place_block(&self, item: &str, at: BlockPos) -> anyhow::Result<()>;

    /// 寻路到目标，到达后返回；被 stop_movement 打断或无路可走时返回错误
    async fn goto(&self, goal: BlockPos) -> anyhow::Result<()>;

    /// 持续跟随玩家（保持 range 距离），直到 stop_movement
    async fn follow(&self, username: &str, range: f64) -> anyhow::Result<()>;

    async fn stop_movement(&self) -> anyhow::Result<()>;

    /// 重新初始化寻路配置
    async fn reset_movements(&self) -> anyhow::Result<()>;

    async fn inventory(&self) -> anyhow::Result<Vec<ItemStack>>;

    async fn equip(&self, item: &str) -> anyhow::Result<()>;

    /// 丢弃物品，返回实际丢弃数量
    async fn toss(&self, item: &str, count: u32) -> anyhow::Result<u32>;

    /// 搜索半径内名称包含 filter 的掉落物（filter 为 None 表示全部）
    async fn dropped_items(
        &self,
        filter: Option<&str>,
        radius: u32,
    ) -> anyhow::Result<Vec<DroppedItem>>;

    /// 打开 at 处的容器，返回其中的物品
    async fn open_container(&self, at: BlockPos) -> anyhow::Result<Vec<ItemStack>>;

    /// 把背包中的 item 存入已打开的容器，返回实际存入数量
    async fn deposit(&self, item: &str, count: u32) -> anyhow::Result<u32>;

    /// 从已打开的容器取出 item，返回实际取出数量
    async fn withdraw(&self, item: &str, count: u32) -> anyhow::Result<u32>;

    /// 关闭当前打开的容器窗口（没有则无操作）
    async fn close_window(&self) -> anyhow::Result<()>;

    /// 游戏内时刻（0..24000 tick，0 为早上 6 点）
    async fn time_of_day(&self) -> anyhow::Result<u32>;

    /// 视野内的其他玩家（不含机器人自己）
    async fn nearby_players(&self) -> anyhow::Result<Vec<PlayerInfo>>;

    async fn nearby_mobs(&self, radius: u32) -> anyhow::Result<Vec<MobInfo>>;

    /// at 处的方块名；空气或未加载返回 None
    async fn block_at(&self, at: BlockPos) -> anyhow::Result<Option<String>>;

    async fn set_control(&self, control: Control, active: bool) -> anyhow::Result<()>;

    /// 松开所有控制键
    async fn clear_controls(&self) -> anyhow::Result<()>;
}
