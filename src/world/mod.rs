//! 世界交互层：游戏客户端抽象与内存模拟实现

pub mod simulated;
pub mod traits;

pub use simulated::{SimOp, SimulatedWorld};
pub use traits::{
    BlockPos, Control, DroppedItem, GameClient, ItemStack, MobInfo, PlayerInfo, Position, Vitals,
};
