//! 参数校验
//!
//! 构造校验器闭包的工厂函数，以及指令体复用的解析函数。错误均为 Validation 类，消息直接展示给用户。

use crate::core::{BotContext, BotError};
use crate::world::BlockPos;

/// 坐标绝对值上限（世界边界）
pub const MAX_COORDINATE: f64 = 30_000_000.0;

/// 解析前三个参数为方块坐标；小数向下取整
pub fn parse_coordinates(args: &[String]) -> Result<BlockPos, BotError> {
    if args.len() < 3 {
        return Err(BotError::validation("Specify three coordinates: x y z"));
    }
    let mut coords = [0i32; 3];
    for (slot, arg) in coords.iter_mut().zip(&args[..3]) {
        let value: f64 = arg
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| BotError::validation("Invalid coordinates").with_context("arg", arg))?;
        if value.abs() > MAX_COORDINATE {
            return Err(BotError::validation("Coordinates out of range"));
        }
        *slot = value.floor() as i32;
    }
    Ok(BlockPos::new(coords[0], coords[1], coords[2]))
}

/// 解析可选的数量参数；缺省时返回 default
pub fn parse_count(arg: Option<&String>, default: u32, min: u32, max: u32) -> Result<u32, BotError> {
    let Some(arg) = arg else {
        return Ok(default);
    };
    arg.parse::<u32>()
        .ok()
        .filter(|n| (min..=max).contains(n))
        .ok_or_else(|| BotError::validation(format!("Count must be between {min} and {max}")))
}

/// 物品 / 方块名：小写，空格转下划线，去掉标记字符
pub fn sanitize_item_name(raw: &str) -> Result<String, BotError> {
    let name: String = raw
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '&' | '"' | '\''))
        .collect();
    if name.is_empty() {
        return Err(BotError::validation("Invalid item name"));
    }
    Ok(name)
}

pub fn coordinates() -> impl Fn(&BotContext, &str, &[String]) -> Result<(), BotError> + Send + Sync {
    |_: &BotContext, _: &str, args: &[String]| parse_coordinates(args).map(|_| ())
}

/// 第 index 个参数必须存在
pub fn require_arg(
    index: usize,
    message: &'static str,
) -> impl Fn(&BotContext, &str, &[String]) -> Result<(), BotError> + Send + Sync {
    move |_: &BotContext, _: &str, args: &[String]| {
        if args.get(index).map_or(true, |a| a.trim().is_empty()) {
            Err(BotError::validation(message))
        } else {
            Ok(())
        }
    }
}

/// 第 index 个参数若存在，必须是 min..=max 之间的整数；上限由配置给出
pub fn optional_count(
    index: usize,
    min: u32,
    max: fn(&BotContext) -> u32,
) -> impl Fn(&BotContext, &str, &[String]) -> Result<(), BotError> + Send + Sync {
    move |ctx: &BotContext, _: &str, args: &[String]| parse_count(args.get(index), min, min, max(ctx)).map(|_| ())
}
