//! 建造状态：用背包里的建材在身旁垒一座塔

use async_trait::async_trait;

use super::{Structure, TaskBehavior, TaskContext, TaskKind, TaskRun};
use crate::world::ItemStack;

/// 可用建材，按优先顺序
const BUILDING_MATERIALS: &[&str] = &[
    "cobblestone",
    "stone",
    "dirt",
    "oak_planks",
    "stone_bricks",
    "oak_log",
];

pub fn find_building_material(inventory: &[ItemStack]) -> Option<&str> {
    BUILDING_MATERIALS
        .iter()
        .copied()
        .find(|m| inventory.iter().any(|s| s.name == *m && s.count > 0))
}

pub struct BuildingTask;

#[async_trait]
impl TaskBehavior for BuildingTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Building
    }

    async fn body(&self, run: TaskRun) -> anyhow::Result<()> {
        let TaskContext::Build { structure, size } = run.context else {
            tracing::warn!("Building state entered without a structure");
            return Ok(());
        };

        let inventory = run.client.inventory().await?;
        let Some(material) = find_building_material(&inventory) else {
            run.say("I have no building materials (stone, cobblestone, wood, dirt).")
                .await;
            return Ok(());
        };

        run.say(&format!("Building a {structure} out of {material}..."))
            .await;
        let base = run.client.position().await?.block().offset(2, 0, 0);
        run.client.equip(material).await?;

        match structure {
            Structure::Tower => {
                for level in 0..size {
                    if run.interrupt.is_raised() {
                        return Ok(());
                    }
                    let at = base.offset(0, level as i32, 0);
                    run.client.place_block(material, at).await?;
                    if !run.interrupt.pause(run.settings.build_step_delay).await {
                        return Ok(());
                    }
                }
            }
        }

        run.say("Construction complete!").await;
        Ok(())
    }

    async fn interrupt(&self, run: &TaskRun, reason: &str) -> anyhow::Result<()> {
        run.say(&format!("⚠️ Construction interrupted (reason: {reason})"))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_priority() {
        let inv = vec![
            ItemStack { name: "dirt".into(), count: 3 },
            ItemStack { name: "cobblestone".into(), count: 1 },
        ];
        assert_eq!(find_building_material(&inv), Some("cobblestone"));
        assert_eq!(find_building_material(&[]), None);
    }
}
