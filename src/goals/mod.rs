//! Goal-stack advancement rules.
//!
//! `advance` is a pure state transition over a trip's two goal stacks: it
//! never mutates its inputs and returns freshly built stacks plus the
//! level-up events that fired. Only the last entry of each stack is live;
//! completed entries stay in place as history.

use serde::Serialize;

use crate::catalog::RarityCatalog;
use crate::errors::AppError;
use crate::models::{CountGoal, GoalStatus, Species, SpecificGoal};

/// Maximum level for a species-specific goal.
pub const SPECIFIC_LEVEL_CAP: i64 = 3;
/// Maximum level for a count goal.
pub const COUNT_LEVEL_CAP: i64 = 5;
/// Birds required per count-goal level.
pub const BIRDS_PER_LEVEL: i64 = 3;

/// A goal completion recorded during one ingestion event.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LevelUp {
    #[serde(rename_all = "camelCase")]
    SpecificGoal {
        completed_level: i64,
        next_level: i64,
        next_species_id: String,
        next_species_name: String,
    },
    #[serde(rename_all = "camelCase")]
    CountGoal {
        completed_level: i64,
        next_level: i64,
        next_target: i64,
    },
}

/// Result of advancing a trip's goal stacks for one identified species.
#[derive(Debug, Clone)]
pub struct GoalAdvance {
    pub specific_goals: Vec<SpecificGoal>,
    pub count_goals: Vec<CountGoal>,
    pub level_ups: Vec<LevelUp>,
}

/// Advance both goal stacks for one identified species.
///
/// Specific rule: a live goal matching the identified species completes and a
/// new goal at `min(level + 1, cap)` is appended, targeting a species drawn
/// at that rarity tier. Count rule: the live counter always increments; on
/// reaching `level * 3` the goal completes and a fresh goal at the next level
/// is appended with a zeroed counter. Both rules may fire in the same event.
pub fn advance(
    specific_goals: &[SpecificGoal],
    count_goals: &[CountGoal],
    identified: &Species,
    catalog: &RarityCatalog,
) -> Result<GoalAdvance, AppError> {
    let mut specific = specific_goals.to_vec();
    let mut count = count_goals.to_vec();
    let mut level_ups = Vec::new();

    if let Some(live) = specific.last_mut() {
        if live.species_id == identified.id {
            live.status = GoalStatus::Success;
            let completed_level = live.level;
            let next_level = (completed_level + 1).min(SPECIFIC_LEVEL_CAP);

            let next_target = draw_next_target(catalog, next_level)?;
            level_ups.push(LevelUp::SpecificGoal {
                completed_level,
                next_level,
                next_species_id: next_target.id.clone(),
                next_species_name: next_target.name.clone(),
            });
            let image = next_target.display_image().map(String::from);
            specific.push(SpecificGoal {
                species_id: next_target.id,
                species_name: next_target.name,
                image,
                level: next_level,
                status: GoalStatus::InProgress,
            });
        }
    }

    if let Some(live) = count.last_mut() {
        live.birds_found += 1;
        if live.birds_found >= live.level * BIRDS_PER_LEVEL {
            live.status = GoalStatus::Success;
            let completed_level = live.level;
            let next_level = (completed_level + 1).min(COUNT_LEVEL_CAP);

            level_ups.push(LevelUp::CountGoal {
                completed_level,
                next_level,
                next_target: next_level * BIRDS_PER_LEVEL,
            });
            count.push(CountGoal {
                count: next_level * BIRDS_PER_LEVEL,
                level: next_level,
                birds_found: 0,
                status: GoalStatus::InProgress,
            });
        }
    }

    Ok(GoalAdvance {
        specific_goals: specific,
        count_goals: count,
        level_ups,
    })
}

/// Seed goal stacks for a fresh edugaming trip: one level-1 specific goal
/// targeting a tier-1 draw, one level-1 count goal.
pub fn initial_goals(
    catalog: &RarityCatalog,
) -> Result<(Vec<SpecificGoal>, Vec<CountGoal>), AppError> {
    let target = draw_next_target(catalog, 1)?;
    let image = target.display_image().map(String::from);
    let specific = vec![SpecificGoal {
        species_id: target.id,
        species_name: target.name,
        image,
        level: 1,
        status: GoalStatus::InProgress,
    }];
    let count = vec![CountGoal {
        count: BIRDS_PER_LEVEL,
        level: 1,
        birds_found: 0,
        status: GoalStatus::InProgress,
    }];
    Ok((specific, count))
}

/// Draw the target for the next specific goal at the given rarity tier.
///
/// An unpopulated tier falls back to a uniform whole-catalog draw so
/// progression never stalls on a sparsely seeded catalog.
fn draw_next_target(catalog: &RarityCatalog, tier: i64) -> Result<Species, AppError> {
    match catalog.sample_by_rarity(tier) {
        Err(AppError::NoSpeciesAtTier { tier }) => {
            tracing::warn!(tier, "no species at tier, falling back to uniform draw");
            catalog.sample_uniform()
        }
        other => other,
    }
}
