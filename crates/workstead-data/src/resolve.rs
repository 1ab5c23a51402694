//! Resolution pipeline: parsed data files to engine types.
//!
//! Names resolve in two passes. Pass 1 registers every kind, loot table,
//! and station into a [`CatalogBuilder`], which doubles as the name
//! registry. Pass 2 backpatches station-to-station references (upgrade
//! targets, successor lists) once every station name is known, then
//! resolves goal templates and level plans. Any dangling name fails with
//! an [`DataLoadError::UnresolvedRef`] naming the file that contains the
//! reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use workstead_core::catalog::{Catalog, CatalogBuilder, DecayPolicy};
use workstead_core::fixed::f64_to_fixed64;
use workstead_core::id::{KindId, LootTableId, StationConfigId};
use workstead_core::loot::{LootEntry, LootTable};
use workstead_core::station::{
    AgingConfig, KindAmount, ProductionMode, StationConfig, TriggerPolicy, UpgradeConfig,
};
use workstead_goals::{GoalTemplate, LevelPlan, ReleasePolicy};

use crate::loader::{DataLoadError, deserialize_list, find_data_file, require_data_file};
use crate::schema::*;

// ===========================================================================
// GameData
// ===========================================================================

/// A fully resolved content bundle: the immutable catalog (kinds, loot
/// tables, station configs) and the session's level plans, ready to hand
/// to a world and a level director.
#[derive(Debug)]
pub struct GameData {
    pub catalog: Catalog,
    pub levels: Vec<LevelPlan>,
}

/// Load a content directory into a [`GameData`] bundle.
///
/// Expects one file per list: `kinds` (required), `loot_tables`,
/// `stations`, `goals`, and `levels` (all optional, defaulting to empty),
/// each in RON, JSON, or TOML.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let kinds_path = require_data_file(dir, "kinds")?;
    let kinds: Vec<KindData> = deserialize_list(&kinds_path, "kinds")?;
    let (loot_tables, loot_path) = load_optional_list::<LootTableData>(dir, "loot_tables")?;
    let (stations, stations_path) = load_optional_list::<StationData>(dir, "stations")?;
    let (goals, goals_path) = load_optional_list::<GoalTemplateData>(dir, "goals")?;
    let (levels, levels_path) = load_optional_list::<LevelPlanData>(dir, "levels")?;

    let mut builder = CatalogBuilder::new();
    register_kinds(&mut builder, &kinds, &kinds_path)?;
    register_loot_tables(&mut builder, &loot_tables, &loot_path)?;
    register_stations(&mut builder, &stations, &stations_path)?;
    let templates = resolve_goal_templates(&builder, &goals, &goals_path)?;
    let levels = resolve_level_plans(&levels, &templates, &levels_path)?;

    Ok(GameData {
        catalog: builder.build()?,
        levels,
    })
}

/// Parse an optional list file, returning the list and the path used for
/// error context. A missing file is an empty list.
fn load_optional_list<T: DeserializeOwned>(
    dir: &Path,
    base: &str,
) -> Result<(Vec<T>, PathBuf), DataLoadError> {
    match find_data_file(dir, base)? {
        Some(path) => {
            let items = deserialize_list(&path, base)?;
            Ok((items, path))
        }
        None => Ok((Vec::new(), dir.join(base))),
    }
}

// ===========================================================================
// Error constructors
// ===========================================================================

fn unresolved(file: &Path, name: &str, expected_kind: &'static str) -> DataLoadError {
    DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    }
}

fn duplicate(file: &Path, name: &str) -> DataLoadError {
    DataLoadError::DuplicateName {
        file: file.to_path_buf(),
        name: name.to_string(),
    }
}

// ===========================================================================
// Pass 1: registration
// ===========================================================================

fn register_kinds(
    builder: &mut CatalogBuilder,
    kinds: &[KindData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for kind in kinds {
        if builder.kind_id(&kind.name).is_some() {
            return Err(duplicate(file, &kind.name));
        }
        builder.register_kind(&kind.name, convert_decay(&kind.decay));
    }
    Ok(())
}

fn register_loot_tables(
    builder: &mut CatalogBuilder,
    tables: &[LootTableData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for table in tables {
        if builder.loot_id(&table.name).is_some() {
            return Err(duplicate(file, &table.name));
        }
        let entries = table
            .entries
            .iter()
            .map(|entry| {
                let kind = match &entry.kind {
                    Some(name) => Some(resolve_kind(builder, name, file)?),
                    None => None,
                };
                Ok(LootEntry {
                    kind,
                    percent: f64_to_fixed64(entry.percent),
                    quantity: entry.quantity,
                })
            })
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        builder.register_loot_table(LootTable {
            name: table.name.clone(),
            entries,
        });
    }
    Ok(())
}

/// Register every station, then backpatch station-to-station references.
/// Upgrade targets and successors may point forward in the file, so they
/// resolve only after the whole list is registered.
fn register_stations(
    builder: &mut CatalogBuilder,
    stations: &[StationData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for station in stations {
        if builder.config_id(&station.name).is_some() {
            return Err(duplicate(file, &station.name));
        }
        let config = resolve_station(builder, station, file)?;
        builder.register_station(config);
    }

    for station in stations {
        if let Some(upgrade) = &station.upgrade {
            let target = resolve_station_ref(builder, &upgrade.target, file)?;
            let delay = f64_to_fixed64(upgrade.delay);
            builder.mutate_station(&station.name, |config| {
                config.upgrade = Some(UpgradeConfig { target, delay });
            })?;
        }
        if let ModeData::Station { successors } = &station.mode {
            let successors = successors
                .iter()
                .map(|name| resolve_station_ref(builder, name, file))
                .collect::<Result<Vec<_>, DataLoadError>>()?;
            builder.mutate_station(&station.name, move |config| {
                config.production_mode = ProductionMode::Station { successors };
            })?;
        }
    }
    Ok(())
}

// ===========================================================================
// Pass 2: per-entry resolution
// ===========================================================================

fn resolve_station(
    builder: &CatalogBuilder,
    data: &StationData,
    file: &Path,
) -> Result<StationConfig, DataLoadError> {
    let mut config = StationConfig::named(&data.name);
    config.consumed = resolve_kind_amounts(builder, &data.consumed, file)?;
    config.produced = resolve_kind_amounts(builder, &data.produced, file)?;
    config.production_trigger = convert_trigger(data.production_trigger);
    config.consumption_trigger = convert_trigger(data.consumption_trigger);
    config.production_mode = match &data.mode {
        ModeData::Resource => ProductionMode::Resource,
        // Successor names are backpatched once every station is registered.
        ModeData::Station { .. } => ProductionMode::Station {
            successors: Vec::new(),
        },
        ModeData::LootTable { table } => ProductionMode::LootTable {
            table: resolve_loot_ref(builder, table, file)?,
        },
    };
    config.work_duration = f64_to_fixed64(data.work_duration);
    config.production_interval = f64_to_fixed64(data.production_interval);
    config.consumption_interval = f64_to_fixed64(data.consumption_interval);
    config.cycle_interval = f64_to_fixed64(data.cycle_interval);
    config.max_decay = data.max_decay;
    config.single_use = data.single_use;
    config.spawn_instances = data.spawn_instances;
    config.scatter_radius = f64_to_fixed64(data.scatter_radius);
    config.production_capital = data.production_capital;
    config.consumption_capital = data.consumption_capital;
    config.goal_contributor = data.goal_contributor;
    config.has_input_area = data.has_input_area;
    config.has_output_area = data.has_output_area;
    config.aging = data.aging.map(|aging| AgingConfig {
        cadence: f64_to_fixed64(aging.cadence),
        stages: aging.stages,
    });
    Ok(config)
}

fn resolve_kind_amounts(
    builder: &CatalogBuilder,
    pairs: &[(String, u32)],
    file: &Path,
) -> Result<Vec<KindAmount>, DataLoadError> {
    pairs
        .iter()
        .map(|(name, amount)| {
            Ok(KindAmount {
                kind: resolve_kind(builder, name, file)?,
                amount: *amount,
            })
        })
        .collect()
}

fn resolve_goal_templates(
    builder: &CatalogBuilder,
    goals: &[GoalTemplateData],
    file: &Path,
) -> Result<HashMap<String, GoalTemplate>, DataLoadError> {
    let mut templates = HashMap::new();
    for goal in goals {
        if templates.contains_key(&goal.name) {
            return Err(duplicate(file, &goal.name));
        }
        let template = GoalTemplate {
            name: goal.name.clone(),
            target_kind: resolve_kind(builder, &goal.target_kind, file)?,
            required_count: goal.required_count,
            time_limit: f64_to_fixed64(goal.time_limit),
            reward: goal.reward,
            penalty: goal.penalty,
        };
        templates.insert(goal.name.clone(), template);
    }
    Ok(templates)
}

fn resolve_level_plans(
    levels: &[LevelPlanData],
    templates: &HashMap<String, GoalTemplate>,
    file: &Path,
) -> Result<Vec<LevelPlan>, DataLoadError> {
    levels
        .iter()
        .map(|level| {
            let templates = level
                .goals
                .iter()
                .map(|name| {
                    templates
                        .get(name)
                        .cloned()
                        .ok_or_else(|| unresolved(file, name, "goal"))
                })
                .collect::<Result<Vec<_>, DataLoadError>>()?;
            Ok(LevelPlan {
                name: level.name.clone(),
                policy: convert_policy(level.policy),
                templates,
                release_interval: f64_to_fixed64(level.release_interval),
                max_active_goals: level.max_active_goals,
                countdown: level.countdown.map(f64_to_fixed64),
                completion_delay: f64_to_fixed64(level.completion_delay),
                manual_release: level.manual_release,
            })
        })
        .collect()
}

// ===========================================================================
// Name lookups and plain conversions
// ===========================================================================

fn resolve_kind(
    builder: &CatalogBuilder,
    name: &str,
    file: &Path,
) -> Result<KindId, DataLoadError> {
    builder
        .kind_id(name)
        .ok_or_else(|| unresolved(file, name, "kind"))
}

fn resolve_station_ref(
    builder: &CatalogBuilder,
    name: &str,
    file: &Path,
) -> Result<StationConfigId, DataLoadError> {
    builder
        .config_id(name)
        .ok_or_else(|| unresolved(file, name, "station"))
}

fn resolve_loot_ref(
    builder: &CatalogBuilder,
    name: &str,
    file: &Path,
) -> Result<LootTableId, DataLoadError> {
    builder
        .loot_id(name)
        .ok_or_else(|| unresolved(file, name, "loot table"))
}

fn convert_decay(data: &DecayPolicyData) -> DecayPolicy {
    match data {
        DecayPolicyData::Static => DecayPolicy::Static,
        DecayPolicyData::Decays { lifespan } => DecayPolicy::Decays {
            lifespan: f64_to_fixed64(*lifespan),
        },
        DecayPolicyData::Consumable => DecayPolicy::Consumable,
    }
}

fn convert_trigger(data: TriggerData) -> TriggerPolicy {
    match data {
        TriggerData::None => TriggerPolicy::None,
        TriggerData::Automatic => TriggerPolicy::Automatic,
        TriggerData::WhenWorked => TriggerPolicy::WhenWorked,
        TriggerData::WhenResourcesConsumed => TriggerPolicy::WhenResourcesConsumed,
        TriggerData::Cycle => TriggerPolicy::Cycle,
    }
}

fn convert_policy(data: PolicyData) -> ReleasePolicy {
    match data {
        PolicyData::Sequential => ReleasePolicy::Sequential,
        PolicyData::RandomInterval => ReleasePolicy::RandomInterval,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
