//! Serde data file structs for session content definitions.
//!
//! These structs define the on-disk format for resource kinds, loot tables,
//! station configurations, goal templates, and level plans. They are
//! deserialized from RON, JSON, or TOML data files and then resolved into
//! engine types by [`crate::resolve`]. All cross-references are by name at
//! this layer; ids exist only after resolution.

use serde::Deserialize;

// ===========================================================================
// Resource kinds
// ===========================================================================

/// A resource kind definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct KindData {
    pub name: String,
    #[serde(default)]
    pub decay: DecayPolicyData,
}

/// On-disk decay policy. Lifespans are authored in seconds.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub enum DecayPolicyData {
    #[default]
    Static,
    Decays {
        lifespan: f64,
    },
    Consumable,
}

// ===========================================================================
// Loot tables
// ===========================================================================

/// A loot table definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct LootTableData {
    pub name: String,
    pub entries: Vec<LootEntryData>,
}

/// One weighted loot entry. A missing `kind` is an authored empty slot.
/// Percentages need not sum to 100; tables load exactly as written.
#[derive(Debug, Clone, Deserialize)]
pub struct LootEntryData {
    #[serde(default)]
    pub kind: Option<String>,
    pub percent: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

// ===========================================================================
// Stations
// ===========================================================================

/// A station configuration in a data file. Everything but the name has a
/// default, so stations author as tersely as their behavior allows.
#[derive(Debug, Clone, Deserialize)]
pub struct StationData {
    pub name: String,

    /// `(kind_name, amount)` input requirements.
    #[serde(default)]
    pub consumed: Vec<(String, u32)>,
    /// `(kind_name, amount)` production outputs.
    #[serde(default)]
    pub produced: Vec<(String, u32)>,

    #[serde(default)]
    pub production_trigger: TriggerData,
    #[serde(default)]
    pub consumption_trigger: TriggerData,
    #[serde(default)]
    pub mode: ModeData,

    #[serde(default)]
    pub work_duration: f64,
    #[serde(default)]
    pub production_interval: f64,
    #[serde(default)]
    pub consumption_interval: f64,
    #[serde(default)]
    pub cycle_interval: f64,
    #[serde(default = "default_max_decay")]
    pub max_decay: u32,

    #[serde(default)]
    pub single_use: bool,
    #[serde(default = "default_true")]
    pub spawn_instances: bool,
    #[serde(default)]
    pub scatter_radius: f64,

    #[serde(default)]
    pub production_capital: i64,
    #[serde(default)]
    pub consumption_capital: i64,

    #[serde(default)]
    pub goal_contributor: bool,

    #[serde(default)]
    pub has_input_area: bool,
    #[serde(default)]
    pub has_output_area: bool,

    #[serde(default)]
    pub aging: Option<AgingData>,
    #[serde(default)]
    pub upgrade: Option<UpgradeData>,
}

fn default_max_decay() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// On-disk trigger policy for production and consumption.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub enum TriggerData {
    #[default]
    None,
    Automatic,
    WhenWorked,
    WhenResourcesConsumed,
    Cycle,
}

/// On-disk production mode. `Station` successor names and `LootTable`
/// table names resolve against the rest of the bundle.
#[derive(Debug, Clone, Default, Deserialize)]
pub enum ModeData {
    #[default]
    Resource,
    Station {
        successors: Vec<String>,
    },
    LootTable {
        table: String,
    },
}

/// Observational aging: stage cadence in seconds and the stage count.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AgingData {
    pub cadence: f64,
    pub stages: u32,
}

/// Upgrade-on-consumption: the replacement station by name and the
/// countdown in seconds between arming and the swap.
#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeData {
    pub target: String,
    pub delay: f64,
}

// ===========================================================================
// Goal templates
// ===========================================================================

/// A goal template definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct GoalTemplateData {
    pub name: String,
    pub target_kind: String,
    pub required_count: u32,
    /// Seconds allowed before the goal fails.
    pub time_limit: f64,
    #[serde(default)]
    pub reward: i64,
    #[serde(default)]
    pub penalty: i64,
}

// ===========================================================================
// Level plans
// ===========================================================================

/// A level plan in a data file. `goals` references goal templates by name.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelPlanData {
    pub name: String,
    #[serde(default)]
    pub policy: PolicyData,
    pub goals: Vec<String>,
    #[serde(default)]
    pub release_interval: f64,
    #[serde(default = "default_max_active")]
    pub max_active_goals: usize,
    #[serde(default)]
    pub countdown: Option<f64>,
    #[serde(default)]
    pub completion_delay: f64,
    #[serde(default)]
    pub manual_release: bool,
}

fn default_max_active() -> usize {
    1
}

/// On-disk release policy.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub enum PolicyData {
    #[default]
    Sequential,
    RandomInterval,
}

// ===========================================================================
// TOML wrappers (TOML does not support top-level arrays)
// ===========================================================================

/// Wrapper for a list of kinds in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlKinds {
    pub kinds: Vec<KindData>,
}

/// Wrapper for a list of loot tables in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlLootTables {
    pub loot_tables: Vec<LootTableData>,
}

/// Wrapper for a list of stations in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlStations {
    pub stations: Vec<StationData>,
}

/// Wrapper for a list of goal templates in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlGoals {
    pub goals: Vec<GoalTemplateData>,
}

/// Wrapper for a list of level plans in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlLevels {
    pub levels: Vec<LevelPlanData>,
}

// ===========================================================================
// Tests
// ===========================================================================
