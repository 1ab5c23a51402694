//! The content catalog: resource kinds, station configurations, loot tables.
//!
//! Authoring data is registered through [`CatalogBuilder`], cross-references
//! are backpatched in a mutation phase, and `build()` validates everything
//! into an immutable [`Catalog`]. Nothing in the catalog changes once a
//! session is running; runtime state lives in the world arenas.

use crate::fixed::Seconds;
use crate::id::*;
use crate::loot::LootTable;
use crate::station::{StationConfig, TriggerPolicy};
use std::collections::HashMap;

/// How instances of a resource kind behave over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DecayPolicy {
    /// Never expires on its own.
    Static,
    /// Expires `lifespan` seconds after spawn.
    Decays { lifespan: Seconds },
    /// Exists to be consumed; never expires, removed only by consumption.
    Consumable,
}

/// A resource kind definition. Immutable once the catalog is built.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResourceKindDef {
    pub name: String,
    pub decay: DecayPolicy,
}

/// Builder for constructing an immutable Catalog.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    kinds: Vec<ResourceKindDef>,
    kind_name_to_id: HashMap<String, KindId>,
    configs: Vec<StationConfig>,
    config_name_to_id: HashMap<String, StationConfigId>,
    loot_tables: Vec<LootTable>,
    loot_name_to_id: HashMap<String, LootTableId>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register a resource kind. Returns its ID.
    pub fn register_kind(&mut self, name: &str, decay: DecayPolicy) -> KindId {
        let id = KindId(self.kinds.len() as u32);
        self.kinds.push(ResourceKindDef {
            name: name.to_string(),
            decay,
        });
        self.kind_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Phase 1: Register a station configuration. Returns its ID.
    pub fn register_station(&mut self, config: StationConfig) -> StationConfigId {
        let id = StationConfigId(self.configs.len() as u32);
        self.config_name_to_id.insert(config.name.clone(), id);
        self.configs.push(config);
        id
    }

    /// Phase 1: Register a loot table. Returns its ID.
    pub fn register_loot_table(&mut self, table: LootTable) -> LootTableId {
        let id = LootTableId(self.loot_tables.len() as u32);
        self.loot_name_to_id.insert(table.name.clone(), id);
        self.loot_tables.push(table);
        id
    }

    /// Phase 2: Mutate a registered station config by name. Used to backpatch
    /// forward references (upgrade targets, successor lists).
    pub fn mutate_station<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut StationConfig),
    {
        let id = self
            .config_name_to_id
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        f(&mut self.configs[id.0 as usize]);
        Ok(())
    }

    /// Lookup kind ID by name.
    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.kind_name_to_id.get(name).copied()
    }

    /// Lookup station config ID by name.
    pub fn config_id(&self, name: &str) -> Option<StationConfigId> {
        self.config_name_to_id.get(name).copied()
    }

    /// Lookup loot table ID by name.
    pub fn loot_id(&self, name: &str) -> Option<LootTableId> {
        self.loot_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let kind_count = self.kinds.len();
        let config_count = self.configs.len();
        let loot_count = self.loot_tables.len();

        let mut seen = HashMap::new();
        for kind in &self.kinds {
            if seen.insert(kind.name.as_str(), ()).is_some() {
                return Err(CatalogError::DuplicateName(kind.name.clone()));
            }
            if let DecayPolicy::Decays { lifespan } = kind.decay
                && lifespan <= Seconds::ZERO
            {
                return Err(CatalogError::NonPositiveLifespan(kind.name.clone()));
            }
        }

        let check_kind = |id: KindId| {
            if (id.0 as usize) < kind_count {
                Ok(())
            } else {
                Err(CatalogError::InvalidKindRef(id))
            }
        };

        for table in &self.loot_tables {
            for entry in &table.entries {
                if let Some(kind) = entry.kind {
                    check_kind(kind)?;
                }
            }
        }

        let mut seen = HashMap::new();
        for config in &self.configs {
            if seen.insert(config.name.as_str(), ()).is_some() {
                return Err(CatalogError::DuplicateName(config.name.clone()));
            }
            for entry in config.consumed.iter().chain(config.produced.iter()) {
                check_kind(entry.kind)?;
            }
            for successor in config.successors() {
                if (successor.0 as usize) >= config_count {
                    return Err(CatalogError::InvalidConfigRef(successor));
                }
            }
            if let Some(table) = config.loot_table()
                && (table.0 as usize) >= loot_count
            {
                return Err(CatalogError::InvalidLootRef(table));
            }
            if let Some(upgrade) = &config.upgrade
                && (upgrade.target.0 as usize) >= config_count
            {
                return Err(CatalogError::InvalidConfigRef(upgrade.target));
            }
            validate_timing(config)?;
        }

        Ok(Catalog {
            kinds: self.kinds,
            kind_name_to_id: self.kind_name_to_id,
            configs: self.configs,
            config_name_to_id: self.config_name_to_id,
            loot_tables: self.loot_tables,
            loot_name_to_id: self.loot_name_to_id,
        })
    }
}

/// Interval-driven policies need positive periods or the catch-up loops in
/// the station tick would never terminate.
fn validate_timing(config: &StationConfig) -> Result<(), CatalogError> {
    let named = |what: &'static str| CatalogError::NonPositiveInterval {
        config: config.name.clone(),
        what,
    };
    if config.production_trigger == TriggerPolicy::Automatic
        && config.production_interval <= Seconds::ZERO
    {
        return Err(named("production_interval"));
    }
    if config.consumption_trigger == TriggerPolicy::Automatic
        && config.consumption_interval <= Seconds::ZERO
    {
        return Err(named("consumption_interval"));
    }
    if config.consumption_trigger == TriggerPolicy::Cycle && config.cycle_interval <= Seconds::ZERO
    {
        return Err(named("cycle_interval"));
    }
    let worked = config.production_trigger == TriggerPolicy::WhenWorked
        || config.consumption_trigger == TriggerPolicy::WhenWorked;
    if worked && config.work_duration <= Seconds::ZERO {
        return Err(named("work_duration"));
    }
    if let Some(aging) = &config.aging
        && aging.cadence <= Seconds::ZERO
    {
        return Err(named("aging.cadence"));
    }
    Ok(())
}

/// Immutable content catalog. Frozen after build(). Safe to share.
#[derive(Debug)]
pub struct Catalog {
    kinds: Vec<ResourceKindDef>,
    kind_name_to_id: HashMap<String, KindId>,
    configs: Vec<StationConfig>,
    config_name_to_id: HashMap<String, StationConfigId>,
    loot_tables: Vec<LootTable>,
    loot_name_to_id: HashMap<String, LootTableId>,
}

impl Catalog {
    pub fn kind(&self, id: KindId) -> Option<&ResourceKindDef> {
        self.kinds.get(id.0 as usize)
    }

    pub fn station_config(&self, id: StationConfigId) -> Option<&StationConfig> {
        self.configs.get(id.0 as usize)
    }

    pub fn loot_table(&self, id: LootTableId) -> Option<&LootTable> {
        self.loot_tables.get(id.0 as usize)
    }

    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.kind_name_to_id.get(name).copied()
    }

    pub fn config_id(&self, name: &str) -> Option<StationConfigId> {
        self.config_name_to_id.get(name).copied()
    }

    pub fn loot_id(&self, name: &str) -> Option<LootTableId> {
        self.loot_name_to_id.get(name).copied()
    }

    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn config_count(&self) -> usize {
        self.configs.len()
    }

    pub fn loot_table_count(&self) -> usize {
        self.loot_tables.len()
    }

    /// Decay policy for a kind; unknown ids report `Static` (no expiry).
    pub fn decay_policy(&self, id: KindId) -> DecayPolicy {
        self.kinds
            .get(id.0 as usize)
            .map(|k| k.decay)
            .unwrap_or(DecayPolicy::Static)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid kind reference: {0:?}")]
    InvalidKindRef(KindId),
    #[error("invalid station config reference: {0:?}")]
    InvalidConfigRef(StationConfigId),
    #[error("invalid loot table reference: {0:?}")]
    InvalidLootRef(LootTableId),
    #[error("kind '{0}' declares a non-positive lifespan")]
    NonPositiveLifespan(String),
    #[error("station config '{config}' declares a non-positive {what}")]
    NonPositiveInterval {
        config: String,
        what: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::secs;
    use crate::loot::LootEntry;
    use crate::station::{KindAmount, ProductionMode, StationConfig, UpgradeConfig};

    fn setup_builder() -> CatalogBuilder {
        let mut b = CatalogBuilder::new();
        let ore = b.register_kind("ore", DecayPolicy::Consumable);
        let bar = b.register_kind("bar", DecayPolicy::Static);
        let mut smelter = StationConfig::named("smelter");
        smelter.consumed = vec![KindAmount { kind: ore, amount: 3 }];
        smelter.produced = vec![KindAmount { kind: bar, amount: 1 }];
        smelter.production_trigger = TriggerPolicy::WhenWorked;
        smelter.consumption_trigger = TriggerPolicy::WhenWorked;
        smelter.work_duration = secs(5);
        b.register_station(smelter);
        b
    }

    #[test]
    fn register_and_build() {
        let builder = setup_builder();
        let catalog = builder.build().unwrap();
        assert_eq!(catalog.kind_count(), 2);
        assert_eq!(catalog.config_count(), 1);
        assert_eq!(catalog.loot_table_count(), 0);
    }

    #[test]
    fn lookup_by_name() {
        let builder = setup_builder();
        let catalog = builder.build().unwrap();
        assert!(catalog.kind_id("ore").is_some());
        assert!(catalog.config_id("smelter").is_some());
        assert!(catalog.kind_id("nonexistent").is_none());
    }

    #[test]
    fn mutate_station_backpatches_upgrade() {
        let mut builder = setup_builder();
        let hut = builder.register_station(StationConfig::named("hut"));
        builder
            .mutate_station("smelter", |config| {
                config.upgrade = Some(UpgradeConfig {
                    target: hut,
                    delay: secs(2),
                });
            })
            .unwrap();
        let catalog = builder.build().unwrap();
        let smelter = catalog
            .station_config(catalog.config_id("smelter").unwrap())
            .unwrap();
        assert_eq!(smelter.upgrade.as_ref().unwrap().target, hut);
    }

    #[test]
    fn mutate_nonexistent_fails() {
        let mut builder = setup_builder();
        let result = builder.mutate_station("nonexistent", |_| {});
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn invalid_kind_ref_in_config_fails() {
        let mut b = CatalogBuilder::new();
        let mut config = StationConfig::named("bad");
        config.produced = vec![KindAmount {
            kind: KindId(999),
            amount: 1,
        }];
        b.register_station(config);
        match b.build() {
            Err(CatalogError::InvalidKindRef(id)) => assert_eq!(id, KindId(999)),
            other => panic!("expected InvalidKindRef, got: {other:?}"),
        }
    }

    #[test]
    fn invalid_upgrade_target_fails() {
        let mut b = CatalogBuilder::new();
        let mut config = StationConfig::named("bad");
        config.upgrade = Some(UpgradeConfig {
            target: StationConfigId(42),
            delay: secs(1),
        });
        b.register_station(config);
        assert!(matches!(
            b.build(),
            Err(CatalogError::InvalidConfigRef(StationConfigId(42)))
        ));
    }

    #[test]
    fn invalid_loot_ref_fails() {
        let mut b = CatalogBuilder::new();
        let mut config = StationConfig::named("chest");
        config.production_mode = ProductionMode::LootTable {
            table: LootTableId(7),
        };
        b.register_station(config);
        assert!(matches!(
            b.build(),
            Err(CatalogError::InvalidLootRef(LootTableId(7)))
        ));
    }

    #[test]
    fn loot_entry_kind_refs_are_checked() {
        let mut b = CatalogBuilder::new();
        b.register_loot_table(LootTable {
            name: "drops".to_string(),
            entries: vec![LootEntry {
                kind: Some(KindId(5)),
                percent: crate::fixed::f64_to_fixed64(50.0),
                quantity: 1,
            }],
        });
        assert!(matches!(b.build(), Err(CatalogError::InvalidKindRef(_))));
    }

    #[test]
    fn zero_lifespan_rejected() {
        let mut b = CatalogBuilder::new();
        b.register_kind(
            "mayfly",
            DecayPolicy::Decays {
                lifespan: Seconds::ZERO,
            },
        );
        assert!(matches!(
            b.build(),
            Err(CatalogError::NonPositiveLifespan(_))
        ));
    }

    #[test]
    fn zero_interval_rejected_for_automatic() {
        let mut b = CatalogBuilder::new();
        let mut config = StationConfig::named("well");
        config.production_trigger = TriggerPolicy::Automatic;
        config.production_interval = Seconds::ZERO;
        b.register_station(config);
        assert!(matches!(
            b.build(),
            Err(CatalogError::NonPositiveInterval { .. })
        ));
    }

    #[test]
    fn duplicate_config_name_rejected() {
        let mut b = CatalogBuilder::new();
        b.register_station(StationConfig::named("hut"));
        b.register_station(StationConfig::named("hut"));
        assert!(matches!(b.build(), Err(CatalogError::DuplicateName(_))));
    }

    #[test]
    fn catalog_is_immutable_after_build() {
        // Catalog has no &mut self methods -- immutability enforced by the type system.
        let builder = setup_builder();
        let catalog = builder.build().unwrap();
        let _ = catalog.kind(KindId(0));
        let _ = catalog.station_config(StationConfigId(0));
        let _ = catalog.loot_table(LootTableId(0));
    }

    #[test]
    fn decay_policy_for_unknown_kind_is_static() {
        let builder = setup_builder();
        let catalog = builder.build().unwrap();
        assert_eq!(catalog.decay_policy(KindId(999)), DecayPolicy::Static);
    }

    #[test]
    fn empty_catalog_builds_successfully() {
        let b = CatalogBuilder::new();
        let catalog = b.build().unwrap();
        assert_eq!(catalog.kind_count(), 0);
        assert_eq!(catalog.config_count(), 0);
    }
}
