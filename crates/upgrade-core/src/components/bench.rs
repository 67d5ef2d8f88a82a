//! Workbench Components
//!
//! Benches carry standing upgrade bills for portable items.

use bevy_ecs::prelude::*;
use std::collections::BTreeSet;

use upgrade_events::{BenchRecord, BillRecord, StoreModeRecord};

use super::world::Cell;

/// Sentinel search radius meaning "no limit".
pub const UNBOUNDED_RADIUS: f32 = 999.0;

/// Which definitions a bill or stockpile accepts. Empty accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThingFilter {
    allowed: BTreeSet<String>,
}

impl ThingFilter {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(defs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: defs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, def_name: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(def_name)
    }

    pub fn allowed_defs(&self) -> impl Iterator<Item = &String> {
        self.allowed.iter()
    }
}

/// Where a finished item is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreMode {
    DropOnFloor,
    #[default]
    BestStockpile,
    SpecificStockpile(u32),
}

impl From<StoreMode> for StoreModeRecord {
    fn from(mode: StoreMode) -> Self {
        match mode {
            StoreMode::DropOnFloor => StoreModeRecord::DropOnFloor,
            StoreMode::BestStockpile => StoreModeRecord::BestStockpile,
            StoreMode::SpecificStockpile(zone_id) => StoreModeRecord::SpecificStockpile { zone_id },
        }
    }
}

impl From<StoreModeRecord> for StoreMode {
    fn from(mode: StoreModeRecord) -> Self {
        match mode {
            StoreModeRecord::DropOnFloor => StoreMode::DropOnFloor,
            StoreModeRecord::BestStockpile => StoreMode::BestStockpile,
            StoreModeRecord::SpecificStockpile { zone_id } => StoreMode::SpecificStockpile(zone_id),
        }
    }
}

/// A standing instruction to upgrade matching items at a bench.
#[derive(Debug, Clone)]
pub struct UpgradeBill {
    pub id: u64,
    pub filter: ThingFilter,
    pub search_radius: f32,
    pub store_mode: StoreMode,
    pub suspended: bool,
    pub deleted: bool,
    pub min_skill: u32,
    /// Earliest tick the scheduler looks at this bill again.
    pub next_tick_to_search: u64,
}

impl UpgradeBill {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            filter: ThingFilter::allow_all(),
            search_radius: UNBOUNDED_RADIUS,
            store_mode: StoreMode::default(),
            suspended: false,
            deleted: false,
            min_skill: 0,
            next_tick_to_search: 0,
        }
    }

    pub fn with_filter(mut self, filter: ThingFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.search_radius = radius;
        self
    }

    pub fn with_store_mode(mut self, mode: StoreMode) -> Self {
        self.store_mode = mode;
        self
    }

    pub fn with_min_skill(mut self, skill: u32) -> Self {
        self.min_skill = skill;
        self
    }

    /// Whether the scheduler should consider this bill right now.
    pub fn should_do_now(&self, tick: u64) -> bool {
        !self.suspended && !self.deleted && tick >= self.next_tick_to_search
    }

    pub fn to_record(&self) -> BillRecord {
        BillRecord {
            id: self.id,
            allowed_defs: self.filter.allowed_defs().cloned().collect(),
            search_radius: self.search_radius,
            store_mode: self.store_mode.into(),
            suspended: self.suspended,
            deleted: self.deleted,
            min_skill: self.min_skill,
        }
    }

    pub fn from_record(record: &BillRecord) -> Self {
        Self {
            id: record.id,
            filter: ThingFilter::only(record.allowed_defs.iter().cloned()),
            search_radius: record.search_radius,
            store_mode: record.store_mode.into(),
            suspended: record.suspended,
            deleted: record.deleted,
            min_skill: record.min_skill,
            next_tick_to_search: 0,
        }
    }
}

/// Component: a structure where items are upgraded
#[derive(Component, Debug, Clone)]
pub struct Workbench {
    /// Unpowered or broken benches are not usable.
    pub usable: bool,
    /// Where the worker stands and ingredients are dropped.
    pub interaction_cell: Cell,
    pub bills: Vec<UpgradeBill>,
}

impl Workbench {
    pub fn new(interaction_cell: Cell) -> Self {
        Self {
            usable: true,
            interaction_cell,
            bills: Vec::new(),
        }
    }

    pub fn with_bill(mut self, bill: UpgradeBill) -> Self {
        self.bills.push(bill);
        self
    }

    pub fn bill(&self, bill_id: u64) -> Option<&UpgradeBill> {
        self.bills.iter().find(|b| b.id == bill_id)
    }

    pub fn bill_mut(&mut self, bill_id: u64) -> Option<&mut UpgradeBill> {
        self.bills.iter_mut().find(|b| b.id == bill_id)
    }

    /// Whether the bill exists and has not been deleted.
    pub fn has_live_bill(&self, bill_id: u64) -> bool {
        self.bill(bill_id).map(|b| !b.deleted).unwrap_or(false)
    }

    pub fn to_record(&self) -> BenchRecord {
        BenchRecord {
            usable: self.usable,
            interaction_cell: self.interaction_cell.into(),
            bills: self.bills.iter().map(UpgradeBill::to_record).collect(),
        }
    }

    pub fn from_record(record: &BenchRecord) -> Self {
        Self {
            usable: record.usable,
            interaction_cell: record.interaction_cell.into(),
            bills: record.bills.iter().map(UpgradeBill::from_record).collect(),
        }
    }
}
