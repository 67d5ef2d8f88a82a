//! Order Components
//!
//! Transient work records standing in for an object while one tier step
//! of labor is in progress. Orders hold the only reference to their
//! target; the target refers back through a plain entity handle.

use bevy_ecs::prelude::*;
use std::collections::BTreeMap;

use upgrade_events::{DestroyReason, MaterialCount, OrderKind, Quality, QualityRange, RequirementSnapshot};

/// One required material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementLine {
    pub def_name: String,
    pub count: u32,
    pub quality: QualityRange,
}

impl RequirementLine {
    pub fn new(def_name: impl Into<String>, count: u32) -> Self {
        Self {
            def_name: def_name.into(),
            count,
            quality: QualityRange::Any,
        }
    }

    pub fn with_quality(mut self, quality: QualityRange) -> Self {
        self.quality = quality;
        self
    }

    pub fn snapshot(&self) -> RequirementSnapshot {
        RequirementSnapshot {
            def_name: self.def_name.clone(),
            count: self.count,
            quality: self.quality,
        }
    }
}

/// How an order is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyMode {
    /// Withdrawn or replaced. Delivered materials are refunded in full
    /// and the owning intent is left alone.
    Cancel,
    /// The tier step finished. Contents are used up.
    Complete,
    /// The construction attempt failed. Half the contents are refunded.
    FailConstruction,
    /// Destroyed from outside. Half the contents are left behind.
    Kill,
}

impl DestroyMode {
    /// Whether destruction in this mode cancels the owning intent.
    pub fn cancels_intent(self) -> bool {
        !matches!(self, DestroyMode::Cancel)
    }

    /// Fraction of delivered materials returned to the world.
    pub fn refund_fraction(self) -> f32 {
        match self {
            DestroyMode::Cancel => 1.0,
            DestroyMode::Complete => 0.0,
            DestroyMode::FailConstruction | DestroyMode::Kill => 0.5,
        }
    }

    pub fn reason(self) -> DestroyReason {
        match self {
            DestroyMode::Cancel => DestroyReason::Cancelled,
            DestroyMode::Complete => DestroyReason::Completed,
            DestroyMode::FailConstruction => DestroyReason::Failed,
            DestroyMode::Kill => DestroyReason::Killed,
        }
    }
}

/// Shared surface of both order kinds.
pub trait OwningOrder {
    const KIND: OrderKind;

    /// The object being upgraded.
    fn target(&self) -> Entity;

    fn work_left(&self) -> f32;

    fn work_total(&self) -> f32;

    /// Reduce remaining work. Returns true once no work is left.
    fn apply_work(&mut self, amount: f32) -> bool;

    fn progress(&self) -> f32 {
        let total = self.work_total();
        if total <= 0.0 {
            return 1.0;
        }
        (1.0 - self.work_left() / total).clamp(0.0, 1.0)
    }

    fn is_finished(&self) -> bool {
        self.work_left() <= 0.0
    }
}

/// Component: a pending structure upgrade placed over its target
#[derive(Component, Debug, Clone)]
pub struct ConstructionOrder {
    pub target: Entity,
    /// Target quality when the order was generated.
    pub generated_for_quality: Quality,
    pub needed: Vec<RequirementLine>,
    pub delivered: BTreeMap<String, u32>,
    pub work_left: f32,
    pub work_total: f32,
}

impl ConstructionOrder {
    pub fn new(
        target: Entity,
        generated_for_quality: Quality,
        needed: Vec<RequirementLine>,
        work_total: f32,
    ) -> Self {
        Self {
            target,
            generated_for_quality,
            needed,
            delivered: BTreeMap::new(),
            work_left: work_total,
            work_total,
        }
    }

    /// Needed minus delivered, dropping satisfied lines.
    pub fn remaining_materials(&self) -> Vec<RequirementLine> {
        self.needed
            .iter()
            .filter_map(|line| {
                let have = self.delivered.get(&line.def_name).copied().unwrap_or(0);
                let missing = line.count.saturating_sub(have);
                (missing > 0).then(|| RequirementLine {
                    def_name: line.def_name.clone(),
                    count: missing,
                    quality: line.quality,
                })
            })
            .collect()
    }

    pub fn is_fully_delivered(&self) -> bool {
        self.remaining_materials().is_empty()
    }

    pub fn deliver(&mut self, def_name: &str, count: u32) {
        *self.delivered.entry(def_name.to_string()).or_insert(0) += count;
    }

    pub fn delivered_materials(&self) -> Vec<MaterialCount> {
        self.delivered
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(def, count)| MaterialCount::new(def.clone(), *count))
            .collect()
    }
}

impl OwningOrder for ConstructionOrder {
    const KIND: OrderKind = OrderKind::Construction;

    fn target(&self) -> Entity {
        self.target
    }

    fn work_left(&self) -> f32 {
        self.work_left
    }

    fn work_total(&self) -> f32 {
        self.work_total
    }

    fn apply_work(&mut self, amount: f32) -> bool {
        self.work_left = (self.work_left - amount).max(0.0);
        self.is_finished()
    }
}

/// The bill a crafting order was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillRef {
    pub bench: Entity,
    pub bill_id: u64,
}

/// Component: an in-progress item upgrade holding its target
#[derive(Component, Debug, Clone)]
pub struct WorkOrder {
    pub target: Entity,
    /// Ingredients already consumed into the order.
    pub ingredients: Vec<MaterialCount>,
    pub work_left: f32,
    pub work_total: f32,
    pub bill: Option<BillRef>,
    pub creator: Option<Entity>,
}

impl OwningOrder for WorkOrder {
    const KIND: OrderKind = OrderKind::Crafting;

    fn target(&self) -> Entity {
        self.target
    }

    fn work_left(&self) -> f32 {
        self.work_left
    }

    fn work_total(&self) -> f32 {
        self.work_total
    }

    fn apply_work(&mut self, amount: f32) -> bool {
        self.work_left = (self.work_left - amount).max(0.0);
        self.is_finished()
    }
}
