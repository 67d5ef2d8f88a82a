//! Event Recording
//!
//! Events raised during a tick are buffered in [`TickEvents`] and written
//! to the JSONL log by [`flush_tick_events`].

pub mod logger;

use bevy_ecs::prelude::*;

use upgrade_events::{UpgradeEvent, UpgradeEventKind};

use crate::components::thing::ThingId;
use crate::components::world::WorldState;

pub use logger::EventLogger;

/// Resource: events raised during the current tick
#[derive(Resource, Debug)]
pub struct TickEvents {
    pub events: Vec<UpgradeEvent>,
    next_event_id: u64,
}

impl Default for TickEvents {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            next_event_id: 1,
        }
    }
}

impl TickEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id(&mut self) -> String {
        let id = format!("evt_{:08}", self.next_event_id);
        self.next_event_id += 1;
        id
    }

    pub fn push(&mut self, tick: u64, thing_id: Option<u64>, kind: UpgradeEventKind) {
        let event_id = self.generate_id();
        self.events.push(UpgradeEvent::new(event_id, tick, thing_id, kind));
    }

    pub fn drain(&mut self) -> Vec<UpgradeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events of one kind, by serialized name.
    pub fn of_kind<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UpgradeEvent> + 'a {
        self.events.iter().filter(move |e| e.kind.name() == name)
    }
}

/// Records an event about `thing` at the current tick.
///
/// Worlds without a [`TickEvents`] resource drop the event.
pub fn emit(world: &mut World, thing: Option<Entity>, kind: UpgradeEventKind) {
    let tick = world
        .get_resource::<WorldState>()
        .map(|w| w.current_tick)
        .unwrap_or(0);
    let thing_id = thing.and_then(|e| world.get::<ThingId>(e)).map(|id| id.0);
    if let Some(mut events) = world.get_resource_mut::<TickEvents>() {
        events.push(tick, thing_id, kind);
    }
}

/// System: write this tick's events to the log
pub fn flush_tick_events(mut tick_events: ResMut<TickEvents>, logger: Option<ResMut<EventLogger>>) {
    let events = tick_events.drain();
    let Some(mut logger) = logger else {
        return;
    };
    if let Err(e) = logger.log_batch(&events) {
        tracing::warn!("Failed to write {} events: {}", events.len(), e);
    }
}
