use dashmap::DashMap;
use std::collections::BTreeSet;
use transita_shared::models::{Bus, Route, SeatId};
use uuid::Uuid;

/// Concurrent registry of buses and routes. The bus entries are the
/// source of each schedule's seat-id universe.
#[derive(Default)]
pub struct FleetRegistry {
    buses: DashMap<Uuid, Bus>,
    routes: DashMap<Uuid, Route>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bus(&self, bus: Bus) -> Uuid {
        let id = bus.id;
        self.buses.insert(id, bus);
        id
    }

    pub fn bus(&self, id: &Uuid) -> Option<Bus> {
        self.buses.get(id).map(|b| b.clone())
    }

    pub fn seat_universe(&self, bus_id: &Uuid) -> Option<BTreeSet<SeatId>> {
        self.buses.get(bus_id).map(|b| b.seat_universe())
    }

    pub fn register_route(&self, route: Route) -> Uuid {
        let id = route.id;
        self.routes.insert(id, route);
        id
    }

    pub fn route(&self, id: &Uuid) -> Option<Route> {
        self.routes.get(id).map(|r| r.clone())
    }
}
