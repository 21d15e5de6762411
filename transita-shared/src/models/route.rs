use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Custom fare for a specific (origin, drop) pair, replacing the
/// route's base price when it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareOverride {
    pub origin: String,
    pub drop: String,
    pub price: i32,
}

/// An operated connection between two cities with ordered boarding and
/// alighting points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub from: String,
    pub to: String,
    pub base_price: i32,
    pub pickup_points: Vec<String>,
    pub drop_points: Vec<String>,
    #[serde(default)]
    pub price_overrides: Vec<FareOverride>,
}

impl Route {
    /// Fare for a boarding/alighting pair: the first matching override,
    /// otherwise the base price.
    pub fn fare(&self, pickup: &str, drop: &str) -> i32 {
        self.price_overrides
            .iter()
            .find(|o| o.origin == pickup && o.drop == drop)
            .map(|o| o.price)
            .unwrap_or(self.base_price)
    }
}
