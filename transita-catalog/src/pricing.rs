use serde::{Deserialize, Serialize};
use transita_shared::models::{Route, Seat, SeatType};

/// Fixed per-type seat prices. Seat prices are recomputed from this
/// table whenever a seat's type changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatPriceTable {
    pub seater: i32,
    pub semi_sleeper: i32,
    pub sleeper: i32,
}

impl Default for SeatPriceTable {
    fn default() -> Self {
        Self {
            seater: 500,
            semi_sleeper: 750,
            sleeper: 1100,
        }
    }
}

impl SeatPriceTable {
    pub fn price(&self, seat_type: SeatType) -> i32 {
        match seat_type {
            SeatType::Seater => self.seater,
            SeatType::SemiSleeper => self.semi_sleeper,
            SeatType::Sleeper => self.sleeper,
        }
    }
}

/// Total fare quoted at booking time: the sum of the selected seats'
/// prices plus the route fare for the chosen (pickup, drop) pair.
pub fn quote(route: &Route, pickup: &str, drop: &str, seats: &[&Seat]) -> i32 {
    let seat_total: i32 = seats.iter().map(|seat| seat.price).sum();
    seat_total + route.fare(pickup, drop)
}
