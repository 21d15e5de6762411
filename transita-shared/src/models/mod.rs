pub mod bus;
pub mod route;
pub mod schedule;

pub use bus::{Bus, LayoutKind, Seat, SeatId, SeatType, Side};
pub use route::{FareOverride, Route};
pub use schedule::{PointTime, Schedule};
