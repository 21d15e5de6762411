pub mod availability;
pub mod fleet;
pub mod layout;
pub mod pricing;

pub use availability::{
    AvailabilityError, AvailabilityManager, AvailabilityMode, DeleteOutcome, SeatAvailability,
};
pub use fleet::FleetRegistry;
pub use layout::{LayoutError, SeatLayoutBuilder};
pub use pricing::SeatPriceTable;
