pub mod booking;
pub mod models;
pub mod payment;
pub mod reservation;

pub use booking::{BookingError, BookingFinalizer};
pub use models::{
    Booking, BookingStatus, PassengerInfo, PaymentState, Reservation, ReservationStatus, TicketInfo,
};
pub use payment::{PaymentError, PaymentGateway, PaymentOutcome, PaymentSession, SandboxGateway};
pub use reservation::{ReservationError, ReservationManager, DEFAULT_TTL_SECS};
