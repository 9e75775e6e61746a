pub mod reservation;
pub mod rsvp;

pub use reservation::{RegistryView, Released, Reserved, ReservationService};
pub use rsvp::{EventDetails, RsvpService, RsvpSubmission};

use rsvp_core::StoreError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Gift {0} is already reserved")]
    AlreadyReserved(Uuid),

    #[error("Gift {0} is reserved by another guest")]
    NotOwner(Uuid),

    #[error("Guest {0} is not attending")]
    NotAttending(Uuid),

    #[error("Guest not found: {0}")]
    GuestNotFound(Uuid),

    #[error("Gift not found: {0}")]
    GiftNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
