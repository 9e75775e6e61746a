pub mod models;
pub mod pii;

pub use models::events::InvitationEvent;
pub use pii::Masked;
