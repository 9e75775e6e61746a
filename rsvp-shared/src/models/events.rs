use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::pii::Masked;

/// Request for the transactional mailer to send an invitation/confirmation
/// to a freshly created guest. Field names follow the mail template.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InvitationEvent {
    pub guest_id: Uuid,
    pub guest_name: Masked<String>,
    pub event_date: String,
    pub event_time: String,
    pub event_location: String,
    pub rsvp_link: String,
    pub requested_at: DateTime<Utc>,
}

/// Builds the link a guest follows to reopen their own RSVP.
pub fn rsvp_link(base_url: &str, guest_id: Uuid) -> String {
    format!("{}/?guestId={}", base_url.trim_end_matches('/'), guest_id)
}
