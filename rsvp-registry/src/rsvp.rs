use chrono::Utc;
use rsvp_core::{
    AttendanceStatus, Collection, DataStore, Filter, Guest, Notifier, SessionCache, MAX_COMPANIONS,
};
use rsvp_shared::models::events::{rsvp_link, InvitationEvent};
use rsvp_shared::Masked;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::reservation::ReservationService;
use crate::{RegistryError, RegistryResult};

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 100;

/// Details stamped onto every invitation message.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDetails {
    pub date: String,
    pub time: String,
    pub location: String,
    pub rsvp_base_url: String,
}

/// A guest's answer to the invitation
#[derive(Debug, Clone, Deserialize)]
pub struct RsvpSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub companions: i32,
    pub status: AttendanceStatus,
}

/// Attendance state machine for guests.
///
/// `pending` is only ever the stored default; submissions must move a
/// guest to `attending` or `not_attending`, and may do so repeatedly.
pub struct RsvpService {
    store: Arc<dyn DataStore>,
    reservations: Arc<ReservationService>,
    notifier: Arc<dyn Notifier>,
    event: EventDetails,
}

impl RsvpService {
    pub fn new(
        store: Arc<dyn DataStore>,
        reservations: Arc<ReservationService>,
        notifier: Arc<dyn Notifier>,
        event: EventDetails,
    ) -> Self {
        Self { store, reservations, notifier, event }
    }

    /// Create or update the session's guest record.
    ///
    /// `guest_hint` is the id carried by an invitation link; without it the
    /// session's cached guest is reopened. Leaving `attending` releases every
    /// gift the guest holds.
    pub async fn submit(
        &self,
        cache: &SessionCache,
        guest_hint: Option<Uuid>,
        submission: RsvpSubmission,
    ) -> RegistryResult<Guest> {
        let companions = normalize_companions(submission.status, submission.companions)?;

        let guest = match self.resolve_existing(cache, guest_hint).await? {
            Some(existing) => self.update_guest(existing, submission.status, companions).await?,
            None => {
                let name = validate_name(&submission.name)?;
                let guest = self.create_guest(name, submission.status, companions).await?;
                self.dispatch_invitation(&guest);
                guest
            }
        };

        // Sweep on every non-attending answer so a retried submission still releases
        if !guest.status.unlocks_registry() {
            self.reservations.release_all(cache, guest.id).await?;
        }

        cache.remember_guest(&guest).await;
        Ok(guest)
    }

    /// The session's guest, re-read from the store.
    pub async fn current_guest(&self, cache: &SessionCache) -> RegistryResult<Option<Guest>> {
        let cached = match cache.guest().await {
            Some(guest) => guest,
            None => return Ok(None),
        };

        match self.find_guest(cached.id).await? {
            Some(guest) => {
                if guest != cached {
                    cache.remember_guest(&guest).await;
                }
                Ok(Some(guest))
            }
            None => {
                info!(
                    session = cache.session(),
                    guest_id = %cached.id,
                    "Cached guest vanished from store"
                );
                cache.forget_guest().await;
                cache.forget_reservation().await;
                Ok(None)
            }
        }
    }

    pub async fn guest(&self, guest_id: Uuid) -> RegistryResult<Guest> {
        self.find_guest(guest_id)
            .await?
            .ok_or(RegistryError::GuestNotFound(guest_id))
    }

    async fn resolve_existing(
        &self,
        cache: &SessionCache,
        guest_hint: Option<Uuid>,
    ) -> RegistryResult<Option<Guest>> {
        if let Some(guest_id) = guest_hint {
            return self.guest(guest_id).await.map(Some);
        }

        let cached = match cache.guest().await {
            Some(guest) => guest,
            None => return Ok(None),
        };

        let found = self.find_guest(cached.id).await?;
        if found.is_none() {
            warn!(
                session = cache.session(),
                guest_id = %cached.id,
                "Dropping cached guest unknown to store"
            );
            cache.forget_guest().await;
        }
        Ok(found)
    }

    async fn find_guest(&self, guest_id: Uuid) -> RegistryResult<Option<Guest>> {
        let guest = self
            .store
            .select(Collection::Guests, &Filter::new().eq("id", json!(guest_id)), None)
            .await?
            .into_iter()
            .next()
            .map(Guest::from_row)
            .transpose()?;
        Ok(guest)
    }

    async fn create_guest(
        &self,
        name: String,
        status: AttendanceStatus,
        companions: u8,
    ) -> RegistryResult<Guest> {
        let row = self
            .store
            .insert(
                Collection::Guests,
                json!({ "name": name, "companions": companions, "status": status.as_str() }),
            )
            .await?;
        let guest = Guest::from_row(row)?;

        info!(
            guest_id = %guest.id,
            name = %Masked(&guest.name),
            %status,
            companions,
            "Guest created"
        );
        Ok(guest)
    }

    // Name is fixed at creation; only status and companions change.
    async fn update_guest(
        &self,
        existing: Guest,
        status: AttendanceStatus,
        companions: u8,
    ) -> RegistryResult<Guest> {
        let row = self
            .store
            .update(
                Collection::Guests,
                &Filter::new().eq("id", json!(existing.id)),
                json!({ "companions": companions, "status": status.as_str() }),
            )
            .await?
            .into_iter()
            .next()
            .ok_or(RegistryError::GuestNotFound(existing.id))?;
        let guest = Guest::from_row(row)?;

        info!(
            guest_id = %guest.id,
            from = %existing.status,
            to = %guest.status,
            companions,
            "RSVP updated"
        );
        Ok(guest)
    }

    fn dispatch_invitation(&self, guest: &Guest) {
        let invitation = InvitationEvent {
            guest_id: guest.id,
            guest_name: Masked(guest.name.clone()),
            event_date: self.event.date.clone(),
            event_time: self.event.time.clone(),
            event_location: self.event.location.clone(),
            rsvp_link: rsvp_link(&self.event.rsvp_base_url, guest.id),
            requested_at: Utc::now(),
        };
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            if let Err(e) = notifier.send_invitation(&invitation).await {
                warn!(guest_id = %invitation.guest_id, "Invitation not sent: {}", e);
            }
        });
    }
}

fn validate_name(name: &str) -> RegistryResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 {
        return Err(RegistryError::Validation("Name is required".to_string()));
    }
    if len < MIN_NAME_LEN {
        return Err(RegistryError::Validation(format!(
            "Name must be at least {} characters",
            MIN_NAME_LEN
        )));
    }
    if len > MAX_NAME_LEN {
        return Err(RegistryError::Validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn normalize_companions(status: AttendanceStatus, companions: i32) -> RegistryResult<u8> {
    match status {
        AttendanceStatus::Pending => Err(RegistryError::Validation(
            "Choose whether you are attending".to_string(),
        )),
        AttendanceStatus::NotAttending => Ok(0),
        AttendanceStatus::Attending => {
            if companions < 0 {
                return Err(RegistryError::Validation(
                    "Number of companions cannot be negative".to_string(),
                ));
            }
            if companions > MAX_COMPANIONS as i32 {
                return Err(RegistryError::Validation(format!(
                    "Maximum {} companions allowed",
                    MAX_COMPANIONS
                )));
            }
            Ok(companions as u8)
        }
    }
}
