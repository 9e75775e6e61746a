use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::Guest;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Backend(String),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Durable per-session key/value storage for the current guest.
///
/// Holds at most one guest record and one reserved gift id per session.
/// Contents are a possibly-stale mirror of the store and are never used
/// to decide a reservation.
#[async_trait]
pub trait GuestCacheBackend: Send + Sync {
    async fn load_guest(&self, session: &str) -> CacheResult<Option<Guest>>;
    async fn store_guest(&self, session: &str, guest: &Guest) -> CacheResult<()>;
    async fn clear_guest(&self, session: &str) -> CacheResult<()>;

    async fn reserved_gift(&self, session: &str) -> CacheResult<Option<Uuid>>;
    async fn set_reserved_gift(&self, session: &str, gift_id: Uuid) -> CacheResult<()>;
    async fn clear_reserved_gift(&self, session: &str) -> CacheResult<()>;
}

/// Handle on one session's cache entries, passed explicitly into the
/// RSVP and reservation operations.
///
/// Reads degrade to "nothing cached" and writes are dropped when the
/// backend fails; both are logged.
#[derive(Clone)]
pub struct SessionCache {
    session: String,
    backend: Arc<dyn GuestCacheBackend>,
}

impl SessionCache {
    pub fn new(session: impl Into<String>, backend: Arc<dyn GuestCacheBackend>) -> Self {
        Self { session: session.into(), backend }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub async fn guest(&self) -> Option<Guest> {
        match self.backend.load_guest(&self.session).await {
            Ok(guest) => guest,
            Err(e) => {
                tracing::warn!(session = %self.session, "Guest cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn remember_guest(&self, guest: &Guest) {
        if let Err(e) = self.backend.store_guest(&self.session, guest).await {
            tracing::warn!(session = %self.session, "Guest cache write failed: {}", e);
        }
    }

    pub async fn forget_guest(&self) {
        if let Err(e) = self.backend.clear_guest(&self.session).await {
            tracing::warn!(session = %self.session, "Guest cache clear failed: {}", e);
        }
    }

    pub async fn reserved_gift(&self) -> Option<Uuid> {
        match self.backend.reserved_gift(&self.session).await {
            Ok(gift) => gift,
            Err(e) => {
                tracing::warn!(session = %self.session, "Reserved gift cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn remember_reservation(&self, gift_id: Uuid) {
        if let Err(e) = self.backend.set_reserved_gift(&self.session, gift_id).await {
            tracing::warn!(session = %self.session, "Reserved gift cache write failed: {}", e);
        }
    }

    pub async fn forget_reservation(&self) {
        if let Err(e) = self.backend.clear_reserved_gift(&self.session).await {
            tracing::warn!(session = %self.session, "Reserved gift cache clear failed: {}", e);
        }
    }

    /// Clears the reservation entry only if it still points at `gift_id`.
    pub async fn forget_reservation_of(&self, gift_id: Uuid) {
        if self.reserved_gift().await == Some(gift_id) {
            self.forget_reservation().await;
        }
    }
}
