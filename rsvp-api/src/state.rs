use std::sync::Arc;
use rsvp_core::{DataStore, GuestCacheBackend, Notifier, ReservationModel, SessionCache};
use rsvp_registry::{EventDetails, ReservationService, RsvpService};

use crate::middleware::auth::SessionClaims;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub rsvp: Arc<RsvpService>,
    pub reservations: Arc<ReservationService>,
    pub guest_cache: Arc<dyn GuestCacheBackend>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DataStore>,
        guest_cache: Arc<dyn GuestCacheBackend>,
        notifier: Arc<dyn Notifier>,
        event: EventDetails,
        model: ReservationModel,
        auth: AuthConfig,
    ) -> Self {
        let reservations = Arc::new(ReservationService::new(store.clone(), model));
        let rsvp = Arc::new(RsvpService::new(store, reservations.clone(), notifier, event));

        Self { rsvp, reservations, guest_cache, auth }
    }

    /// Cache handle for the session named in the token.
    pub fn session_cache(&self, claims: &SessionClaims) -> SessionCache {
        SessionCache::new(claims.sub.clone(), self.guest_cache.clone())
    }
}
