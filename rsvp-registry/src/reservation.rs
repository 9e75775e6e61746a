use rsvp_core::{
    AttendanceStatus, Availability, Collection, DataStore, Filter, Gift, GiftReservation,
    GiftStatus, GiftView, Guest, OrderBy, ReservationModel, SessionCache,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{RegistryError, RegistryResult};

/// Result of a successful `reserve`
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Reserved {
    Created,
    /// The caller already held this gift; nothing was written.
    AlreadyHeld,
}

/// Result of a successful `unreserve`
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Released {
    Released,
    /// Nobody held the gift; nothing was written.
    AlreadyAvailable,
}

/// What a guest sees when opening the registry
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum RegistryView {
    /// The guest's own reservation, fetched on its own.
    Focused { gift: GiftView },
    Full { gifts: Vec<GiftView> },
}

/// Decides who holds which gift.
///
/// The store is the only authority: every claim is a single conditional
/// write (`column`) or an insert guarded by a unique index (`join_table`),
/// and a lost write is classified with one follow-up read.
pub struct ReservationService {
    store: Arc<dyn DataStore>,
    model: ReservationModel,
}

impl ReservationService {
    pub fn new(store: Arc<dyn DataStore>, model: ReservationModel) -> Self {
        Self { store, model }
    }

    pub fn model(&self) -> ReservationModel {
        self.model
    }

    /// Claim `gift_id` for `guest_id`.
    pub async fn reserve(
        &self,
        cache: &SessionCache,
        gift_id: Uuid,
        guest_id: Uuid,
    ) -> RegistryResult<Reserved> {
        self.require_attending(guest_id).await?;

        let outcome = match self.model {
            ReservationModel::Column => self.reserve_column(gift_id, guest_id).await?,
            ReservationModel::JoinTable => self.reserve_join(gift_id, guest_id).await?,
        };

        if outcome == Reserved::Created {
            self.revoke_if_declined(gift_id, guest_id).await?;
        }

        cache.remember_reservation(gift_id).await;
        info!(%gift_id, %guest_id, ?outcome, "Gift reserved");
        Ok(outcome)
    }

    /// Drop the claim of `guest_id` on `gift_id`.
    pub async fn unreserve(
        &self,
        cache: &SessionCache,
        gift_id: Uuid,
        guest_id: Uuid,
    ) -> RegistryResult<Released> {
        self.require_attending(guest_id).await?;

        let outcome = match self.model {
            ReservationModel::Column => self.unreserve_column(gift_id, guest_id).await?,
            ReservationModel::JoinTable => self.unreserve_join(gift_id, guest_id).await?,
        };

        cache.forget_reservation_of(gift_id).await;
        info!(%gift_id, %guest_id, ?outcome, "Gift released");
        Ok(outcome)
    }

    /// Every gift, ordered by name, annotated relative to `viewer`.
    pub async fn list(&self, viewer: Option<Uuid>) -> RegistryResult<Vec<GiftView>> {
        let gifts = self
            .store
            .select(Collection::Gifts, &Filter::new(), Some(&OrderBy::asc("name")))
            .await?
            .into_iter()
            .map(Gift::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let views = match self.model {
            ReservationModel::Column => gifts
                .into_iter()
                .map(|gift| {
                    let holder = gift.reserved_by;
                    annotate(gift, holder, viewer)
                })
                .collect(),
            ReservationModel::JoinTable => {
                let holders: HashMap<Uuid, Uuid> = self
                    .reservations(&Filter::new())
                    .await?
                    .into_iter()
                    .map(|r| (r.gift_id, r.guest_id))
                    .collect();
                gifts
                    .into_iter()
                    .map(|gift| {
                        let holder = holders.get(&gift.id).copied();
                        annotate(gift, holder, viewer)
                    })
                    .collect()
            }
        };

        Ok(views)
    }

    /// A single gift, annotated relative to `viewer`.
    pub async fn gift_view(
        &self,
        gift_id: Uuid,
        viewer: Option<Uuid>,
    ) -> RegistryResult<Option<GiftView>> {
        let gift = match self.fetch_gift(gift_id).await? {
            Some(gift) => gift,
            None => return Ok(None),
        };

        let holder = match self.model {
            ReservationModel::Column => gift.reserved_by,
            ReservationModel::JoinTable => self.holder_of(gift_id).await?,
        };

        Ok(Some(annotate(gift, holder, viewer)))
    }

    /// Render the registry for a session, reconciling its cached reservation
    /// against the store.
    pub async fn refresh(
        &self,
        cache: &SessionCache,
        viewer: Option<Uuid>,
    ) -> RegistryResult<RegistryView> {
        let cached = cache.reserved_gift().await;

        if let Some(gift_id) = cached {
            match viewer {
                Some(viewer) => match self.gift_view(gift_id, Some(viewer)).await? {
                    Some(view) if view.availability == Availability::ReservedByMe => {
                        return Ok(RegistryView::Focused { gift: view });
                    }
                    _ => {
                        info!(
                            session = cache.session(),
                            %gift_id,
                            "Cached reservation no longer held, invalidating"
                        );
                        cache.forget_reservation().await;
                    }
                },
                None => cache.forget_reservation().await,
            }
        }

        let gifts = self.list(viewer).await?;

        // Store says we hold something the cache forgot about or had wrong
        if let Some(mine) = gifts.iter().find(|v| v.availability == Availability::ReservedByMe) {
            cache.remember_reservation(mine.gift.id).await;
        }

        Ok(RegistryView::Full { gifts })
    }

    /// Release every gift held by `guest_id`, whatever its attendance.
    /// Returns the released gift ids.
    pub async fn release_all(
        &self,
        cache: &SessionCache,
        guest_id: Uuid,
    ) -> RegistryResult<Vec<Uuid>> {
        let released = match self.model {
            ReservationModel::Column => self
                .store
                .update(
                    Collection::Gifts,
                    &Filter::new().eq("reserved_by", json!(guest_id)),
                    json!({ "status": GiftStatus::Available.as_str(), "reserved_by": null }),
                )
                .await?
                .into_iter()
                .map(Gift::from_row)
                .map(|gift| gift.map(|g| g.id))
                .collect::<Result<Vec<_>, _>>()?,
            ReservationModel::JoinTable => {
                let held: Vec<Uuid> = self
                    .reservations(&Filter::new().eq("guest_id", json!(guest_id)))
                    .await?
                    .into_iter()
                    .map(|r| r.gift_id)
                    .collect();
                if !held.is_empty() {
                    self.store
                        .delete(
                            Collection::GiftReservations,
                            &Filter::new().eq("guest_id", json!(guest_id)),
                        )
                        .await?;
                    for gift_id in &held {
                        self.mirror_release(*gift_id, guest_id).await;
                    }
                }
                held
            }
        };

        if !released.is_empty() {
            cache.forget_reservation().await;
            info!(%guest_id, count = released.len(), "Released all reservations of guest");
        }

        Ok(released)
    }

    async fn reserve_column(&self, gift_id: Uuid, guest_id: Uuid) -> RegistryResult<Reserved> {
        let won = self
            .store
            .update(
                Collection::Gifts,
                &Filter::new().eq("id", json!(gift_id)).is_null("reserved_by"),
                json!({ "status": GiftStatus::Reserved.as_str(), "reserved_by": guest_id }),
            )
            .await?;

        if !won.is_empty() {
            return Ok(Reserved::Created);
        }

        let gift = self
            .fetch_gift(gift_id)
            .await?
            .ok_or(RegistryError::GiftNotFound(gift_id))?;

        match gift.reserved_by {
            Some(holder) if holder == guest_id => Ok(Reserved::AlreadyHeld),
            _ => Err(RegistryError::AlreadyReserved(gift_id)),
        }
    }

    async fn reserve_join(&self, gift_id: Uuid, guest_id: Uuid) -> RegistryResult<Reserved> {
        if self.fetch_gift(gift_id).await?.is_none() {
            return Err(RegistryError::GiftNotFound(gift_id));
        }

        let inserted = self
            .store
            .insert(
                Collection::GiftReservations,
                json!({ "gift_id": gift_id, "guest_id": guest_id }),
            )
            .await;

        match inserted {
            Ok(_) => {
                self.mirror_reserve(gift_id, guest_id).await;
                Ok(Reserved::Created)
            }
            Err(e) if e.is_constraint_violation() => match self.holder_of(gift_id).await? {
                Some(holder) if holder == guest_id => Ok(Reserved::AlreadyHeld),
                _ => Err(RegistryError::AlreadyReserved(gift_id)),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn unreserve_column(&self, gift_id: Uuid, guest_id: Uuid) -> RegistryResult<Released> {
        let released = self
            .store
            .update(
                Collection::Gifts,
                &Filter::new()
                    .eq("id", json!(gift_id))
                    .eq("reserved_by", json!(guest_id)),
                json!({ "status": GiftStatus::Available.as_str(), "reserved_by": null }),
            )
            .await?;

        if !released.is_empty() {
            return Ok(Released::Released);
        }

        let gift = self
            .fetch_gift(gift_id)
            .await?
            .ok_or(RegistryError::GiftNotFound(gift_id))?;

        match gift.reserved_by {
            None => Ok(Released::AlreadyAvailable),
            Some(_) => Err(RegistryError::NotOwner(gift_id)),
        }
    }

    async fn unreserve_join(&self, gift_id: Uuid, guest_id: Uuid) -> RegistryResult<Released> {
        let removed = self
            .store
            .delete(
                Collection::GiftReservations,
                &Filter::new()
                    .eq("gift_id", json!(gift_id))
                    .eq("guest_id", json!(guest_id)),
            )
            .await?;

        if removed > 0 {
            self.mirror_release(gift_id, guest_id).await;
            return Ok(Released::Released);
        }

        if self.holder_of(gift_id).await?.is_some() {
            return Err(RegistryError::NotOwner(gift_id));
        }

        match self.fetch_gift(gift_id).await? {
            Some(_) => Ok(Released::AlreadyAvailable),
            None => Err(RegistryError::GiftNotFound(gift_id)),
        }
    }

    // The gift row mirrors the join table in `join_table` mode. A failed
    // mirror write leaves the reservation itself intact; `list` derives
    // status from the join table.
    async fn mirror_reserve(&self, gift_id: Uuid, guest_id: Uuid) {
        let result = self
            .store
            .update(
                Collection::Gifts,
                &Filter::new().eq("id", json!(gift_id)),
                json!({ "status": GiftStatus::Reserved.as_str(), "reserved_by": guest_id }),
            )
            .await;
        if let Err(e) = result {
            warn!(%gift_id, "Failed to mirror reservation onto gift: {}", e);
        }
    }

    async fn mirror_release(&self, gift_id: Uuid, guest_id: Uuid) {
        let result = self
            .store
            .update(
                Collection::Gifts,
                &Filter::new()
                    .eq("id", json!(gift_id))
                    .eq("reserved_by", json!(guest_id)),
                json!({ "status": GiftStatus::Available.as_str(), "reserved_by": null }),
            )
            .await;
        if let Err(e) = result {
            warn!(%gift_id, "Failed to mirror release onto gift: {}", e);
        }
    }

    // The attendance check and the claim are separate statements. A decline
    // that lands between them is caught here and the fresh claim is undone.
    async fn revoke_if_declined(&self, gift_id: Uuid, guest_id: Uuid) -> RegistryResult<()> {
        let still_attending = self
            .find_guest(guest_id)
            .await?
            .is_some_and(|guest| guest.status.unlocks_registry());
        if still_attending {
            return Ok(());
        }

        let undone = match self.model {
            ReservationModel::Column => self.unreserve_column(gift_id, guest_id).await.map(|_| ()),
            ReservationModel::JoinTable => self.unreserve_join(gift_id, guest_id).await.map(|_| ()),
        };
        match undone {
            // A concurrent sweep already released it and someone else took it
            Ok(()) | Err(RegistryError::NotOwner(_)) => {}
            Err(e) => return Err(e),
        }

        info!(%gift_id, %guest_id, "Guest declined during reservation, claim revoked");
        Err(RegistryError::NotAttending(guest_id))
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

    async fn require_attending(&self, guest_id: Uuid) -> RegistryResult<Guest> {
        let guest = self
            .find_guest(guest_id)
            .await?
            .ok_or(RegistryError::GuestNotFound(guest_id))?;

        if guest.status != AttendanceStatus::Attending {
            return Err(RegistryError::NotAttending(guest_id));
        }

        Ok(guest)
    }

    async fn fetch_gift(&self, gift_id: Uuid) -> RegistryResult<Option<Gift>> {
        let gift = self
            .store
            .select(Collection::Gifts, &Filter::new().eq("id", json!(gift_id)), None)
            .await?
            .into_iter()
            .next()
            .map(Gift::from_row)
            .transpose()?;
        Ok(gift)
    }

    async fn reservations(&self, filter: &Filter) -> RegistryResult<Vec<GiftReservation>> {
        let rows = self
            .store
            .select(Collection::GiftReservations, filter, None)
            .await?
            .into_iter()
            .map(GiftReservation::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn holder_of(&self, gift_id: Uuid) -> RegistryResult<Option<Uuid>> {
        let holder = self
            .reservations(&Filter::new().eq("gift_id", json!(gift_id)))
            .await?
            .into_iter()
            .next()
            .map(|r| r.guest_id);
        Ok(holder)
    }
}

fn annotate(mut gift: Gift, holder: Option<Uuid>, viewer: Option<Uuid>) -> GiftView {
    gift.reserved_by = holder;
    gift.status = if holder.is_some() { GiftStatus::Reserved } else { GiftStatus::Available };
    GiftView {
        availability: Availability::derive(holder, viewer),
        gift,
    }
}
