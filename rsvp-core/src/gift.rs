use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Availability of a registry item as stored
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GiftStatus {
    Available,
    Reserved,
}

impl GiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftStatus::Available => "available",
            GiftStatus::Reserved => "reserved",
        }
    }
}

/// A registry item that at most one guest can claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gift {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: GiftStatus,
    #[serde(default)]
    pub reserved_by: Option<Uuid>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gift {
    pub fn from_row(row: serde_json::Value) -> Result<Self, crate::StoreError> {
        serde_json::from_value(row).map_err(|e| crate::StoreError::Decode {
            message: format!("gift row: {}", e),
        })
    }
}

/// Row of the `gift_reservations` join collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GiftReservation {
    pub id: Uuid,
    pub gift_id: Uuid,
    pub guest_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl GiftReservation {
    pub fn from_row(row: serde_json::Value) -> Result<Self, crate::StoreError> {
        serde_json::from_value(row).map_err(|e| crate::StoreError::Decode {
            message: format!("reservation row: {}", e),
        })
    }
}

/// Where the claim of a guest on a gift is recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationModel {
    /// `gifts.reserved_by`, written with a conditional update.
    #[default]
    Column,
    /// One row per claim in `gift_reservations`, unique on `gift_id`.
    JoinTable,
}

/// Status of a gift relative to the guest looking at it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    ReservedByMe,
    ReservedByOther,
}

impl Availability {
    /// Derive the viewer-relative status from the owning guest, if any.
    pub fn derive(holder: Option<Uuid>, viewer: Option<Uuid>) -> Self {
        match (holder, viewer) {
            (None, _) => Availability::Available,
            (Some(holder), Some(viewer)) if holder == viewer => Availability::ReservedByMe,
            (Some(_), _) => Availability::ReservedByOther,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GiftView {
    #[serde(flatten)]
    pub gift: Gift,
    pub availability: Availability,
}
