use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Upper bound on companions a guest may bring.
pub const MAX_COMPANIONS: u8 = 5;

/// Attendance status of a guest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Pending,
    Attending,
    NotAttending,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Pending => "pending",
            AttendanceStatus::Attending => "attending",
            AttendanceStatus::NotAttending => "not_attending",
        }
    }

    /// Only attending guests may touch the registry.
    pub fn unlocks_registry(&self) -> bool {
        matches!(self, AttendanceStatus::Attending)
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person invited to the event. One record per guest, owned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guest {
    pub id: Uuid,
    pub name: String,
    pub companions: u8,
    pub status: AttendanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Guest {
    /// Decode a store row.
    pub fn from_row(row: serde_json::Value) -> Result<Self, crate::StoreError> {
        serde_json::from_value(row).map_err(|e| crate::StoreError::Decode {
            message: format!("guest row: {}", e),
        })
    }
}
