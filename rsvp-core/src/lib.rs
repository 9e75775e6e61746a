pub mod guest;
pub mod gift;
pub mod store;
pub mod cache;
pub mod notify;
pub mod memory;

pub use guest::{AttendanceStatus, Guest, MAX_COMPANIONS};
pub use gift::{Availability, Gift, GiftReservation, GiftStatus, GiftView, ReservationModel};
pub use store::{Collection, ColumnType, Condition, DataStore, Filter, OrderBy, StoreError, StoreResult, TimedStore};
pub use cache::{CacheError, GuestCacheBackend, SessionCache};
pub use notify::{NoopNotifier, NotificationError, Notifier};
pub use memory::{MemoryGuestCache, MemoryStore};
