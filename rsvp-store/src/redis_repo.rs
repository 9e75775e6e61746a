use async_trait::async_trait;
use redis::AsyncCommands;
use rsvp_core::cache::{CacheError, CacheResult, GuestCacheBackend};
use rsvp_core::Guest;
use tracing::debug;
use uuid::Uuid;

fn guest_key(session: &str) -> String {
    format!("guest_cache:{}:guest", session)
}

fn reserved_gift_key(session: &str) -> String {
    format!("guest_cache:{}:reserved_gift", session)
}

fn backend(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

/// Redis-backed guest cache. Entries expire `ttl_seconds` after their
/// last write.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    ttl_seconds: u64,
}

impl RedisClient {
    pub async fn new(connection_string: &str, ttl_seconds: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, ttl_seconds })
    }

    async fn connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl GuestCacheBackend for RedisClient {
    async fn load_guest(&self, session: &str) -> CacheResult<Option<Guest>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(guest_key(session)).await.map_err(backend)?;

        raw.map(|json| serde_json::from_str(&json).map_err(|e| CacheError::Corrupt(e.to_string())))
            .transpose()
    }

    async fn store_guest(&self, session: &str, guest: &Guest) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(guest).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        conn.set_ex::<_, _, ()>(guest_key(session), json, self.ttl_seconds)
            .await
            .map_err(backend)?;
        debug!(session, guest_id = %guest.id, "Guest cached");
        Ok(())
    }

    async fn clear_guest(&self, session: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(guest_key(session)).await.map_err(backend)
    }

    async fn reserved_gift(&self, session: &str) -> CacheResult<Option<Uuid>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(reserved_gift_key(session)).await.map_err(backend)?;

        raw.map(|id| Uuid::parse_str(&id).map_err(|e| CacheError::Corrupt(e.to_string())))
            .transpose()
    }

    async fn set_reserved_gift(&self, session: &str, gift_id: Uuid) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(reserved_gift_key(session), gift_id.to_string(), self.ttl_seconds)
            .await
            .map_err(backend)
    }

    async fn clear_reserved_gift(&self, session: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(reserved_gift_key(session)).await.map_err(backend)
    }
}
