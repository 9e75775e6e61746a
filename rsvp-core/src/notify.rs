use async_trait::async_trait;
use rsvp_shared::InvitationEvent;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification dispatch failed: {0}")]
    Dispatch(String),

    #[error("Notification payload could not be encoded: {0}")]
    Encode(String),
}

/// Hands invitation requests to the transactional email collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_invitation(&self, invitation: &InvitationEvent) -> Result<(), NotificationError>;
}

/// Drops every invitation. Used when no mailer is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_invitation(&self, invitation: &InvitationEvent) -> Result<(), NotificationError> {
        tracing::debug!("No notifier configured, dropping invitation for guest {}", invitation.guest_id);
        Ok(())
    }
}
