//! Guest session coordination
//!
//! Issues invite tokens/links and tracks the guest roster. Invite creation
//! is always synchronous; email delivery is a supervised background task
//! whose failure can only produce a warning, never fail the invite.

use crate::config::StudioConfig;
use crate::error::{StudioError, StudioResult};
use crate::events::StudioEvent;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Roster status of a guest invite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    /// Terminal: a joined entry never transitions again
    Joined,
    Expired,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InviteStatus::Pending => write!(f, "pending"),
            InviteStatus::Joined => write!(f, "joined"),
            InviteStatus::Expired => write!(f, "expired"),
        }
    }
}

/// One guest roster entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInvite {
    pub id: Uuid,
    pub display_name: String,
    pub contact_email: Option<String>,
    /// Opaque unguessable identifier; visiting the link is the only way
    /// this entry becomes joined
    pub invite_token: String,
    pub link: String,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// External email delivery collaborator
#[async_trait]
pub trait InviteDelivery: Send + Sync {
    async fn deliver(&self, invite: &GuestInvite) -> StudioResult<()>;
}

/// Issues invites and tracks roster state with time-based expiry
pub struct GuestSessionCoordinator {
    invites: RwLock<HashMap<String, GuestInvite>>,
    host: String,
    ttl: Duration,
    delivery: Option<Arc<dyn InviteDelivery>>,
    event_tx: Option<broadcast::Sender<StudioEvent>>,
}

impl GuestSessionCoordinator {
    pub fn new(config: &StudioConfig) -> Self {
        Self {
            invites: RwLock::new(HashMap::new()),
            host: config.guest_link_host.clone(),
            ttl: Duration::seconds(config.invite_ttl_secs as i64),
            delivery: None,
            event_tx: None,
        }
    }

    /// Registers the email delivery collaborator.
    pub fn with_delivery(mut self, delivery: Arc<dyn InviteDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Routes delivery-failure warnings onto the studio event bus.
    pub fn with_events(mut self, event_tx: broadcast::Sender<StudioEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Creates an invite and returns it, link included, synchronously.
    ///
    /// When a contact email was supplied and a delivery collaborator is
    /// registered, delivery runs as a supervised background task; its
    /// failure logs a warning and emits [`StudioEvent::InviteDeliveryFailed`]
    /// but never affects the returned invite.
    pub fn create_invite(
        &self,
        display_name: impl Into<String>,
        contact_email: Option<String>,
    ) -> GuestInvite {
        let display_name = display_name.into();
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let invite = GuestInvite {
            id: Uuid::new_v4(),
            display_name,
            contact_email,
            link: format!(
                "https://{}/studio/guest/{}",
                self.host,
                urlencoding::encode(&token)
            ),
            invite_token: token.clone(),
            status: InviteStatus::Pending,
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.invites.write().insert(token, invite.clone());
        tracing::info!(invite_id = %invite.id, guest = %invite.display_name, "guest invite created");

        if invite.contact_email.is_some() {
            if let Some(delivery) = &self.delivery {
                let delivery = delivery.clone();
                let event_tx = self.event_tx.clone();
                let invite = invite.clone();
                tokio::spawn(async move {
                    if let Err(error) = delivery.deliver(&invite).await {
                        tracing::warn!(invite_id = %invite.id, error = %error, "guest invite delivery failed");
                        if let Some(event_tx) = event_tx {
                            let _ = event_tx.send(StudioEvent::InviteDeliveryFailed {
                                invite_id: invite.id,
                                reason: error.to_string(),
                            });
                        }
                    }
                });
            }
        }

        invite
    }

    /// Transitions a pending entry to joined, exactly once, driven by the
    /// guest's own join action. Past-TTL entries expire instead.
    pub fn mark_joined(&self, token: &str) -> StudioResult<GuestInvite> {
        let mut invites = self.invites.write();
        let invite = invites
            .get_mut(token)
            .ok_or_else(|| StudioError::UnknownInvite {
                token: token.to_string(),
            })?;

        if invite.status == InviteStatus::Pending && Utc::now() > invite.expires_at {
            invite.status = InviteStatus::Expired;
        }

        match invite.status {
            InviteStatus::Pending => {
                invite.status = InviteStatus::Joined;
                tracing::info!(invite_id = %invite.id, guest = %invite.display_name, "guest joined");
                Ok(invite.clone())
            }
            status => Err(StudioError::InviteNotJoinable {
                token: token.to_string(),
                status,
            }),
        }
    }

    /// Expires a pending entry. Idempotent on already-expired entries;
    /// joined entries are terminal and cannot be expired.
    pub fn expire(&self, token: &str) -> StudioResult<()> {
        let mut invites = self.invites.write();
        let invite = invites
            .get_mut(token)
            .ok_or_else(|| StudioError::UnknownInvite {
                token: token.to_string(),
            })?;

        match invite.status {
            InviteStatus::Pending => {
                invite.status = InviteStatus::Expired;
                tracing::info!(invite_id = %invite.id, "guest invite expired");
                Ok(())
            }
            InviteStatus::Expired => Ok(()),
            InviteStatus::Joined => Err(StudioError::InviteNotJoinable {
                token: token.to_string(),
                status: InviteStatus::Joined,
            }),
        }
    }

    /// Expires every pending entry past its TTL; returns how many flipped.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut swept = 0;
        for invite in self.invites.write().values_mut() {
            if invite.status == InviteStatus::Pending && now > invite.expires_at {
                invite.status = InviteStatus::Expired;
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::debug!(swept, "expired pending invites");
        }
        swept
    }

    pub fn get(&self, token: &str) -> Option<GuestInvite> {
        self.invites.read().get(token).cloned()
    }

    /// Current roster snapshot, newest first.
    pub fn roster(&self) -> Vec<GuestInvite> {
        let mut roster: Vec<_> = self.invites.read().values().cloned().collect();
        roster.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> GuestSessionCoordinator {
        GuestSessionCoordinator::new(&StudioConfig::default())
    }

    #[test]
    fn invite_without_email_still_returns_a_usable_link() {
        let coordinator = coordinator();
        let invite = coordinator.create_invite("Ada", None);

        assert_eq!(invite.status, InviteStatus::Pending);
        assert_eq!(
            invite.link,
            format!("https://studio.example.com/studio/guest/{}", invite.invite_token)
        );
    }

    #[test]
    fn joining_is_exactly_once() {
        let coordinator = coordinator();
        let invite = coordinator.create_invite("Grace", None);

        let joined = coordinator.mark_joined(&invite.invite_token).unwrap();
        assert_eq!(joined.status, InviteStatus::Joined);

        let err = coordinator.mark_joined(&invite.invite_token).unwrap_err();
        assert!(matches!(
            err,
            StudioError::InviteNotJoinable {
                status: InviteStatus::Joined,
                ..
            }
        ));
    }

    #[test]
    fn joined_entries_cannot_be_expired() {
        let coordinator = coordinator();
        let invite = coordinator.create_invite("Alan", None);
        coordinator.mark_joined(&invite.invite_token).unwrap();

        let err = coordinator.expire(&invite.invite_token).unwrap_err();
        assert!(matches!(err, StudioError::InviteNotJoinable { .. }));
    }

    #[test]
    fn past_ttl_invites_expire_instead_of_joining() {
        let config = StudioConfig {
            invite_ttl_secs: 0,
            ..StudioConfig::default()
        };
        let coordinator = GuestSessionCoordinator::new(&config);
        let invite = coordinator.create_invite("Late", None);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let err = coordinator.mark_joined(&invite.invite_token).unwrap_err();
        assert!(matches!(
            err,
            StudioError::InviteNotJoinable {
                status: InviteStatus::Expired,
                ..
            }
        ));
    }

    #[test]
    fn sweep_flips_only_past_ttl_pending_entries() {
        let config = StudioConfig {
            invite_ttl_secs: 0,
            ..StudioConfig::default()
        };
        let coordinator = GuestSessionCoordinator::new(&config);
        coordinator.create_invite("One", None);
        coordinator.create_invite("Two", None);

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(coordinator.sweep_expired(), 2);
        assert_eq!(coordinator.sweep_expired(), 0);
    }

    #[test]
    fn unknown_token_errors() {
        let coordinator = coordinator();
        assert!(matches!(
            coordinator.mark_joined("nope").unwrap_err(),
            StudioError::UnknownInvite { .. }
        ));
        assert!(matches!(
            coordinator.expire("nope").unwrap_err(),
            StudioError::UnknownInvite { .. }
        ));
    }

    struct FailingDelivery;

    #[async_trait]
    impl InviteDelivery for FailingDelivery {
        async fn deliver(&self, invite: &GuestInvite) -> StudioResult<()> {
            Err(StudioError::InviteDeliveryFailure {
                invite_id: invite.id,
                reason: "smtp unreachable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn delivery_failure_warns_but_does_not_fail_creation() {
        let (event_tx, mut event_rx) = broadcast::channel(8);
        let coordinator = GuestSessionCoordinator::new(&StudioConfig::default())
            .with_delivery(Arc::new(FailingDelivery))
            .with_events(event_tx);

        let invite = coordinator.create_invite("Edsger", Some("e@example.com".to_string()));
        assert_eq!(invite.status, InviteStatus::Pending);
        assert!(!invite.link.is_empty());

        let event = event_rx.recv().await.unwrap();
        match event {
            StudioEvent::InviteDeliveryFailed { invite_id, .. } => {
                assert_eq!(invite_id, invite.id);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
