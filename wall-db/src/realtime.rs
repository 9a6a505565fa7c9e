//! Realtime profile updates.
//!
//! Postgres publishes the id of every updated `profiles` row on
//! [`PROFILE_UPDATES_CHANNEL`]. A [`ProfileSubscription`] filters that stream down to a
//! single profile, reads the row back for each update and stops listening as soon as
//! it is dropped.

use crate::client::DbClient;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};
use uuid::Uuid;
use wall_common::model::{
    Id,
    profile::{ProfileChange, ProfileMarker},
};

pub const PROFILE_UPDATES_CHANNEL: &str = "profile_updates";

const SUBSCRIPTION_BUFFER: usize = 16;

#[derive(Debug)]
pub struct ProfileSubscription {
    profile_id: Id<ProfileMarker>,
    receiver: mpsc::Receiver<ProfileChange>,
    _release: Option<DropGuard>,
}

impl ProfileSubscription {
    /// Creates a subscription together with the sender that feeds it.
    #[must_use]
    pub fn channel(profile_id: Id<ProfileMarker>) -> (mpsc::Sender<ProfileChange>, Self) {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let subscription = Self {
            profile_id,
            receiver,
            _release: None,
        };

        (sender, subscription)
    }

    /// Cancels `guard`'s token when the subscription is dropped.
    #[must_use]
    pub fn with_release(mut self, guard: DropGuard) -> Self {
        self._release = Some(guard);
        self
    }

    #[must_use]
    pub fn profile_id(&self) -> Id<ProfileMarker> {
        self.profile_id
    }

    /// Waits for the next change. `None` once the source has gone away.
    pub async fn recv(&mut self) -> Option<ProfileChange> {
        self.receiver.recv().await
    }

    /// Returns an already delivered change without waiting.
    pub fn try_recv(&mut self) -> Option<ProfileChange> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
struct ProfileNotification {
    id: Uuid,
}

fn parse_notification(payload: &str) -> Result<Id<ProfileMarker>, serde_json::Error> {
    let notification: ProfileNotification = serde_json::from_str(payload)?;
    Ok(notification.id.into())
}

pub(crate) async fn listen(
    client: &DbClient,
    profile_id: Id<ProfileMarker>,
) -> Result<ProfileSubscription, sqlx::Error> {
    let mut listener = PgListener::connect_with(client.pool()).await?;
    listener.listen(PROFILE_UPDATES_CHANNEL).await?;

    let (sender, subscription) = ProfileSubscription::channel(profile_id);
    let token = CancellationToken::new();
    tokio::spawn(forward_notifications(
        listener,
        client.clone(),
        profile_id,
        sender,
        token.clone(),
    ));

    debug!(%profile_id, "Listening for profile updates");
    Ok(subscription.with_release(token.drop_guard()))
}

async fn forward_notifications(
    mut listener: PgListener,
    client: DbClient,
    profile_id: Id<ProfileMarker>,
    sender: mpsc::Sender<ProfileChange>,
    token: CancellationToken,
) {
    loop {
        let notification = tokio::select! {
            () = token.cancelled() => break,
            () = sender.closed() => break,
            notification = listener.recv() => notification,
        };

        let notification = match notification {
            Ok(notification) => notification,
            Err(err) => {
                error!(error = %err, %profile_id, "Profile update listener failed");
                break;
            }
        };

        match parse_notification(notification.payload()) {
            Ok(id) if id == profile_id => {
                let Some(change) = read_change(&client, profile_id).await else {
                    continue;
                };
                if sender.send(change).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Ignoring malformed profile notification"),
        }
    }

    debug!(%profile_id, "Profile subscription released");
}

async fn read_change(client: &DbClient, profile_id: Id<ProfileMarker>) -> Option<ProfileChange> {
    match client.fetch_profile(profile_id).await {
        Ok(Some(profile)) => Some(profile.details.into()),
        Ok(None) => {
            debug!(%profile_id, "Updated profile no longer exists");
            None
        }
        Err(err) => {
            warn!(error = %err, %profile_id, "Reading the updated profile failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        realtime::{ProfileSubscription, parse_notification},
        test_db::TestDb,
    };
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_util::sync::CancellationToken;
    use uuid::uuid;
    use wall_common::{
        identity::PUBLIC_PROFILE_ID,
        model::{
            Id,
            profile::{Profile, ProfileChange, ProfileDetails},
        },
    };

    #[test]
    fn parses_id_payload() {
        let id = parse_notification(r#"{"id": "550e8400-e29b-41d4-a716-446655440000"}"#).unwrap();

        assert_eq!(id.get(), uuid!("550e8400-e29b-41d4-a716-446655440000"));
    }

    #[test]
    fn ignores_extra_row_fields() {
        let payload = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "Ada",
            "updated_at": "2025-07-01T12:00:00.123456+00:00"
        }"#;

        assert_eq!(parse_notification(payload).unwrap(), PUBLIC_PROFILE_ID);
    }

    #[test]
    fn rejects_payload_without_id() {
        assert!(parse_notification(r#"{"name": "Ada"}"#).is_err());
    }

    #[tokio::test]
    async fn dropping_subscription_cancels_its_token() {
        let token = CancellationToken::new();
        let (sender, subscription) = ProfileSubscription::channel(PUBLIC_PROFILE_ID);
        let subscription = subscription.with_release(token.clone().drop_guard());

        assert!(!token.is_cancelled());
        drop(subscription);

        assert!(token.is_cancelled());
        assert!(sender.is_closed());
    }

    #[tokio::test]
    async fn delivers_changes_in_order() {
        let (sender, mut subscription) = ProfileSubscription::channel(PUBLIC_PROFILE_ID);

        for name in ["first", "second"] {
            sender
                .send(ProfileChange {
                    name: Some(name.to_owned()),
                    ..ProfileChange::default()
                })
                .await
                .unwrap();
        }
        drop(sender);

        let mut names = Vec::new();
        while let Some(change) = subscription.recv().await {
            names.extend(change.name);
        }
        assert_eq!(names, ["first", "second"]);
    }

    #[tokio::test]
    async fn database_update_is_delivered_until_dropped() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let client = &db.client;
        let id = Id::generate();
        let other = Id::generate();
        for profile_id in [id, other] {
            client
                .upsert_profile(&Profile::with_defaults(profile_id))
                .await
                .unwrap();
        }

        let mut subscription = client.subscribe_profile(id).await.unwrap();
        assert_eq!(db.listening_connections().await, 1);

        client
            .upsert_profile(&Profile::with_defaults(other))
            .await
            .unwrap();
        let details = ProfileDetails {
            name: "Ada".to_owned(),
            information: "x".repeat(9000),
            ..ProfileDetails::default()
        };
        client
            .upsert_profile(&Profile::new(id, details.clone()))
            .await
            .unwrap();

        let change = timeout(Duration::from_secs(5), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ProfileDetails::from(change), details);

        drop(subscription);
        let mut listening = 1;
        for _ in 0..50 {
            listening = db.listening_connections().await;
            if listening == 0 {
                break;
            }
            sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(listening, 0);

        db.drop_schema().await;
    }
}
