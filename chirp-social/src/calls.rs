use chirp_core::{random_string, IntegrationError, RoomGrant};
use chrono::Utc;
use thiserror::Error;

use crate::{
    CallData, CallNotificationData, CallStatus, DatabaseError, NewCall, NewCallNotification,
    NewCallParticipant, NotificationContent, NotificationKind, ParticipantData, ParticipantStatus,
    PrimaryKey, SocialContext, SocialEvent,
};

#[derive(Debug, Error)]
pub enum CallError {
    #[error("A call needs at least one other participant")]
    NoCallees,
    #[error("You are not a participant of this call")]
    NotParticipant,
    #[error("Call can't go from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

pub type CallResult<T> = Result<T, CallError>;

impl CallStatus {
    /// initiating → ringing → active → ended, and any unfinished call can end early
    pub fn can_become(self, next: CallStatus) -> bool {
        use CallStatus::*;

        matches!(
            (self, next),
            (Initiating, Ringing) | (Ringing, Active) | (Initiating | Ringing | Active, Ended)
        )
    }
}

impl ParticipantStatus {
    /// invited → connected → disconnected, or invited → declined
    pub fn can_become(self, next: ParticipantStatus) -> bool {
        use ParticipantStatus::*;

        matches!(
            (self, next),
            (Invited, Connected) | (Invited, Declined) | (Connected, Disconnected)
        )
    }
}

/// A call together with everyone in it
#[derive(Debug, Clone)]
pub struct CallView {
    pub call: CallData,
    pub participants: Vec<ParticipantData>,
}

impl CallView {
    pub fn participant(&self, username: &str) -> Option<&ParticipantData> {
        self.participants.iter().find(|p| p.username == username)
    }
}

/// Credentials for joining the video room of a call
#[derive(Debug, Clone)]
pub struct RoomAccess {
    pub room: String,
    pub identity: String,
    pub token: String,
    pub server_url: String,
}

/// The result of initiating or accepting a call
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call: CallView,
    /// Missing when no video service is configured
    pub access: Option<RoomAccess>,
}

#[derive(Debug, Clone)]
pub struct IncomingCall {
    pub notification: CallNotificationData,
    pub call: CallData,
}

/// Video call signaling, mirroring the lifecycle of rooms on the video service
pub struct Calls {
    context: SocialContext,
}

impl Calls {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Starts a call and rings every callee
    pub async fn initiate(&self, caller: &str, callees: &[String]) -> CallResult<CallSession> {
        let mut callees: Vec<&String> = callees.iter().filter(|c| *c != caller).collect();
        callees.sort();
        callees.dedup();

        if callees.is_empty() {
            return Err(CallError::NoCallees);
        }

        let database = &self.context.database;

        for callee in &callees {
            database.user_by_username(callee).await?;
        }

        let call = database
            .create_call(NewCall {
                room_name: format!("call-{}", random_string(16).to_lowercase()),
                caller: caller.to_string(),
            })
            .await?;

        database
            .create_call_participant(NewCallParticipant {
                call_id: call.id,
                username: caller.to_string(),
                status: ParticipantStatus::Connected,
            })
            .await?;

        for callee in &callees {
            database
                .create_call_participant(NewCallParticipant {
                    call_id: call.id,
                    username: callee.to_string(),
                    status: ParticipantStatus::Invited,
                })
                .await?;

            database
                .create_call_notification(NewCallNotification {
                    call_id: call.id,
                    username: callee.to_string(),
                    caller: caller.to_string(),
                })
                .await?;

            self.context
                .notify_quietly(
                    callee,
                    NotificationKind::Call,
                    NotificationContent::new(caller, format!("@{} is calling you", caller))
                        .with_call(call.id),
                )
                .await;
        }

        let view = self.transition(call, CallStatus::Ringing).await?;
        let access = self.access_for(&view.call.room_name, caller).await?;

        log::info!(
            "{} started call {} with {} callee(s)",
            caller,
            view.call.id,
            callees.len()
        );

        Ok(CallSession { call: view, access })
    }

    /// Joins a ringing or active call the user was invited to
    pub async fn accept(&self, username: &str, call_id: PrimaryKey) -> CallResult<CallSession> {
        let view = self.participant_view(username, call_id).await?;

        self.set_participant(&view, username, ParticipantStatus::Connected)
            .await?;

        let view = match view.call.status {
            CallStatus::Active => self.view(view.call).await?,
            _ => self.transition(view.call, CallStatus::Active).await?,
        };

        let access = self.access_for(&view.call.room_name, username).await?;

        Ok(CallSession { call: view, access })
    }

    /// Declines an invitation. The call ends once nobody is left to answer it.
    pub async fn decline(&self, username: &str, call_id: PrimaryKey) -> CallResult<CallView> {
        let view = self.participant_view(username, call_id).await?;

        self.set_participant(&view, username, ParticipantStatus::Declined)
            .await?;

        let view = self.view(view.call).await?;

        let still_invited = view
            .participants
            .iter()
            .any(|p| p.status == ParticipantStatus::Invited);

        let connected = view
            .participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::Connected)
            .count();

        if !still_invited && connected <= 1 {
            return self.end_call(view).await;
        }

        self.context.emit(SocialEvent::CallUpdated { call: view.clone() });
        Ok(view)
    }

    /// Ends the call for everyone
    pub async fn end(&self, username: &str, call_id: PrimaryKey) -> CallResult<CallView> {
        let view = self.participant_view(username, call_id).await?;
        self.end_call(view).await
    }

    pub async fn get(&self, username: &str, call_id: PrimaryKey) -> CallResult<CallView> {
        self.participant_view(username, call_id).await
    }

    /// Calls that are ringing for the user and haven't been answered
    pub async fn incoming(&self, username: &str) -> CallResult<Vec<IncomingCall>> {
        let database = &self.context.database;
        let mut incoming = vec![];

        for notification in database.list_call_notifications(username).await? {
            let call = database.call_by_id(notification.call_id).await?;

            if call.status != CallStatus::Ringing {
                continue;
            }

            let invited = database
                .list_call_participants(call.id)
                .await?
                .iter()
                .any(|p| p.username == username && p.status == ParticipantStatus::Invited);

            if invited {
                incoming.push(IncomingCall { notification, call });
            }
        }

        Ok(incoming)
    }

    /// Issues a token for joining a room as the given user
    pub fn room_access(
        &self,
        room: &str,
        username: &str,
        name: Option<String>,
    ) -> CallResult<RoomAccess> {
        let rooms = self
            .context
            .integrations
            .rooms
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("LiveKit"))?;

        let grant = RoomGrant {
            name,
            ..RoomGrant::participant(room, username)
        };

        Ok(RoomAccess {
            room: room.to_string(),
            identity: username.to_string(),
            token: rooms.issue(&grant)?,
            server_url: rooms.server_url().to_string(),
        })
    }

    async fn access_for(&self, room: &str, username: &str) -> CallResult<Option<RoomAccess>> {
        if self.context.integrations.rooms.is_none() {
            log::warn!("No video service configured, call {} has no room token", room);
            return Ok(None);
        }

        let name = self.context.database.user_by_username(username).await?.name;
        self.room_access(room, username, Some(name)).map(Some)
    }

    async fn end_call(&self, view: CallView) -> CallResult<CallView> {
        for participant in &view.participants {
            if participant.status == ParticipantStatus::Connected {
                self.set_participant(&view, &participant.username, ParticipantStatus::Disconnected)
                    .await?;
            }
        }

        self.transition(view.call, CallStatus::Ended).await
    }

    async fn participant_view(&self, username: &str, call_id: PrimaryKey) -> CallResult<CallView> {
        let call = self.context.database.call_by_id(call_id).await?;
        let view = self.view(call).await?;

        if view.participant(username).is_none() {
            return Err(CallError::NotParticipant);
        }

        Ok(view)
    }

    async fn view(&self, call: CallData) -> CallResult<CallView> {
        let participants = self
            .context
            .database
            .list_call_participants(call.id)
            .await?;

        Ok(CallView { call, participants })
    }

    async fn set_participant(
        &self,
        view: &CallView,
        username: &str,
        next: ParticipantStatus,
    ) -> CallResult<()> {
        let current = view
            .participant(username)
            .ok_or(CallError::NotParticipant)?
            .status;

        if view.call.status == CallStatus::Ended || !current.can_become(next) {
            return Err(CallError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        self.context
            .database
            .update_participant_status(view.call.id, username, next)
            .await?;

        Ok(())
    }

    async fn transition(&self, call: CallData, next: CallStatus) -> CallResult<CallView> {
        if !call.status.can_become(next) {
            return Err(CallError::InvalidTransition {
                from: call.status.to_string(),
                to: next.to_string(),
            });
        }

        let ended_at = (next == CallStatus::Ended).then(Utc::now);

        let call = self
            .context
            .database
            .update_call_status(call.id, next, ended_at)
            .await?;

        log::info!("Call {} is now {}", call.id, call.status);

        let view = self.view(call).await?;
        self.context.emit(SocialEvent::CallUpdated { call: view.clone() });

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chirp_core::Config;

    use super::*;
    use crate::{
        testing::{FakeRooms, TestSocial},
        Integrations,
    };

    async fn with_rooms(usernames: &[&str]) -> TestSocial {
        let integrations = Integrations {
            rooms: Some(Arc::new(FakeRooms)),
            ..Default::default()
        };

        TestSocial::build(Config::default(), integrations, usernames).await
    }

    fn names(usernames: &[&str]) -> Vec<String> {
        usernames.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_transitions() {
        assert!(CallStatus::Initiating.can_become(CallStatus::Ringing));
        assert!(CallStatus::Active.can_become(CallStatus::Ended));
        assert!(!CallStatus::Ended.can_become(CallStatus::Active));
        assert!(!CallStatus::Initiating.can_become(CallStatus::Active));

        assert!(ParticipantStatus::Invited.can_become(ParticipantStatus::Declined));
        assert!(!ParticipantStatus::Declined.can_become(ParticipantStatus::Connected));
    }

    #[tokio::test]
    async fn test_initiate_and_accept() {
        let test = with_rooms(&["alice", "bob"]).await;
        let calls = &test.social.calls;

        let session = calls.initiate("alice", &names(&["bob", "alice"])).await.unwrap();
        assert_eq!(session.call.call.status, CallStatus::Ringing);
        assert_eq!(session.call.participants.len(), 2);

        let access = session.access.unwrap();
        assert_eq!(access.identity, "alice");
        assert!(access.token.starts_with("token:call-"));

        let incoming = calls.incoming("bob").await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].call.id, session.call.call.id);

        let accepted = calls.accept("bob", session.call.call.id).await.unwrap();
        assert_eq!(accepted.call.call.status, CallStatus::Active);
        assert_eq!(
            accepted.call.participant("bob").unwrap().status,
            ParticipantStatus::Connected
        );
        assert!(calls.incoming("bob").await.unwrap().is_empty());

        assert!(matches!(
            calls.accept("bob", session.call.call.id).await,
            Err(CallError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_decline_ends_when_nobody_is_left() {
        let test = with_rooms(&["alice", "bob", "carol"]).await;
        let calls = &test.social.calls;

        let session = calls
            .initiate("alice", &names(&["bob", "carol"]))
            .await
            .unwrap();
        let id = session.call.call.id;

        let after_bob = calls.decline("bob", id).await.unwrap();
        assert_eq!(after_bob.call.status, CallStatus::Ringing);

        let after_carol = calls.decline("carol", id).await.unwrap();
        assert_eq!(after_carol.call.status, CallStatus::Ended);
        assert!(after_carol.call.ended_at.is_some());
        assert_eq!(
            after_carol.participant("alice").unwrap().status,
            ParticipantStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_end_and_permissions() {
        let test = with_rooms(&["alice", "bob", "mallory"]).await;
        let calls = &test.social.calls;

        let session = calls.initiate("alice", &names(&["bob"])).await.unwrap();
        let id = session.call.call.id;

        assert!(matches!(
            calls.end("mallory", id).await,
            Err(CallError::NotParticipant)
        ));
        assert!(matches!(
            calls.get("mallory", id).await,
            Err(CallError::NotParticipant)
        ));

        let ended = calls.end("bob", id).await.unwrap();
        assert_eq!(ended.call.status, CallStatus::Ended);

        assert!(matches!(
            calls.end("alice", id).await,
            Err(CallError::InvalidTransition { .. })
        ));
        assert!(matches!(
            calls.accept("bob", id).await,
            Err(CallError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_calls_without_video_service() {
        let test = TestSocial::with_users(&["alice", "bob"]).await;
        let calls = &test.social.calls;

        let session = calls.initiate("alice", &names(&["bob"])).await.unwrap();
        assert!(session.access.is_none());

        assert!(matches!(
            calls.room_access("room", "alice", None),
            Err(CallError::Integration(IntegrationError::NotConfigured(_)))
        ));

        assert!(matches!(
            calls.initiate("alice", &names(&["alice"])).await,
            Err(CallError::NoCallees)
        ));
    }
}
