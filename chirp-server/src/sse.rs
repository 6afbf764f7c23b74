use axum::{
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use chirp_core::Id;
use chirp_social::{EventReceiver, NotificationView, PrimaryKey, SocialEvent};
use futures_util::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
    thread,
};
use utoipa::ToSchema;

use crate::{
    auth::Session,
    context::ServerContext,
    serialized::{Call, Message, Notification, ToSerialized, TweetBody},
    Router,
};

type ConnectionId = Id<Connection>;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// The user received a notification
    NotificationCreated { notification: Notification },
    /// The user sent or received a direct message
    MessageSent { message: Message },
    /// Someone posted a tweet, reply, or retweet
    TweetCreated { tweet: TweetBody },
    TweetDeleted {
        #[serde(rename = "tweetId")]
        tweet_id: PrimaryKey,
    },
    /// A call the user is part of changed
    CallUpdated { call: Call },
}

impl From<SocialEvent> for ServerEvent {
    fn from(value: SocialEvent) -> Self {
        match value {
            SocialEvent::NotificationCreated { notification } => Self::NotificationCreated {
                notification: NotificationView::from(notification).to_serialized(),
            },
            SocialEvent::MessageSent { message } => Self::MessageSent {
                message: message.to_serialized(),
            },
            SocialEvent::TweetCreated { tweet } => Self::TweetCreated {
                tweet: tweet.to_serialized(),
            },
            SocialEvent::TweetDeleted { tweet_id } => Self::TweetDeleted { tweet_id },
            SocialEvent::CallUpdated { call } => Self::CallUpdated {
                call: call.to_serialized(),
            },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    username: String,
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    /// Delivers every event from the receiver on a dedicated thread, until all senders are gone
    pub fn forward(self: &Arc<Self>, receiver: EventReceiver) {
        let manager = Arc::downgrade(self);

        thread::spawn(move || {
            for event in receiver.iter() {
                let Some(manager) = manager.upgrade() else {
                    break;
                };

                manager.broadcast(event);
            }
        });
    }

    /// Sends the event to every connection in its audience
    pub fn broadcast(&self, event: SocialEvent) {
        let audience = event.audience();
        let connections = self.connections.lock();

        let recipients: Vec<_> = connections
            .iter()
            .filter(|c| audience.includes(&c.username))
            .collect();

        if recipients.is_empty() {
            return;
        }

        let event = ServerEvent::from(event);

        for connection in recipients {
            connection.send(event.clone())
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    fn connect(&self, username: &str) -> ConnectionHandle {
        let connection = Connection::new(username);
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new(username: &str) -> Self {
        Self {
            id: ConnectionId::new(),
            username: username.to_string(),
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push_back(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        if let Some(message) = pending_messages.pop_front() {
            return Poll::Ready(Some(Event::default().json_data(message)));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events addressed to the user, and public tweet events",
            body = ServerEvent
        )
    )
)]
async fn event_stream(session: Session, context: ServerContext) -> Sse<ConnectionHandle> {
    Sse::new(context.sse.connect(session.username())).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}
