use std::{convert::Infallible, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chirp_social::Social;

use crate::sse::ServerSentEvents;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub social: Arc<Social>,
    pub sse: Arc<ServerSentEvents>,
}

impl ServerContext {
    pub fn new(social: Arc<Social>) -> Self {
        Self {
            social,
            sse: ServerSentEvents::new(),
        }
    }
}

/// Lets handlers take the context directly instead of through `State`
#[async_trait]
impl<S> FromRequestParts<S> for ServerContext
where
    ServerContext: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_ref(state))
    }
}
