//! Standalone WebSocket listener for the live event feed.

use std::{net::SocketAddr, sync::Arc};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};
use tracing::{error, info, warn};

use super::{connection::serve_subscriber, hub::HubHandle};
use crate::auth::auth::{AuthError, AuthUser};

pub struct EventFeedServer {
    addr: String,
    hub: HubHandle,
    jwt_secret: String,
    queue_capacity: usize,
}

impl EventFeedServer {
    pub fn new(addr: String, hub: HubHandle, jwt_secret: String, queue_capacity: usize) -> Self {
        Self {
            addr,
            hub,
            jwt_secret,
            queue_capacity,
        }
    }

    /// Accepts connections until the process exits.
    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!(addr = %self.addr, "Event feed listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.handle_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept event feed connection");
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let secret = self.jwt_secret.clone();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            match authorize_handshake(req, &secret) {
                Ok(user) => {
                    info!(user_id = user.user_id, role = %user.role, %peer, "Event feed handshake accepted");
                    Ok(resp)
                }
                Err(e) => {
                    warn!(error = %e, %peer, "Event feed handshake rejected");
                    Err(reject(&e))
                }
            }
        };

        match accept_hdr_async(stream, callback).await {
            Ok(socket) => {
                serve_subscriber(self.hub.clone(), socket, self.queue_capacity, peer.to_string())
                    .await
            }
            Err(e) => warn!(error = %e, %peer, "Event feed handshake failed"),
        }
    }
}

/// Only supervisory roles may watch the feed. The token comes from the
/// `token` query parameter, since browsers cannot set headers on a WebSocket
/// upgrade, or from a bearer `Authorization` header.
pub fn authorize_handshake(req: &Request, secret: &str) -> Result<AuthUser, AuthError> {
    let from_query = req.uri().query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "token")
            .map(|(_, value)| value)
            .filter(|t| !t.is_empty())
    });
    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty());

    let token = from_query
        .or(from_header)
        .ok_or_else(|| AuthError::Unauthorized("Missing token".to_string()))?;

    let user = AuthUser::from_token(token, secret)?;
    user.require_supervisor()?;
    Ok(user)
}

fn reject(e: &AuthError) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(e.to_string()));
    *resp.status_mut() = match e {
        AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AuthError::ConfigMissing => StatusCode::INTERNAL_SERVER_ERROR,
    };
    resp
}
