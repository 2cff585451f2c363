//! Connection session
//!
//! Drives one connection through classification, commands and teardown.
//! The session is transport-independent: the connection task feeds it
//! events and it answers through the connection's [`ConnectionHandle`].

use tokio::task::JoinHandle;

use super::context::SessionContext;
use super::state::{SessionPhase, SessionState};
use crate::error::{Error, Result};
use crate::protocol::{
    Command, ConnectIntent, RegistrantParams, ResponseStatus, Role, ValidationError,
    CLOSE_POLICY_VIOLATION,
};
use crate::registry::{ServiceRecord, Status};
use crate::server::channel::ConnectionHandle;
use crate::server::hub::Hub;

/// Per-connection session
#[derive(Debug)]
pub struct Session {
    ctx: SessionContext,
    state: SessionState,
    handle: ConnectionHandle,
    hub: Hub,
}

impl Session {
    /// Create a session for a freshly upgraded connection
    pub fn new(ctx: SessionContext, handle: ConnectionHandle, hub: Hub) -> Self {
        Self {
            ctx,
            state: SessionState::new(),
            handle,
            hub,
        }
    }

    /// Session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Session state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Classify the connection and admit or register it
    ///
    /// On failure the error response and a policy-violation close have
    /// already been queued; the caller should stop reading.
    pub async fn open(&mut self) -> Result<Role> {
        let intent = match self.ctx.params.intent() {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(
                    channel = %self.ctx.channel_id,
                    peer = %self.ctx.peer(),
                    query = ?self.ctx.params.query,
                    error = %e,
                    "Invalid Connection!"
                );
                self.reject(ResponseStatus::BadRequest, &e.to_string(), "Invalid Connection!");
                return Err(e.into());
            }
        };

        match intent {
            ConnectIntent::Observer { token } => self.admit_observer(token.as_deref()).await,
            ConnectIntent::Registrant(params) => self.register(params).await,
        }
    }

    async fn admit_observer(&mut self, token: Option<&str>) -> Result<Role> {
        if let Err(e) = self.hub.gate().check_and_rotate(token) {
            tracing::info!(
                channel = %self.ctx.channel_id,
                peer = %self.ctx.peer(),
                reason = %e,
                "Reject connection due to invalid token"
            );
            self.reject(ResponseStatus::Unauthorized, "Invalid Token!", "Invalid Token!");
            return Err(e.into());
        }

        self.state.on_observing();
        self.hub.broadcaster().add_observer(self.handle.clone()).await;
        if let Err(e) = self.hub.broadcaster().send_listing(&self.handle).await {
            tracing::debug!(channel = %self.ctx.channel_id, error = %e, "Initial listing not sent");
        }

        tracing::info!(channel = %self.ctx.channel_id, peer = %self.ctx.peer(), "UI Connected!");
        Ok(Role::Observer)
    }

    async fn register(&mut self, params: RegistrantParams) -> Result<Role> {
        let record = ServiceRecord::http_endpoint(
            self.ctx.channel_id.as_str(),
            params.name.as_str(),
            params.host.as_str(),
            params.port,
        );

        match self.hub.registry().store(record).await {
            Ok(record) => {
                self.state.on_registered();
                self.hub
                    .broadcaster()
                    .add_trigger(self.ctx.channel_id.clone())
                    .await;

                tracing::info!(
                    channel = %self.ctx.channel_id,
                    name = %record.name,
                    location = %record.location,
                    "Service connected"
                );

                self.hub.broadcast().await;
                Ok(Role::Registrant)
            }
            Err(e) => {
                tracing::error!(
                    channel = %self.ctx.channel_id,
                    name = %params.name,
                    error = %e,
                    "Failed to register service"
                );
                self.reject(
                    ResponseStatus::BadRequest,
                    &format!("Failed to register ({})", e),
                    "Failed to register",
                );
                Err(e.into())
            }
        }
    }

    /// Handle one inbound text frame
    ///
    /// Command errors are reported to the peer and returned; the connection
    /// stays open.
    pub async fn on_text(&mut self, text: &str) -> Result<()> {
        self.state.commands_received += 1;

        let role = match (self.state.is_active(), self.state.role) {
            (true, Some(role)) => role,
            _ => {
                self.state.commands_rejected += 1;
                let _ = self.handle.respond(ResponseStatus::BadRequest, "ERROR");
                return Ok(());
            }
        };

        tracing::info!(
            channel = %self.ctx.channel_id,
            command = %text.trim(),
            "received command"
        );

        let command = match self.hub.commands().resolve(role, text) {
            Ok(command) => command,
            Err(e) => {
                self.state.commands_rejected += 1;
                let _ = self.handle.respond(ResponseStatus::BadRequest, &e.to_string());
                return Err(e.into());
            }
        };

        match command {
            Command::ListAll => {
                self.hub.broadcaster().send_listing(&self.handle).await?;
                Ok(())
            }
            Command::SetStatus(status) => self.set_status(status).await,
        }
    }

    /// Handle one inbound binary frame
    pub fn on_binary(&mut self) {
        self.state.commands_rejected += 1;
        let message = ValidationError::UnsupportedFrame.to_string();
        let _ = self.handle.respond(ResponseStatus::BadRequest, &message);
    }

    async fn set_status(&mut self, status: Status) -> Result<()> {
        match self
            .hub
            .registry()
            .update_status(self.ctx.channel_id.as_str(), status)
            .await
        {
            Ok(_) => {
                self.hub.broadcast().await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    channel = %self.ctx.channel_id,
                    status = %status,
                    error = %e,
                    "Failed to update status"
                );
                self.state.commands_rejected += 1;
                let _ = self.handle.respond(
                    ResponseStatus::BadRequest,
                    &format!("Failed to update status ({})", e),
                );
                Err(e.into())
            }
        }
    }

    /// Tear the session down after the connection closed
    ///
    /// Observers leave the broadcast set. Registrants are flipped to `DOWN`
    /// right away and their record is removed after the grace period; the
    /// returned handle is that removal timer.
    pub async fn on_close(&mut self) -> Option<JoinHandle<()>> {
        let previous = self.state.close();
        let id = self.ctx.channel_id.clone();

        tracing::info!(
            channel = %id,
            duration = ?self.state.duration(),
            "Connection Closed!"
        );

        let timer = match previous {
            SessionPhase::Observing => {
                self.hub.broadcaster().remove_observer(&id).await;
                None
            }
            SessionPhase::Registered => {
                if let Err(e) = self
                    .hub
                    .registry()
                    .update_status(id.as_str(), Status::Down)
                    .await
                {
                    // Cleanup continues regardless; the record may have
                    // migrated to a newer connection.
                    tracing::warn!(channel = %id, error = %e, "Failed to mark record DOWN");
                }

                self.hub.broadcaster().remove_trigger(&id).await;
                self.hub.broadcast().await;
                Some(self.hub.schedule_removal(id))
            }
            SessionPhase::Connecting | SessionPhase::Closing | SessionPhase::Closed => None,
        };

        self.state.finish();
        timer
    }

    /// Reply with `message`, then close with a fixed `close_reason`
    fn reject(&mut self, status: ResponseStatus, message: &str, close_reason: &str) {
        let _ = self.handle.respond(status, message);
        let _ = self.handle.close(CLOSE_POLICY_VIOLATION, close_reason);
        self.state.close();
    }
}

/// Whether an error means the connection was refused at open time
pub fn is_rejection(error: &Error) -> bool {
    matches!(
        error,
        Error::Validation(_) | Error::Admission(_) | Error::Registry(_)
    )
}
