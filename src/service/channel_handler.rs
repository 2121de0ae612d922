use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::protocol::{ClientMessage, ServerMessage, SYSTEM_SESSION_ID};
use crate::pty::{PtyEvent, PtyEventReceiver};
use crate::registry::{Registry, RegistryError, SessionOptions};

/// Per-session events as they arrive on a channel's aggregated stream.
pub type ChannelEvent = (String, PtyEvent);

/// Per-connection protocol handler.
///
/// Decodes inbound control/data messages, dispatches them to the registry and
/// encodes outbound events. Tracks the set of session ids this channel
/// created; those sessions are scoped to the connection and are killed when
/// it closes.
pub struct ChannelHandler {
    registry: Registry,
    owned: HashSet<String>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl ChannelHandler {
    /// Returns the handler plus the receiving end of the channel's aggregated
    /// PTY event stream; the caller feeds each event back through
    /// [`ChannelHandler::handle_event`].
    pub fn new(registry: Registry) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                owned: HashSet::new(),
                events_tx,
            },
            events_rx,
        )
    }

    /// Session ids created by this channel and still considered live.
    pub fn owned_sessions(&self) -> &HashSet<String> {
        &self.owned
    }

    /// Decode and dispatch one raw inbound frame. Malformed or unknown
    /// messages produce an error scoped to the sentinel "system" session id;
    /// the connection stays open.
    pub async fn handle_raw(&mut self, text: &str) -> Option<ServerMessage> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => {
                warn!(error = %e, "unparseable channel message");
                Some(ServerMessage::error(SYSTEM_SESSION_ID, "Invalid message format"))
            }
        }
    }

    /// Dispatch one decoded message, returning the direct reply if any.
    pub async fn handle_message(&mut self, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Create {
                session_id,
                shell,
                cwd,
                env,
                cols,
                rows,
            } => {
                let opts = SessionOptions {
                    shell,
                    cwd,
                    env,
                    cols,
                    rows,
                };
                match self.registry.create_session(&session_id, opts).await {
                    Ok((pid, events)) => {
                        self.owned.insert(session_id.clone());
                        self.pump_events(session_id.clone(), events);
                        Some(ServerMessage::Created { session_id, pid })
                    }
                    Err(RegistryError::DuplicateSession(_)) => {
                        Some(ServerMessage::error(session_id, "Session already exists"))
                    }
                    Err(e) => {
                        error!(session_id = %session_id, error = %e, "session creation failed");
                        Some(ServerMessage::error(
                            session_id,
                            "Failed to create terminal session",
                        ))
                    }
                }
            }
            ClientMessage::Data { session_id, data } => {
                match self.registry.write(&session_id, data.as_bytes()).await {
                    Ok(()) => None,
                    Err(RegistryError::SessionNotFound(_)) => {
                        Some(ServerMessage::not_found(session_id))
                    }
                    Err(e) => Some(ServerMessage::error(session_id, e.to_string())),
                }
            }
            ClientMessage::Resize {
                session_id,
                cols,
                rows,
            } => match self.registry.resize(&session_id, cols, rows).await {
                Ok(()) => None,
                Err(RegistryError::SessionNotFound(_)) => {
                    Some(ServerMessage::not_found(session_id))
                }
                Err(e) => Some(ServerMessage::error(session_id, e.to_string())),
            },
            ClientMessage::ProcessList { session_id } => {
                let processes = self.registry.list_process_info().await;
                Some(ServerMessage::ProcessList {
                    session_id: session_id.unwrap_or_else(|| SYSTEM_SESSION_ID.to_string()),
                    processes,
                })
            }
            ClientMessage::Kill {
                session_id,
                pid: Some(pid),
            } => match self.registry.kill_by_pid(pid).await {
                Ok(Some(id)) => {
                    self.owned.remove(&id);
                    Some(ServerMessage::Killed { session_id: id })
                }
                Ok(None) => Some(ServerMessage::Killed { session_id }),
                Err(e) => Some(ServerMessage::error(
                    session_id,
                    format!("Failed to kill process: {e}"),
                )),
            },
            ClientMessage::Kill {
                session_id,
                pid: None,
            } => match self.registry.kill(&session_id).await {
                Ok(()) => {
                    self.owned.remove(&session_id);
                    Some(ServerMessage::Killed { session_id })
                }
                Err(RegistryError::SessionNotFound(_)) => {
                    Some(ServerMessage::not_found(session_id))
                }
                Err(e) => Some(ServerMessage::error(session_id, e.to_string())),
            },
        }
    }

    /// Turn one PTY event into its outbound message.
    ///
    /// A late exit for a session that was already killed and deregistered
    /// emits nothing.
    pub async fn handle_event(
        &mut self,
        session_id: String,
        event: PtyEvent,
    ) -> Option<ServerMessage> {
        match event {
            PtyEvent::Data(bytes) => Some(ServerMessage::Data {
                data: String::from_utf8_lossy(&bytes).into_owned(),
                session_id,
            }),
            PtyEvent::Exit { code, signal } => {
                self.owned.remove(&session_id);
                if self.registry.remove_on_exit(&session_id).await {
                    Some(ServerMessage::Exit {
                        session_id,
                        exit_code: code,
                        signal,
                    })
                } else {
                    None
                }
            }
        }
    }

    /// Kill every session this channel created. Sessions must not outlive the
    /// connection that created them.
    pub async fn close(&mut self) {
        for id in std::mem::take(&mut self.owned) {
            match self.registry.kill(&id).await {
                Ok(()) => info!(session_id = %id, "killed session on channel close"),
                // Already gone; the exit race is fine.
                Err(RegistryError::SessionNotFound(_)) => {}
                Err(e) => warn!(session_id = %id, error = %e, "cleanup kill failed"),
            }
        }
    }

    /// Forward a session's PTY events into this channel's aggregated stream.
    fn pump_events(&self, session_id: String, mut events: PtyEventReceiver) {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send((session_id.clone(), event)).is_err() {
                    break;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::MockPtyFactory;
    use std::sync::Arc;

    fn handler_with_mock() -> (
        ChannelHandler,
        mpsc::UnboundedReceiver<ChannelEvent>,
        Arc<MockPtyFactory>,
        Registry,
    ) {
        let factory = Arc::new(MockPtyFactory::new());
        let registry = Registry::new(factory.clone());
        let (handler, events_rx) = ChannelHandler::new(registry.clone());
        (handler, events_rx, factory, registry)
    }

    async fn create(handler: &mut ChannelHandler, id: &str) -> ServerMessage {
        handler
            .handle_raw(&format!(
                r#"{{"type":"create","sessionId":"{id}","cols":80,"rows":24}}"#
            ))
            .await
            .expect("create should reply")
    }

    #[tokio::test]
    async fn create_replies_created_with_pid() {
        let (mut handler, _rx, _factory, _registry) = handler_with_mock();
        match create(&mut handler, "s1").await {
            ServerMessage::Created { session_id, pid } => {
                assert_eq!(session_id, "s1");
                assert!(pid >= 1000);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(handler.owned_sessions().contains("s1"));
    }

    #[tokio::test]
    async fn duplicate_create_reports_session_already_exists() {
        let (mut handler, _rx, _factory, _registry) = handler_with_mock();
        create(&mut handler, "s1").await;
        match create(&mut handler, "s1").await {
            ServerMessage::Error { session_id, error } => {
                assert_eq!(session_id, "s1");
                assert_eq!(error, "Session already exists");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn spawn_failure_reports_creation_error() {
        let registry = Registry::new(Arc::new(MockPtyFactory::failing()));
        let (mut handler, _rx) = ChannelHandler::new(registry);
        match create(&mut handler, "s1").await {
            ServerMessage::Error { error, .. } => {
                assert_eq!(error, "Failed to create terminal session");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(handler.owned_sessions().is_empty());
    }

    #[tokio::test]
    async fn data_to_unknown_session_reports_not_found() {
        let (mut handler, _rx, _factory, _registry) = handler_with_mock();
        let reply = handler
            .handle_raw(r#"{"type":"data","sessionId":"ghost","data":"ls\n"}"#)
            .await;
        match reply {
            Some(ServerMessage::Error { session_id, error }) => {
                assert_eq!(session_id, "ghost");
                assert_eq!(error, "Session not found");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn data_is_forwarded_to_the_session() {
        let (mut handler, _rx, factory, _registry) = handler_with_mock();
        create(&mut handler, "s1").await;
        let reply = handler
            .handle_raw(r#"{"type":"data","sessionId":"s1","data":"echo hi\n"}"#)
            .await;
        assert!(reply.is_none());
        assert_eq!(factory.last_handle().unwrap().written(), b"echo hi\n");
    }

    #[tokio::test]
    async fn malformed_message_errors_on_system_session() {
        let (mut handler, _rx, _factory, _registry) = handler_with_mock();
        for raw in ["not json at all", r#"{"type":"reboot"}"#, "{}"] {
            match handler.handle_raw(raw).await {
                Some(ServerMessage::Error { session_id, .. }) => {
                    assert_eq!(session_id, SYSTEM_SESSION_ID);
                }
                other => panic!("unexpected reply for {raw:?}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn process_list_reflects_registry() {
        let (mut handler, _rx, _factory, _registry) = handler_with_mock();
        create(&mut handler, "s1").await;
        create(&mut handler, "s2").await;

        match handler.handle_raw(r#"{"type":"process-list"}"#).await {
            Some(ServerMessage::ProcessList {
                session_id,
                processes,
            }) => {
                assert_eq!(session_id, SYSTEM_SESSION_ID);
                let mut ids: Vec<String> =
                    processes.into_iter().map(|p| p.session_id).collect();
                ids.sort();
                assert_eq!(ids, vec!["s1".to_string(), "s2".to_string()]);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn kill_removes_session_and_second_kill_is_not_found() {
        let (mut handler, _rx, _factory, registry) = handler_with_mock();
        create(&mut handler, "s1").await;

        match handler
            .handle_raw(r#"{"type":"kill","sessionId":"s1"}"#)
            .await
        {
            Some(ServerMessage::Killed { session_id }) => assert_eq!(session_id, "s1"),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(!handler.owned_sessions().contains("s1"));
        assert_eq!(registry.counts().await, (0, 0));

        match handler
            .handle_raw(r#"{"type":"kill","sessionId":"s1"}"#)
            .await
        {
            Some(ServerMessage::Error { error, .. }) => assert_eq!(error, "Session not found"),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn kill_by_pid_resolves_owning_session() {
        let (mut handler, _rx, _factory, registry) = handler_with_mock();
        let pid = match create(&mut handler, "s1").await {
            ServerMessage::Created { pid, .. } => pid,
            other => panic!("unexpected reply: {other:?}"),
        };

        match handler
            .handle_raw(&format!(
                r#"{{"type":"kill","sessionId":"s1","pid":{pid}}}"#
            ))
            .await
        {
            Some(ServerMessage::Killed { session_id }) => assert_eq!(session_id, "s1"),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(registry.counts().await, (0, 0));
    }

    #[tokio::test]
    async fn natural_exit_emits_exit_event_and_deregisters() {
        let (mut handler, mut rx, factory, registry) = handler_with_mock();
        create(&mut handler, "s1").await;

        factory.last_handle().unwrap().emit_exit(7);
        let (session_id, event) = rx.recv().await.expect("exit event expected");
        match handler.handle_event(session_id, event).await {
            Some(ServerMessage::Exit {
                session_id,
                exit_code,
                ..
            }) => {
                assert_eq!(session_id, "s1");
                assert_eq!(exit_code, Some(7));
            }
            other => panic!("unexpected outbound: {other:?}"),
        }
        assert_eq!(registry.counts().await, (0, 0));

        // Post-exit data is a not-found error, not a crash.
        match handler
            .handle_raw(r#"{"type":"data","sessionId":"s1","data":"x"}"#)
            .await
        {
            Some(ServerMessage::Error { error, .. }) => assert_eq!(error, "Session not found"),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exit_after_explicit_kill_is_suppressed() {
        let (mut handler, mut rx, _factory, _registry) = handler_with_mock();
        create(&mut handler, "s1").await;

        handler
            .handle_raw(r#"{"type":"kill","sessionId":"s1"}"#)
            .await;
        // The mock emits an Exit event in response to kill; it must not
        // produce a second outbound message.
        let (session_id, event) = rx.recv().await.expect("exit event expected");
        assert!(handler.handle_event(session_id, event).await.is_none());
    }

    #[tokio::test]
    async fn pty_output_is_forwarded_as_data_messages() {
        let (mut handler, mut rx, factory, _registry) = handler_with_mock();
        create(&mut handler, "s1").await;

        factory.last_handle().unwrap().emit_data(b"hello from shell");
        let (session_id, event) = rx.recv().await.unwrap();
        match handler.handle_event(session_id, event).await {
            Some(ServerMessage::Data { session_id, data }) => {
                assert_eq!(session_id, "s1");
                assert_eq!(data, "hello from shell");
            }
            other => panic!("unexpected outbound: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_kills_every_owned_session() {
        let (mut handler, _rx, factory, registry) = handler_with_mock();
        create(&mut handler, "a").await;
        create(&mut handler, "b").await;
        assert_eq!(registry.counts().await, (2, 2));

        handler.close().await;
        assert_eq!(registry.counts().await, (0, 0));
        assert!(factory.handles().iter().all(|h| !h.is_alive()));
        assert!(handler.owned_sessions().is_empty());
    }
}
