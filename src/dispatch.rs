//! Host-side request dispatcher.
//!
//! Listens on the channel, validates each value with the protocol codec,
//! and routes requests by action to the matching capability. Every request
//! gets exactly one response carrying its originating request id; handler
//! failures become `success:false` responses and never break the loop,
//! which has to keep serving unrelated concurrent calls.

use std::sync::Arc;

use mailbridge_core::protocol::{self, Inbound, Request, RequestBody, Response, ResponseBody};
use mailbridge_core::{BridgeError, BridgeResult};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::calendar::store::EventStore;
use crate::calendar::{resolve_calendar, upsert_event};
use crate::capabilities::{FileCapabilities, IdentitySession};
use crate::channel::MessageChannel;

pub struct HostDispatcher {
    files: Arc<dyn FileCapabilities>,
    session: Arc<dyn IdentitySession>,
    store: Arc<dyn EventStore>,
    outbound: Arc<dyn MessageChannel>,
}

impl HostDispatcher {
    pub fn new(
        files: Arc<dyn FileCapabilities>,
        session: Arc<dyn IdentitySession>,
        store: Arc<dyn EventStore>,
        outbound: Arc<dyn MessageChannel>,
    ) -> Self {
        HostDispatcher {
            files,
            session,
            store,
            outbound,
        }
    }

    /// Serve inbound traffic until the channel closes.
    pub async fn serve(&self, mut inbound: mpsc::UnboundedReceiver<serde_json::Value>) {
        while let Some(value) = inbound.recv().await {
            match protocol::decode(&value) {
                // Foreign traffic on the shared channel; not an error.
                None => trace!("dropping non-bridge message"),
                // Responses are settled on the client side, not here.
                Some(Inbound::Response(_)) => {}
                Some(Inbound::UnknownRequest { request_id, action }) => {
                    self.respond(Response::err(
                        request_id,
                        BridgeError::UnknownAction(action).to_string(),
                    ));
                }
                Some(Inbound::Invalid { request_id, error }) => {
                    self.respond(Response::err(request_id, error));
                }
                Some(Inbound::Request(request)) => {
                    self.respond(self.answer(request).await);
                }
            }
        }
    }

    async fn answer(&self, request: Request) -> Response {
        match self.handle(request.body).await {
            Ok(body) => Response::ok(request.request_id, body),
            Err(e) => Response::err(request.request_id, e.to_string()),
        }
    }

    async fn handle(&self, body: RequestBody) -> BridgeResult<ResponseBody> {
        match body {
            RequestBody::PickFile {
                multiple,
                mime_types,
            } => {
                let files = self.files.pick_files(multiple, mime_types).await?;
                Ok(ResponseBody::Files { files })
            }
            RequestBody::SaveFile {
                filename,
                content,
                mime_type,
            } => {
                let path = self
                    .files
                    .save_file(protocol::FilePayload {
                        filename,
                        content,
                        mime_type,
                    })
                    .await?;
                Ok(ResponseBody::Path { path })
            }
            RequestBody::SaveFiles { files } => {
                let path = self.files.save_files(files).await?;
                Ok(ResponseBody::Path { path })
            }
            RequestBody::CreateShareLink {} => {
                let share = self.files.create_share_link().await?;
                Ok(ResponseBody::Share {
                    url: share.url,
                    filename: share.filename,
                })
            }
            RequestBody::GetCalendars {} => {
                let owner = self.current_user()?;
                let calendars = self
                    .store
                    .calendars_for(&owner)
                    .await
                    .map_err(|e| BridgeError::StoreFailure(e.to_string()))?;
                Ok(ResponseBody::Calendars {
                    calendars: calendars.iter().map(|c| c.descriptor()).collect(),
                })
            }
            RequestBody::AddToCalendar {
                calendar_url,
                ics_content,
            } => {
                let owner = self.current_user()?;
                let calendar =
                    resolve_calendar(self.store.as_ref(), &owner, &calendar_url).await?;
                let outcome = upsert_event(self.store.as_ref(), calendar.id, &ics_content).await?;
                Ok(ResponseBody::Upsert {
                    updated: outcome.updated,
                    uid: outcome.uid,
                })
            }
        }
    }

    fn current_user(&self) -> BridgeResult<String> {
        self.session
            .current_user()
            .ok_or(BridgeError::Unauthenticated)
    }

    fn respond(&self, response: Response) {
        match serde_json::to_value(&response) {
            Ok(value) => {
                if self.outbound.send(value).is_err() {
                    warn!(request_id = %response.request_id, "peer gone, response dropped");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MemoryStore;
    use crate::capabilities::StaticSession;
    use crate::channel::channel_pair;
    use async_trait::async_trait;
    use mailbridge_core::protocol::{FileDescriptor, FilePayload, ShareLink};
    use serde_json::json;

    struct NoFiles;

    #[async_trait]
    impl FileCapabilities for NoFiles {
        async fn pick_files(
            &self,
            _multiple: bool,
            _mime_types: Option<Vec<String>>,
        ) -> BridgeResult<Vec<FileDescriptor>> {
            Ok(vec![])
        }

        async fn save_file(&self, file: FilePayload) -> BridgeResult<String> {
            Ok(format!("/Mail/{}", file.filename))
        }

        async fn save_files(&self, _files: Vec<FilePayload>) -> BridgeResult<String> {
            Ok("/Mail".to_string())
        }

        async fn create_share_link(&self) -> BridgeResult<ShareLink> {
            Err(BridgeError::Remote("share dialog dismissed".to_string()))
        }
    }

    async fn roundtrip(
        store: Arc<MemoryStore>,
        user: Option<&str>,
        message: serde_json::Value,
    ) -> serde_json::Value {
        let (host_end, mut client_end) = channel_pair();
        let dispatcher = HostDispatcher::new(
            Arc::new(NoFiles),
            Arc::new(StaticSession(user.map(String::from))),
            store,
            host_end.outbound,
        );
        let serve = tokio::spawn(async move { dispatcher.serve(host_end.inbound).await });

        client_end.outbound.send(message).unwrap();
        let response = client_end.inbound.recv().await.unwrap();
        serve.abort();
        response
    }

    #[tokio::test]
    async fn unknown_action_is_answered_not_dropped() {
        let response = roundtrip(
            Arc::new(MemoryStore::new()),
            Some("alice"),
            json!({ "requestId": "req_1", "action": "launchMissiles" }),
        )
        .await;

        assert_eq!(response["requestId"], "req_1");
        assert_eq!(response["success"], false);
        assert_eq!(response["error"], "unknown action");
    }

    #[tokio::test]
    async fn handler_errors_become_failure_responses() {
        let response = roundtrip(
            Arc::new(MemoryStore::new()),
            Some("alice"),
            json!({ "requestId": "req_2", "action": "createShareLink" }),
        )
        .await;

        assert_eq!(response["success"], false);
        assert_eq!(response["error"], "share dialog dismissed");
    }

    #[tokio::test]
    async fn add_to_calendar_requires_an_identity() {
        let response = roundtrip(
            Arc::new(MemoryStore::new()),
            None,
            json!({
                "requestId": "req_3",
                "action": "addToCalendar",
                "calendarUrl": "personal",
                "icsContent": "BEGIN:VCALENDAR\nEND:VCALENDAR\n",
            }),
        )
        .await;

        assert_eq!(response["success"], false);
        assert_eq!(response["error"], "Not authenticated");
    }

    #[tokio::test]
    async fn loop_survives_a_failed_request_and_keeps_serving() {
        let store = Arc::new(MemoryStore::new());
        store.seed_calendar("alice", "personal", "Personal");

        let (host_end, mut client_end) = channel_pair();
        let dispatcher = HostDispatcher::new(
            Arc::new(NoFiles),
            Arc::new(StaticSession(Some("alice".to_string()))),
            store,
            host_end.outbound,
        );
        let serve = tokio::spawn(async move { dispatcher.serve(host_end.inbound).await });

        // malformed: dropped with no response
        client_end.outbound.send(json!({ "foo": "bar" })).unwrap();
        // failing: calendar does not exist
        client_end
            .outbound
            .send(json!({
                "requestId": "req_a",
                "action": "addToCalendar",
                "calendarUrl": "nope",
                "icsContent": "BEGIN:VCALENDAR\nEND:VCALENDAR\n",
            }))
            .unwrap();
        // healthy request afterwards
        client_end
            .outbound
            .send(json!({ "requestId": "req_b", "action": "getCalendars" }))
            .unwrap();

        let first = client_end.inbound.recv().await.unwrap();
        assert_eq!(first["requestId"], "req_a");
        assert_eq!(first["success"], false);
        assert_eq!(first["error"], "Calendar not found: nope");

        let second = client_end.inbound.recv().await.unwrap();
        assert_eq!(second["requestId"], "req_b");
        assert_eq!(second["success"], true);
        assert_eq!(second["calendars"][0]["displayName"], "Personal");

        serve.abort();
    }
}
