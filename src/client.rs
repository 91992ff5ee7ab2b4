//! Embedded-context bridge client.
//!
//! Exposes the typed call surface. Every call follows the same shape:
//! build a request body, register a pending entry, send, await settlement.
//! A spawned listener task settles pending calls as responses arrive on the
//! channel; everything else on the shared channel is ignored.

use std::sync::Arc;

use mailbridge_core::encoding;
use mailbridge_core::protocol::{
    CalendarDescriptor, FileDescriptor, FilePayload, Request, RequestBody, Response, ResponseBody,
    ShareLink, UpsertOutcome,
};
use mailbridge_core::{BridgeError, BridgeResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::channel::{MessageChannel, ReadyHandle};
use crate::pending::{PendingCalls, DEFAULT_TIMEOUT_MS};

/// Options for [`BridgeClient::pick_files`].
#[derive(Debug, Clone)]
pub struct PickOptions {
    pub multiple: bool,
    pub mime_types: Option<Vec<String>>,
}

impl Default for PickOptions {
    fn default() -> Self {
        PickOptions {
            multiple: true,
            mime_types: None,
        }
    }
}

pub struct BridgeClient {
    pending: Arc<PendingCalls>,
    outbound: Arc<dyn MessageChannel>,
    ready: ReadyHandle,
    listener: JoinHandle<()>,
}

impl BridgeClient {
    /// Build a client over a channel. `ready` is fired by the environment
    /// once the host context is reachable; no message is sent before that.
    pub fn new(
        outbound: Arc<dyn MessageChannel>,
        inbound: mpsc::UnboundedReceiver<serde_json::Value>,
        ready: ReadyHandle,
    ) -> Self {
        let pending = Arc::new(PendingCalls::new());
        let listener = tokio::spawn(listen(inbound, Arc::clone(&pending)));
        BridgeClient {
            pending,
            outbound,
            ready,
            listener,
        }
    }

    /// Send one call and await its settlement under an explicit deadline.
    pub async fn call_with_timeout(
        &self,
        body: RequestBody,
        timeout_ms: u64,
    ) -> BridgeResult<Response> {
        self.ready.wait().await?;

        let request = Request::new(body);
        let value = serde_json::to_value(&request)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        let rx = self.pending.register(&request.request_id);
        if let Err(e) = self.outbound.send(value) {
            self.pending.abandon(&request.request_id);
            return Err(e);
        }

        self.pending
            .await_settled(&request.request_id, rx, timeout_ms)
            .await
    }

    async fn call(&self, body: RequestBody) -> BridgeResult<Response> {
        self.call_with_timeout(body, DEFAULT_TIMEOUT_MS).await
    }

    /// Open the host's file picker. An empty list means the user selected
    /// nothing.
    pub async fn pick_files(&self, options: PickOptions) -> BridgeResult<Vec<FileDescriptor>> {
        let response = self
            .call(RequestBody::PickFile {
                multiple: options.multiple,
                mime_types: options.mime_types,
            })
            .await?;
        Ok(match response.body {
            ResponseBody::Files { files } => files,
            _ => vec![],
        })
    }

    /// Store one file in the host, returning its storage path. Content is
    /// base64-encoded for the wire here.
    pub async fn save_file(
        &self,
        filename: &str,
        content: &[u8],
        mime_type: &str,
    ) -> BridgeResult<String> {
        let response = self
            .call(RequestBody::SaveFile {
                filename: filename.to_string(),
                content: encoding::bytes_to_base64(content),
                mime_type: mime_type.to_string(),
            })
            .await?;
        Ok(match response.body {
            ResponseBody::Path { path } => path,
            _ => String::new(),
        })
    }

    /// Store several files, returning the common storage path.
    pub async fn save_files(&self, files: Vec<FilePayload>) -> BridgeResult<String> {
        let response = self.call(RequestBody::SaveFiles { files }).await?;
        Ok(match response.body {
            ResponseBody::Path { path } => path,
            _ => String::new(),
        })
    }

    /// Let the user pick a file and share it, returning the public link.
    pub async fn create_share_link(&self) -> BridgeResult<ShareLink> {
        let response = self.call(RequestBody::CreateShareLink {}).await?;
        Ok(match response.body {
            ResponseBody::Share { url, filename } => ShareLink { url, filename },
            _ => ShareLink {
                url: String::new(),
                filename: String::new(),
            },
        })
    }

    /// List the calendars visible to the current identity.
    pub async fn get_calendars(&self) -> BridgeResult<Vec<CalendarDescriptor>> {
        let response = self.call(RequestBody::GetCalendars {}).await?;
        Ok(match response.body {
            ResponseBody::Calendars { calendars } => calendars,
            _ => vec![],
        })
    }

    /// Reconcile a calendar document into the referenced calendar.
    pub async fn add_to_calendar(
        &self,
        calendar_reference: &str,
        document_text: &str,
    ) -> BridgeResult<UpsertOutcome> {
        let response = self
            .call(RequestBody::AddToCalendar {
                calendar_url: calendar_reference.to_string(),
                ics_content: document_text.to_string(),
            })
            .await?;
        match response.body {
            ResponseBody::Upsert { updated, uid } => Ok(UpsertOutcome { updated, uid }),
            _ => Err(BridgeError::Serialization(
                "response missing upsert fields".to_string(),
            )),
        }
    }

    /// Number of calls currently awaiting settlement.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Tear the client down, failing every still-pending call.
    pub fn shutdown(&self) {
        self.listener.abort();
        self.pending.reject_all();
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn listen(
    mut inbound: mpsc::UnboundedReceiver<serde_json::Value>,
    pending: Arc<PendingCalls>,
) {
    use mailbridge_core::protocol::{decode, Inbound};

    while let Some(value) = inbound.recv().await {
        match decode(&value) {
            Some(Inbound::Response(response)) => {
                if !pending.settle(response) {
                    // late (already timed out) or foreign response
                    trace!("discarding unmatched response");
                }
            }
            // Requests are the dispatcher's business; foreign traffic is
            // expected on the shared channel.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel_pair, ReadySignal};
    use serde_json::json;

    #[tokio::test]
    async fn call_times_out_when_no_response_arrives() {
        let (client_end, _host_end) = channel_pair();
        let client = BridgeClient::new(
            client_end.outbound,
            client_end.inbound,
            ReadySignal::fired(),
        );

        let result = client
            .call_with_timeout(RequestBody::GetCalendars {}, 50)
            .await;
        assert!(matches!(result, Err(BridgeError::Timeout(50))));
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn no_message_leaves_before_the_ready_signal() {
        let (client_end, mut host_end) = channel_pair();
        let (signal, handle) = ReadySignal::new();
        let client = Arc::new(BridgeClient::new(
            client_end.outbound,
            client_end.inbound,
            handle,
        ));

        let caller = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .call_with_timeout(RequestBody::GetCalendars {}, 1_000)
                    .await
            })
        };

        // nothing may cross the channel while the signal is unfired
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(host_end.inbound.try_recv().is_err());

        signal.fire();
        let request = host_end.inbound.recv().await.unwrap();
        assert_eq!(request["action"], "getCalendars");

        host_end
            .outbound
            .send(json!({
                "requestId": request["requestId"],
                "success": true,
                "calendars": [],
            }))
            .unwrap();
        assert!(caller.await.unwrap().unwrap().success);
    }

    #[tokio::test]
    async fn failure_response_surfaces_the_remote_message() {
        let (client_end, mut host_end) = channel_pair();
        let client = Arc::new(BridgeClient::new(
            client_end.outbound,
            client_end.inbound,
            ReadySignal::fired(),
        ));

        let caller = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.add_to_calendar("a/b", "BEGIN:VCALENDAR").await })
        };

        let request = host_end.inbound.recv().await.unwrap();
        host_end
            .outbound
            .send(json!({
                "requestId": request["requestId"],
                "success": false,
                "error": "Invalid calendar reference: a/b",
            }))
            .unwrap();

        match caller.await.unwrap() {
            Err(BridgeError::Remote(message)) => {
                assert_eq!(message, "Invalid calendar reference: a/b")
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_rejects_pending_calls() {
        let (client_end, _host_end) = channel_pair();
        let client = Arc::new(BridgeClient::new(
            client_end.outbound,
            client_end.inbound,
            ReadySignal::fired(),
        ));

        let caller = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .call_with_timeout(RequestBody::CreateShareLink {}, 60_000)
                    .await
            })
        };

        // let the call register before tearing down
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.shutdown();

        assert!(matches!(
            caller.await.unwrap(),
            Err(BridgeError::ChannelClosed)
        ));
    }
}
