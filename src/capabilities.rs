//! Host capability seams.
//!
//! The trusted context's native services (file picker, storage, share links,
//! session, settings) live behind these traits; the dispatcher is written
//! against them and never against a concrete backend.

use async_trait::async_trait;
use mailbridge_core::protocol::{FileDescriptor, FilePayload, ShareLink};
use mailbridge_core::BridgeResult;

/// File and share operations the host exposes to the embedded context.
#[async_trait]
pub trait FileCapabilities: Send + Sync {
    /// Open the host's file picker. An empty result means the user selected
    /// nothing and is not an error.
    async fn pick_files(
        &self,
        multiple: bool,
        mime_types: Option<Vec<String>>,
    ) -> BridgeResult<Vec<FileDescriptor>>;

    /// Store one file, returning its storage path.
    async fn save_file(&self, file: FilePayload) -> BridgeResult<String>;

    /// Store several files, returning the common storage path.
    async fn save_files(&self, files: Vec<FilePayload>) -> BridgeResult<String>;

    /// Let the user pick a file and create a public share link for it.
    async fn create_share_link(&self) -> BridgeResult<ShareLink>;
}

/// Currently authenticated identity, or none.
pub trait IdentitySession: Send + Sync {
    fn current_user(&self) -> Option<String>;
}

/// A fixed identity, for tests and single-user embeddings.
pub struct StaticSession(pub Option<String>);

impl IdentitySession for StaticSession {
    fn current_user(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Settings key gating whether the bridge script is injected at all.
/// Injection itself happens outside this crate.
pub const BRIDGE_ENABLED_KEY: &str = "bridge_enabled";

/// String-valued settings store, consumed only by the injection glue.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}
