use std::sync::{Arc, RwLock};

use crate::state::{AccountSuggestion, MediaSource};

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub ok: bool,
    pub remote_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn success(remote_id: impl Into<String>, url: Option<String>) -> Self {
        Self {
            ok: true,
            remote_id: Some(remote_id.into()),
            url,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            remote_id: None,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Platform-side media upload. `upload` is called off the actor thread and may
/// block until the server has processed the file.
#[uniffi::export(callback_interface)]
pub trait MediaUploader: Send + Sync + 'static {
    fn upload(&self, attachment_id: String, locator: String) -> UploadOutcome;
    /// Best effort; the composer has already marked the attachment failed.
    fn cancel(&self, attachment_id: String);
}

/// Account search used for `@` autocomplete.
#[uniffi::export(callback_interface)]
pub trait AccountDirectory: Send + Sync + 'static {
    fn search(&self, prefix: String, limit: u32) -> Vec<AccountSuggestion>;
}

/// What the host device can offer. Lets the shell hide the camera on desktop
/// builds or GIF search where the SDK is unavailable.
#[uniffi::export(callback_interface)]
pub trait PlatformCapabilities: Send + Sync + 'static {
    fn media_sources(&self) -> Vec<MediaSource>;
}

pub type SharedMediaUploader = Arc<RwLock<Option<Arc<dyn MediaUploader>>>>;
pub type SharedAccountDirectory = Arc<RwLock<Option<Arc<dyn AccountDirectory>>>>;
pub type SharedPlatformCapabilities = Arc<RwLock<Option<Arc<dyn PlatformCapabilities>>>>;

#[derive(Clone, Default)]
pub(crate) struct CollaboratorSlots {
    pub(crate) media_uploader: SharedMediaUploader,
    pub(crate) account_directory: SharedAccountDirectory,
    pub(crate) platform_capabilities: SharedPlatformCapabilities,
}

pub(crate) fn read_slot<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>) -> Option<Arc<T>> {
    match slot.read() {
        Ok(g) => g.clone(),
        Err(poison) => poison.into_inner().clone(),
    }
}

pub(crate) fn write_slot<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, value: Arc<T>) {
    match slot.write() {
        Ok(mut g) => *g = Some(value),
        Err(poison) => *poison.into_inner() = Some(value),
    }
}
