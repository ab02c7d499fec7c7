mod actions;
mod arena;
mod collaborators;
mod core;
mod error;
mod logging;
mod session;
mod state;
mod text;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use crate::collaborators::{write_slot, CollaboratorSlots};
use flume::{Receiver, Sender};

pub use actions::ComposeAction;
pub use arena::{SessionArena, MAX_FOLLOW_UPS};
pub use collaborators::{
    AccountDirectory, MediaUploader, PlatformCapabilities, SharedAccountDirectory,
    SharedMediaUploader, SharedPlatformCapabilities, UploadOutcome,
};
pub use error::ComposeError;
pub use session::{
    CompositionSession, DEFAULT_POLL_DURATION_SECS, MAX_ATTACHMENTS, MAX_POLL_OPTIONS,
    MIN_POLL_OPTIONS,
};
pub use state::*;
pub use text::{autocomplete_token, default_relevance, mention_candidates, MentionCandidates};
pub use updates::*;

/// Return the default `compose_config.json` payload used when no config file exists.
#[uniffi::export]
pub fn default_config_json() -> String {
    core::default_config_json()
}

/// Characters as the counter shows them: one per grapheme cluster.
#[uniffi::export]
pub fn visible_character_count(text: &str) -> u32 {
    u32::try_from(text::visible_length(text)).unwrap_or(u32::MAX)
}

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait ComposerReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: ComposerUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiComposer {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<ComposerUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<ComposerState>>,
    slots: CollaboratorSlots,
}

#[uniffi::export]
impl FfiComposer {
    #[uniffi::constructor]
    pub fn new(data_dir: String) -> Arc<Self> {
        logging::init_logging(&data_dir);
        tracing::info!(data_dir = %data_dir, "FfiComposer::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(ComposerState::empty()));
        let slots = CollaboratorSlots::default();

        // Actor loop thread (single threaded "composer actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        let slots_for_core = slots.clone();
        let (ready_tx, ready_rx) = flume::bounded::<()>(1);
        thread::spawn(move || {
            let mut core = crate::core::ComposerCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                slots_for_core,
            );
            let _ = ready_tx.send(());
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
        });
        // state() must already show the initial root draft.
        let _ = ready_rx.recv();

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            slots,
        })
    }

    pub fn state(&self) -> ComposerState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: ComposeAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn ComposerReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    pub fn set_media_uploader(&self, uploader: Box<dyn MediaUploader>) {
        write_slot(&self.slots.media_uploader, Arc::from(uploader));
    }

    pub fn set_account_directory(&self, directory: Box<dyn AccountDirectory>) {
        write_slot(&self.slots.account_directory, Arc::from(directory));
    }

    pub fn set_platform_capabilities(&self, capabilities: Box<dyn PlatformCapabilities>) {
        write_slot(&self.slots.platform_capabilities, Arc::from(capabilities));
        let _ = self
            .core_tx
            .send(CoreMsg::Internal(Box::new(InternalEvent::CapabilitiesChanged)));
    }
}
