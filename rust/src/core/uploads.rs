use tokio::task::AbortHandle;

use super::ComposerCore;
use crate::collaborators::{read_slot, UploadOutcome};
use crate::updates::{CoreMsg, InternalEvent};

pub(super) struct InFlightUpload {
    token: u64,
    abort: AbortHandle,
}

impl ComposerCore {
    pub(super) fn start_upload(&mut self, session_id: &str, attachment_id: &str, locator: String) {
        let Some(uploader) = read_slot(&self.slots.media_uploader) else {
            tracing::warn!(attachment_id, "upload: no media uploader configured");
            if let Some(session) = self.arena.get_mut(session_id) {
                session.mark_attachment_failed(attachment_id, "No media uploader configured");
            }
            return;
        };

        self.upload_seq = self.upload_seq.wrapping_add(1);
        let token = self.upload_seq;
        let tx = self.core_sender.clone();
        let event_session_id = session_id.to_string();
        let event_attachment_id = attachment_id.to_string();
        tracing::info!(attachment_id, token, "upload: starting");

        let handle = self.runtime.spawn(async move {
            let upload_id = event_attachment_id.clone();
            // The platform uploader blocks until the server has the file.
            let outcome =
                match tokio::task::spawn_blocking(move || uploader.upload(upload_id, locator)).await
                {
                    Ok(outcome) => outcome,
                    Err(e) => UploadOutcome::failure(format!("upload task failed: {e}")),
                };
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::UploadFinished {
                session_id: event_session_id,
                attachment_id: event_attachment_id,
                token,
                outcome,
            })));
        });

        self.uploads.insert(
            attachment_id.to_string(),
            InFlightUpload {
                token,
                abort: handle.abort_handle(),
            },
        );
    }

    pub(super) fn handle_upload_finished(
        &mut self,
        session_id: &str,
        attachment_id: &str,
        token: u64,
        outcome: UploadOutcome,
    ) -> bool {
        // Ignore results for uploads that were cancelled or removed.
        match self.uploads.get(attachment_id) {
            Some(upload) if upload.token == token => {}
            _ => {
                tracing::debug!(attachment_id, token, "upload: stale result ignored");
                return false;
            }
        }
        self.uploads.remove(attachment_id);

        let Some(session) = self.arena.get_mut(session_id) else {
            return false;
        };
        match (outcome.ok, outcome.remote_id) {
            (true, Some(remote_id)) => {
                tracing::info!(attachment_id, "upload: done");
                session.mark_attachment_uploaded(attachment_id, remote_id, outcome.url)
            }
            (true, None) => {
                tracing::warn!(attachment_id, "upload: finished without a media id");
                session.mark_attachment_failed(attachment_id, "Upload returned no media id")
            }
            (false, _) => {
                let reason = outcome.error.unwrap_or_else(|| "Upload failed".to_string());
                tracing::warn!(attachment_id, reason = %reason, "upload: failed");
                session.mark_attachment_failed(attachment_id, &reason)
            }
        }
    }

    /// User pressed cancel on a pending attachment: it stays in the draft as
    /// failed so the UI can offer to remove it.
    pub(super) fn cancel_upload(&mut self, session_id: &str, attachment_id: &str) {
        let Some(session) = self.arena.get_mut(session_id) else {
            tracing::warn!(session_id, "upload cancel: unknown draft");
            return;
        };
        if !session.mark_attachment_failed(attachment_id, "Upload cancelled") {
            tracing::debug!(attachment_id, "upload cancel: not pending");
            return;
        }
        tracing::info!(attachment_id, "upload: cancelled");
        self.abort_upload(attachment_id, true);
    }

    /// Stops tracking an upload. With `notify` the uploader is told to give up too.
    pub(super) fn abort_upload(&mut self, attachment_id: &str, notify: bool) {
        let Some(upload) = self.uploads.remove(attachment_id) else {
            return;
        };
        upload.abort.abort();
        if notify {
            if let Some(uploader) = read_slot(&self.slots.media_uploader) {
                uploader.cancel(attachment_id.to_string());
            }
        }
    }

    pub(super) fn cancel_all_uploads(&mut self) {
        let ids: Vec<String> = self.uploads.keys().cloned().collect();
        for id in ids {
            self.abort_upload(&id, true);
        }
    }
}
