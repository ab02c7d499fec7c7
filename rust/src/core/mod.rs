mod config;
mod mentions;
mod uploads;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::ComposeAction;
use crate::arena::SessionArena;
use crate::collaborators::{read_slot, CollaboratorSlots};
use crate::error::ComposeError;
use crate::session::CompositionSession;
use crate::state::{ComposeMode, ComposerState, MediaSource, PostDraft, SessionView};
use crate::updates::{ComposerUpdate, CoreMsg, InternalEvent};

pub(crate) use config::default_config_json;

pub struct ComposerCore {
    pub state: ComposerState,
    rev: u64,
    update_sender: Sender<ComposerUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<ComposerState>>,
    config: config::ComposerConfig,
    runtime: tokio::runtime::Runtime,
    arena: SessionArena,
    max_characters: u32,
    media_sources: Vec<MediaSource>,
    slots: CollaboratorSlots,
    // attachment_id -> running upload
    uploads: HashMap<String, uploads::InFlightUpload>,
    upload_seq: u64,
    mention_lookup: Option<mentions::MentionLookup>,
    mention_lookup_token: u64,
}

fn session_view(session: &CompositionSession, max_characters: u32) -> SessionView {
    SessionView {
        id: session.id().to_string(),
        parent_id: session.parent_id().map(ToString::to_string),
        mode: session.mode().clone(),
        body_text: session.body_text().to_string(),
        cursor: u32::try_from(session.cursor()).unwrap_or(u32::MAX),
        content_warning_enabled: session.content_warning_enabled(),
        content_warning_text: session.content_warning_text().to_string(),
        visibility: session.visibility(),
        poll: session.poll().cloned(),
        attachments: session.attachments().to_vec(),
        language_tag: session.language_tag().map(ToString::to_string),
        has_backup_text: session.has_backup_text(),
        visible_length: u32::try_from(session.visible_length()).unwrap_or(u32::MAX),
        character_budget: session.character_budget(max_characters),
        is_submittable: session.is_submittable(max_characters),
        can_add_attachment: session.can_add_attachment(),
        can_toggle_poll: session.can_toggle_poll(),
        autocomplete: session.autocomplete_token(),
    }
}

impl ComposerCore {
    pub fn new(
        update_sender: Sender<ComposerUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<ComposerState>>,
        slots: CollaboratorSlots,
    ) -> Self {
        let config = config::load_composer_config(&data_dir);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("tokio runtime");

        let root = CompositionSession::with_mode(
            ComposeMode::New,
            config.default_visibility(),
            config.default_language(),
        );
        tracing::info!(
            max_characters = config.max_characters(),
            visibility = ?config.default_visibility(),
            "composer: starting"
        );

        let mut this = Self {
            state: ComposerState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            max_characters: config.max_characters(),
            config,
            runtime,
            arena: SessionArena::new(root),
            media_sources: MediaSource::all(),
            slots,
            uploads: HashMap::new(),
            upload_seq: 0,
            mention_lookup: None,
            mention_lookup_token: 0,
        };
        this.media_sources = this.query_media_sources();
        this.rebuild_state();

        // Ensure FfiComposer.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &ComposerState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    /// Re-derives everything the UI reads from the arena. Toast and mention
    /// suggestions are owned by the core and survive the rebuild.
    fn rebuild_state(&mut self) {
        let max = self.max_characters;
        self.state.sessions = self.arena.chain().map(|s| session_view(s, max)).collect();
        self.state.focused_session_id = self.arena.focused_id().to_string();
        self.state.max_characters = max;
        self.state.can_add_follow_up = self.arena.can_add_follow_up();
        self.state.can_submit = self.ready_to_submit();
        self.state.media_sources = self.media_sources.clone();
    }

    fn emit_state(&mut self) {
        self.rebuild_state();
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(ComposerUpdate::FullState(snapshot));
    }

    fn emit_submission(&mut self, drafts: Vec<PostDraft>) {
        let rev = self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self
            .update_sender
            .send(ComposerUpdate::SubmissionReady { rev, drafts });
    }

    // Toast stays in state until the UI clears it.
    fn toast(&mut self, msg: impl Into<String>) {
        self.state.toast = Some(msg.into());
    }

    fn query_media_sources(&self) -> Vec<MediaSource> {
        let Some(capabilities) = read_slot(&self.slots.platform_capabilities) else {
            return MediaSource::all();
        };
        let mut sources: Vec<MediaSource> = Vec::new();
        for source in capabilities.media_sources() {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources
    }

    /// Drops every draft and starts over with a single root in `mode`.
    fn reset(&mut self, mode: ComposeMode) {
        self.cancel_all_uploads();
        self.cancel_mention_lookup();
        self.state.mention_suggestions.clear();
        self.arena = SessionArena::new(CompositionSession::with_mode(
            mode,
            self.config.default_visibility(),
            self.config.default_language(),
        ));
    }

    /// Runs `f` against a draft. Unknown drafts and validation failures end up
    /// as a toast and `None`.
    fn edit_session<T, F>(&mut self, session_id: &str, f: F) -> Option<T>
    where
        F: FnOnce(&mut CompositionSession) -> Result<T, ComposeError>,
    {
        let result = match self.arena.get_mut(session_id) {
            Some(session) => f(session),
            None => {
                tracing::warn!(session_id, "compose: unknown draft");
                self.toast("This draft no longer exists");
                return None;
            }
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(session_id, err = %e, "compose: rejected");
                self.toast(e.user_visible_message());
                None
            }
        }
    }

    /// Every draft is valid and every media id is known.
    fn ready_to_submit(&self) -> bool {
        self.arena.is_submittable(self.max_characters) && !self.arena.has_pending_attachments()
    }

    fn submit_blocker(&self) -> &'static str {
        if self.arena.has_pending_attachments() {
            return "Media is still uploading";
        }
        let max = self.max_characters;
        for session in self.arena.chain() {
            if session.character_budget(max) < 0 {
                return "A post is over the character limit";
            }
            if session.attachments().iter().any(|a| a.status.is_failed()) {
                return "Remove or retry the failed attachment";
            }
            if session.poll().is_some() && !session.is_submittable(max) {
                return "Fill in at least two poll options";
            }
            if !session.is_submittable(max) {
                return "A post in this thread is empty";
            }
        }
        "Nothing to post"
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: it carries draft text.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
                self.sync_mention_lookup();
                self.emit_state();
            }
            CoreMsg::Internal(internal) => {
                if self.handle_internal(*internal) {
                    self.emit_state();
                }
            }
        }
    }

    /// Returns whether the event changed anything the UI can see.
    fn handle_internal(&mut self, internal: InternalEvent) -> bool {
        match internal {
            InternalEvent::UploadFinished {
                session_id,
                attachment_id,
                token,
                outcome,
            } => self.handle_upload_finished(&session_id, &attachment_id, token, outcome),
            InternalEvent::MentionLookupFinished {
                session_id,
                token,
                query,
                results,
            } => self.handle_mention_lookup_finished(&session_id, token, &query, results),
            InternalEvent::CapabilitiesChanged => {
                self.media_sources = self.query_media_sources();
                tracing::debug!(sources = self.media_sources.len(), "media sources updated");
                true
            }
        }
    }

    fn handle_action(&mut self, action: ComposeAction) {
        match action {
            ComposeAction::Begin { mode } => {
                self.reset(mode);
            }
            ComposeAction::Submit => {
                // Drafts leave only with every media id known.
                if !self.ready_to_submit() {
                    let msg = self.submit_blocker();
                    tracing::warn!(reason = msg, "submit: refused");
                    self.toast(msg);
                    return;
                }
                let drafts = self.arena.drafts();
                tracing::info!(posts = drafts.len(), "submission ready");
                self.emit_submission(drafts);
                self.reset(ComposeMode::New);
            }
            ComposeAction::Discard => {
                self.reset(ComposeMode::New);
            }

            ComposeAction::AddFollowUp => match self.arena.add_follow_up() {
                Ok(id) => {
                    self.arena.focus(&id);
                }
                Err(e) => {
                    tracing::warn!(err = %e, "compose: follow-up rejected");
                    self.toast(e.user_visible_message());
                }
            },
            ComposeAction::RemoveFollowUp { session_id } => {
                if let Some(removed) = self.arena.remove_follow_up(&session_id) {
                    for attachment in removed.attachments() {
                        self.abort_upload(&attachment.id, true);
                    }
                }
            }
            ComposeAction::Focus { session_id } => {
                if !self.arena.focus(&session_id) {
                    tracing::warn!(session_id = %session_id, "focus: unknown draft");
                }
            }

            ComposeAction::InsertText { session_id, text } => {
                self.edit_session(&session_id, |s| {
                    s.insert_text(&text);
                    Ok(())
                });
            }
            ComposeAction::ReplaceText { session_id, text } => {
                self.edit_session(&session_id, |s| {
                    s.replace_text(&text);
                    Ok(())
                });
            }
            ComposeAction::RestoreBackupText { session_id } => {
                self.edit_session(&session_id, |s| {
                    s.restore_backup_text();
                    Ok(())
                });
            }
            ComposeAction::SetCursor {
                session_id,
                position,
            } => {
                self.edit_session(&session_id, |s| {
                    s.set_cursor(position as usize);
                    Ok(())
                });
            }
            ComposeAction::InsertCustomEmoji {
                session_id,
                shortcode,
            } => {
                self.edit_session(&session_id, |s| {
                    s.insert_custom_emoji(&shortcode);
                    Ok(())
                });
            }
            ComposeAction::SelectAutocompleteSuggestion { session_id, value } => {
                self.edit_session(&session_id, |s| {
                    s.complete_autocomplete(&value);
                    Ok(())
                });
            }
            ComposeAction::ToggleContentWarning { session_id } => {
                self.edit_session(&session_id, |s| {
                    s.toggle_content_warning();
                    Ok(())
                });
            }
            ComposeAction::SetContentWarningText { session_id, text } => {
                self.edit_session(&session_id, |s| {
                    s.set_content_warning_text(&text);
                    Ok(())
                });
            }

            ComposeAction::SetVisibility {
                session_id,
                visibility,
            } => {
                self.edit_session(&session_id, |s| {
                    s.set_visibility(visibility);
                    Ok(())
                });
            }
            ComposeAction::SetLanguage {
                session_id,
                language,
            } => {
                self.edit_session(&session_id, |s| {
                    s.set_language(language);
                    Ok(())
                });
            }

            ComposeAction::AddAttachment {
                session_id,
                source,
                locator,
            } => {
                if !self.media_sources.contains(&source) {
                    tracing::warn!(source = ?source, "attach: source unavailable");
                    self.toast(format!("{} is not available", source.label()));
                    return;
                }
                let attachment_id =
                    self.edit_session(&session_id, |s| s.add_attachment(source, &locator));
                if let Some(attachment_id) = attachment_id {
                    self.start_upload(&session_id, &attachment_id, locator);
                }
            }
            ComposeAction::RemoveAttachment {
                session_id,
                attachment_id,
            } => {
                let removed =
                    self.edit_session(&session_id, |s| Ok(s.remove_attachment(&attachment_id)));
                if removed.flatten().is_some() {
                    self.abort_upload(&attachment_id, true);
                }
            }
            ComposeAction::CancelUpload {
                session_id,
                attachment_id,
            } => {
                self.cancel_upload(&session_id, &attachment_id);
            }
            ComposeAction::SetAttachmentDescription {
                session_id,
                attachment_id,
                description,
            } => {
                self.edit_session(&session_id, |s| {
                    s.set_attachment_description(&attachment_id, description);
                    Ok(())
                });
            }

            ComposeAction::SetPollDraft {
                session_id,
                options,
                duration_secs,
                multiple,
            } => {
                let duration_secs = if duration_secs == 0 {
                    self.config.default_poll_duration_secs()
                } else {
                    duration_secs
                };
                self.edit_session(&session_id, |s| {
                    s.set_poll_draft(options, duration_secs, multiple)
                });
            }
            ComposeAction::TogglePoll { session_id } => {
                let duration_secs = self.config.default_poll_duration_secs();
                self.edit_session(&session_id, |s| s.toggle_poll(duration_secs));
            }
            ComposeAction::ClearPollDraft { session_id } => {
                self.edit_session(&session_id, |s| {
                    s.clear_poll_draft();
                    Ok(())
                });
            }

            ComposeAction::SetMaxCharacters { max_characters } => {
                if max_characters == 0 {
                    tracing::warn!("ignoring zero character limit");
                    return;
                }
                self.max_characters = max_characters;
            }

            ComposeAction::ClearToast => {
                self.state.toast = None;
            }
        }
    }
}
