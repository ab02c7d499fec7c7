//! State of a single post draft.
//!
//! A [`CompositionSession`] is only ever changed through its own methods. Methods
//! that can violate an invariant return [`ComposeError`] and leave the session
//! untouched when they do.

use crate::error::ComposeError;
use crate::state::{
    AccountSuggestion, AttachmentStatus, AutocompleteToken, ComposeMode, MediaAttachment,
    MediaSource, PollDraft, PostDraft, PostRef, TokenKind, Visibility,
};
use crate::text::{self, MentionCandidates};

pub const MAX_ATTACHMENTS: usize = 4;
pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 4;
pub const DEFAULT_POLL_DURATION_SECS: u32 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct CompositionSession {
    id: String,
    parent_id: Option<String>,
    mode: ComposeMode,
    body_text: String,
    cursor: usize,
    content_warning_enabled: bool,
    content_warning_text: String,
    visibility: Visibility,
    poll: Option<PollDraft>,
    attachments: Vec<MediaAttachment>,
    language_tag: Option<String>,
    backup_body_text: Option<String>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl CompositionSession {
    pub fn new(visibility: Visibility) -> Self {
        Self {
            id: new_id(),
            parent_id: None,
            mode: ComposeMode::New,
            body_text: String::new(),
            cursor: 0,
            content_warning_enabled: false,
            content_warning_text: String::new(),
            visibility,
            poll: None,
            attachments: Vec::new(),
            language_tag: None,
            backup_body_text: None,
        }
    }

    /// Starts a draft for `mode`, prefilled the way the editor opens it.
    ///
    /// Replies mention the author and never widen the audience of the post they
    /// answer. Edits start from the published text and settings.
    pub fn with_mode(
        mode: ComposeMode,
        default_visibility: Visibility,
        default_language: Option<String>,
    ) -> Self {
        let mut session = Self::new(default_visibility);
        session.language_tag = default_language;
        match &mode {
            ComposeMode::New | ComposeMode::Quote { .. } => {}
            ComposeMode::Reply { target } => {
                let handle = target.author_handle.trim().trim_start_matches('@');
                if !handle.is_empty() {
                    session.body_text = format!("@{handle} ");
                    session.cursor = text::char_count(&session.body_text);
                }
                session.visibility = default_visibility.narrowest(target.visibility);
            }
            ComposeMode::Edit { source } => {
                session.body_text = source.text.clone();
                session.cursor = text::char_count(&session.body_text);
                if let Some(spoiler) = source.spoiler_text.as_ref().filter(|s| !s.is_empty()) {
                    session.content_warning_enabled = true;
                    session.content_warning_text = spoiler.clone();
                }
                session.visibility = source.visibility;
                if source.language.is_some() {
                    session.language_tag = source.language.clone();
                }
            }
        }
        session.mode = mode;
        session
    }

    pub(crate) fn follow_up(parent_id: &str, visibility: Visibility, language: Option<String>) -> Self {
        let mut session = Self::new(visibility);
        session.parent_id = Some(parent_id.to_string());
        session.language_tag = language;
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn mode(&self) -> &ComposeMode {
        &self.mode
    }

    pub fn reply_target(&self) -> Option<&PostRef> {
        match &self.mode {
            ComposeMode::Reply { target } => Some(target),
            _ => None,
        }
    }

    pub fn quoted_target(&self) -> Option<&PostRef> {
        match &self.mode {
            ComposeMode::Quote { target } => Some(target),
            _ => None,
        }
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn content_warning_enabled(&self) -> bool {
        self.content_warning_enabled
    }

    pub fn content_warning_text(&self) -> &str {
        &self.content_warning_text
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn poll(&self) -> Option<&PollDraft> {
        self.poll.as_ref()
    }

    pub fn attachments(&self) -> &[MediaAttachment] {
        &self.attachments
    }

    pub fn attachment(&self, id: &str) -> Option<&MediaAttachment> {
        self.attachments.iter().find(|a| a.id == id)
    }

    pub fn language_tag(&self) -> Option<&str> {
        self.language_tag.as_deref()
    }

    pub fn has_backup_text(&self) -> bool {
        self.backup_body_text.is_some()
    }

    // Text

    pub fn insert_text(&mut self, fragment: &str) {
        self.cursor = text::insert_at(&mut self.body_text, self.cursor, fragment);
    }

    pub fn set_cursor(&mut self, position: usize) {
        self.cursor = position.min(text::char_count(&self.body_text));
    }

    /// Replaces the whole body, keeping the previous text for [`Self::restore_backup_text`].
    pub fn replace_text(&mut self, replacement: &str) {
        let previous = std::mem::replace(&mut self.body_text, replacement.to_string());
        self.backup_body_text = Some(previous);
        self.cursor = text::char_count(&self.body_text);
    }

    /// Puts back the body saved by the last [`Self::replace_text`]. Returns false
    /// when there is nothing to restore.
    pub fn restore_backup_text(&mut self) -> bool {
        let Some(backup) = self.backup_body_text.take() else {
            return false;
        };
        self.body_text = backup;
        self.cursor = text::char_count(&self.body_text);
        true
    }

    pub fn insert_custom_emoji(&mut self, shortcode: &str) {
        let shortcode = shortcode.trim().trim_matches(':');
        if shortcode.is_empty() {
            return;
        }
        self.insert_text(&format!(" :{shortcode}: "));
    }

    pub fn autocomplete_token(&self) -> Option<AutocompleteToken> {
        text::autocomplete_token(&self.body_text, self.cursor)
    }

    /// Replaces the token under the cursor with the chosen suggestion plus a
    /// trailing space, keeping the token's trigger character.
    pub fn complete_autocomplete(&mut self, value: &str) -> bool {
        let Some(token) = self.autocomplete_token() else {
            return false;
        };
        let value = value.trim().trim_start_matches(['@', '#']);
        if value.is_empty() {
            return false;
        }
        let trigger = match token.kind {
            TokenKind::Mention => '@',
            TokenKind::Hashtag => '#',
        };
        let replacement = format!("{trigger}{value} ");
        self.cursor = text::replace_chars(
            &mut self.body_text,
            token.start as usize,
            token.end as usize,
            &replacement,
        );
        true
    }

    /// Accounts matching the `@` token under the cursor, ranked by `relevance`.
    /// Empty when the cursor is not in a mention.
    pub fn mention_candidates<'a, F>(
        &self,
        accounts: &'a [AccountSuggestion],
        relevance: F,
    ) -> MentionCandidates<'a>
    where
        F: Fn(&AccountSuggestion, &str) -> Option<u32>,
    {
        match self.autocomplete_token() {
            Some(token) if token.kind == TokenKind::Mention => {
                text::mention_candidates(accounts, &token.query, relevance)
            }
            _ => MentionCandidates::empty(),
        }
    }

    // Content warning

    /// Flips the content warning. The warning text is kept when turning it off.
    pub fn toggle_content_warning(&mut self) {
        self.content_warning_enabled = !self.content_warning_enabled;
    }

    pub fn set_content_warning_text(&mut self, text: &str) {
        self.content_warning_text = text.to_string();
    }

    // Audience and language

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    pub fn set_language(&mut self, language: Option<String>) {
        self.language_tag = language.filter(|l| !l.trim().is_empty());
    }

    // Attachments

    pub fn can_add_attachment(&self) -> bool {
        self.poll.is_none() && self.attachments.len() < MAX_ATTACHMENTS
    }

    /// Appends a pending attachment and returns its id.
    pub fn add_attachment(
        &mut self,
        source: MediaSource,
        locator: &str,
    ) -> Result<String, ComposeError> {
        if self.attachments.len() >= MAX_ATTACHMENTS {
            return Err(ComposeError::CapacityExceeded {
                limit: MAX_ATTACHMENTS as u32,
            });
        }
        if self.poll.is_some() {
            return Err(ComposeError::ModeConflict);
        }
        let id = new_id();
        self.attachments.push(MediaAttachment {
            id: id.clone(),
            source,
            locator: locator.to_string(),
            status: AttachmentStatus::Pending,
            description: None,
            remote_id: None,
            url: None,
        });
        Ok(id)
    }

    pub fn remove_attachment(&mut self, id: &str) -> Option<MediaAttachment> {
        let idx = self.attachments.iter().position(|a| a.id == id)?;
        Some(self.attachments.remove(idx))
    }

    pub fn set_attachment_description(&mut self, id: &str, description: Option<String>) -> bool {
        let Some(attachment) = self.attachments.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        attachment.description = description.filter(|d| !d.trim().is_empty());
        true
    }

    /// `pending -> uploaded`. Anything else is left alone and reported as false.
    pub fn mark_attachment_uploaded(
        &mut self,
        id: &str,
        remote_id: String,
        url: Option<String>,
    ) -> bool {
        match self.attachments.iter_mut().find(|a| a.id == id) {
            Some(attachment) if attachment.status.is_pending() => {
                attachment.status = AttachmentStatus::Uploaded;
                attachment.remote_id = Some(remote_id);
                attachment.url = url;
                true
            }
            _ => false,
        }
    }

    /// `pending -> failed`. Anything else is left alone and reported as false.
    pub fn mark_attachment_failed(&mut self, id: &str, reason: &str) -> bool {
        match self.attachments.iter_mut().find(|a| a.id == id) {
            Some(attachment) if attachment.status.is_pending() => {
                attachment.status = AttachmentStatus::Failed {
                    reason: reason.to_string(),
                };
                true
            }
            _ => false,
        }
    }

    // Poll

    pub fn can_toggle_poll(&self) -> bool {
        self.attachments.is_empty()
    }

    pub fn set_poll_draft(
        &mut self,
        options: Vec<String>,
        duration_secs: u32,
        multiple: bool,
    ) -> Result<(), ComposeError> {
        if !self.attachments.is_empty() {
            return Err(ComposeError::ModeConflict);
        }
        if options.len() < MIN_POLL_OPTIONS || options.len() > MAX_POLL_OPTIONS {
            return Err(ComposeError::InvalidPoll {
                reason: format!(
                    "needs {MIN_POLL_OPTIONS} to {MAX_POLL_OPTIONS} options, got {}",
                    options.len()
                ),
            });
        }
        self.poll = Some(PollDraft {
            options,
            duration_secs,
            multiple,
        });
        Ok(())
    }

    pub fn clear_poll_draft(&mut self) {
        self.poll = None;
    }

    /// Poll button: shows a fresh two-option poll, or removes the current one.
    pub fn toggle_poll(&mut self, default_duration_secs: u32) -> Result<(), ComposeError> {
        if self.poll.is_some() {
            self.clear_poll_draft();
            return Ok(());
        }
        self.set_poll_draft(vec![String::new(); MIN_POLL_OPTIONS], default_duration_secs, false)
    }

    // Derived values

    pub fn visible_length(&self) -> usize {
        let warning = if self.content_warning_enabled {
            text::visible_length(&self.content_warning_text)
        } else {
            0
        };
        text::visible_length(&self.body_text) + warning
    }

    pub fn character_budget(&self, max_characters: u32) -> i64 {
        i64::from(max_characters) - self.visible_length() as i64
    }

    /// A poll counts, and may be posted, once enough of its options are filled in.
    fn has_complete_poll(&self) -> bool {
        self.poll.as_ref().is_some_and(|poll| {
            poll.options
                .iter()
                .filter(|option| !option.trim().is_empty())
                .count()
                >= MIN_POLL_OPTIONS
        })
    }

    pub fn is_submittable(&self, max_characters: u32) -> bool {
        let has_content =
            !self.body_text.is_empty() || !self.attachments.is_empty() || self.has_complete_poll();
        self.character_budget(max_characters) >= 0
            && has_content
            && (self.poll.is_none() || self.has_complete_poll())
            && !self.attachments.iter().any(|a| a.status.is_failed())
    }

    pub fn to_draft(&self, in_reply_to_session_id: Option<String>) -> PostDraft {
        let spoiler_text = if self.content_warning_enabled && !self.content_warning_text.is_empty() {
            Some(self.content_warning_text.clone())
        } else {
            None
        };
        let edit_status_id = match &self.mode {
            ComposeMode::Edit { source } => Some(source.status_id.clone()),
            _ => None,
        };
        PostDraft {
            session_id: self.id.clone(),
            in_reply_to_session_id,
            text: self.body_text.clone(),
            spoiler_text,
            visibility: self.visibility,
            language: self.language_tag.clone(),
            media: self.attachments.clone(),
            poll: self.poll.clone(),
            reply_to_id: self.reply_target().map(|t| t.id.clone()),
            quote_id: self.quoted_target().map(|t| t.id.clone()),
            edit_status_id,
        }
    }
}
