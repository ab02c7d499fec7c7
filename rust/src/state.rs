use serde::{Deserialize, Serialize};

#[derive(uniffi::Record, Clone, Debug)]
pub struct ComposerState {
    pub rev: u64,
    /// Root first, then follow-ups in thread order.
    pub sessions: Vec<SessionView>,
    pub focused_session_id: String,
    pub max_characters: u32,
    pub can_add_follow_up: bool,
    pub can_submit: bool,
    pub mention_suggestions: Vec<AccountSuggestion>,
    pub media_sources: Vec<MediaSource>,
    pub toast: Option<String>,
}

impl ComposerState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            sessions: vec![],
            focused_session_id: String::new(),
            max_characters: 0,
            can_add_follow_up: false,
            can_submit: false,
            mention_suggestions: vec![],
            media_sources: MediaSource::all(),
            toast: None,
        }
    }

    pub fn session(&self, id: &str) -> Option<&SessionView> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn root(&self) -> Option<&SessionView> {
        self.sessions.first()
    }
}

/// Snapshot of one draft plus the values the UI derives its controls from.
#[derive(uniffi::Record, Clone, Debug)]
pub struct SessionView {
    pub id: String,
    pub parent_id: Option<String>,
    pub mode: ComposeMode,
    pub body_text: String,
    pub cursor: u32,
    pub content_warning_enabled: bool,
    pub content_warning_text: String,
    pub visibility: Visibility,
    pub poll: Option<PollDraft>,
    pub attachments: Vec<MediaAttachment>,
    pub language_tag: Option<String>,
    pub has_backup_text: bool,
    pub visible_length: u32,
    pub character_budget: i64,
    pub is_submittable: bool,
    pub can_add_attachment: bool,
    pub can_toggle_poll: bool,
    pub autocomplete: Option<AutocompleteToken>,
}

#[derive(
    uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    FollowersOnly,
    Direct,
}

impl Visibility {
    fn reach(self) -> u8 {
        match self {
            Self::Public => 3,
            Self::Unlisted => 2,
            Self::FollowersOnly => 1,
            Self::Direct => 0,
        }
    }

    /// The more restrictive of the two audiences.
    pub fn narrowest(self, other: Visibility) -> Visibility {
        if other.reach() < self.reach() {
            other
        } else {
            self
        }
    }
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaSource {
    PhotoLibrary,
    Camera,
    Files,
    Gif,
}

impl MediaSource {
    pub fn all() -> Vec<MediaSource> {
        vec![
            MediaSource::PhotoLibrary,
            MediaSource::Camera,
            MediaSource::Files,
            MediaSource::Gif,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaSource::PhotoLibrary => "Photo library",
            MediaSource::Camera => "Camera",
            MediaSource::Files => "Files",
            MediaSource::Gif => "GIF search",
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AttachmentStatus {
    Pending,
    Uploaded,
    Failed { reason: String },
}

impl AttachmentStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct MediaAttachment {
    pub id: String,
    pub source: MediaSource,
    pub locator: String,
    pub status: AttachmentStatus,
    pub description: Option<String>,
    pub remote_id: Option<String>,
    pub url: Option<String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PollDraft {
    pub options: Vec<String>,
    pub duration_secs: u32,
    pub multiple: bool,
}

/// Read-only reference to a post being replied to or quoted.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PostRef {
    pub id: String,
    pub author_handle: String,
    pub visibility: Visibility,
}

/// An already published post opened for editing.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct EditSource {
    pub status_id: String,
    pub text: String,
    pub spoiler_text: Option<String>,
    pub visibility: Visibility,
    pub language: Option<String>,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum ComposeMode {
    New,
    Reply { target: PostRef },
    Quote { target: PostRef },
    Edit { source: EditSource },
}

impl ComposeMode {
    pub fn is_editing(&self) -> bool {
        matches!(self, Self::Edit { .. })
    }
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Mention,
    Hashtag,
}

/// The `@` or `#` word under the cursor. `start`/`end` are char offsets into the
/// body and cover the whole word including the trigger; `query` is the part
/// typed between the trigger and the cursor.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct AutocompleteToken {
    pub kind: TokenKind,
    pub query: String,
    pub start: u32,
    pub end: u32,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct AccountSuggestion {
    pub id: String,
    pub display_name: String,
    pub handle: String,
}

/// What the posting service receives for one post of the thread.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PostDraft {
    pub session_id: String,
    /// Previous draft of the same thread, if this is a follow-up.
    pub in_reply_to_session_id: Option<String>,
    pub text: String,
    pub spoiler_text: Option<String>,
    pub visibility: Visibility,
    pub language: Option<String>,
    pub media: Vec<MediaAttachment>,
    pub poll: Option<PollDraft>,
    pub reply_to_id: Option<String>,
    pub quote_id: Option<String>,
    pub edit_status_id: Option<String>,
}
