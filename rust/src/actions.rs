use crate::state::{ComposeMode, MediaSource, Visibility};

#[derive(uniffi::Enum, Debug, Clone)]
pub enum ComposeAction {
    // Lifecycle
    Begin {
        mode: ComposeMode,
    },
    Submit,
    Discard,

    // Thread
    AddFollowUp,
    RemoveFollowUp {
        session_id: String,
    },
    Focus {
        session_id: String,
    },

    // Text
    InsertText {
        session_id: String,
        text: String,
    },
    ReplaceText {
        session_id: String,
        text: String,
    },
    RestoreBackupText {
        session_id: String,
    },
    SetCursor {
        session_id: String,
        position: u32,
    },
    InsertCustomEmoji {
        session_id: String,
        shortcode: String,
    },
    SelectAutocompleteSuggestion {
        session_id: String,
        value: String,
    },
    ToggleContentWarning {
        session_id: String,
    },
    SetContentWarningText {
        session_id: String,
        text: String,
    },

    // Audience
    SetVisibility {
        session_id: String,
        visibility: Visibility,
    },
    SetLanguage {
        session_id: String,
        language: Option<String>,
    },

    // Media
    AddAttachment {
        session_id: String,
        source: MediaSource,
        locator: String,
    },
    RemoveAttachment {
        session_id: String,
        attachment_id: String,
    },
    CancelUpload {
        session_id: String,
        attachment_id: String,
    },
    SetAttachmentDescription {
        session_id: String,
        attachment_id: String,
        description: Option<String>,
    },

    // Poll
    SetPollDraft {
        session_id: String,
        options: Vec<String>,
        duration_secs: u32,
        multiple: bool,
    },
    TogglePoll {
        session_id: String,
    },
    ClearPollDraft {
        session_id: String,
    },

    // Instance
    SetMaxCharacters {
        max_characters: u32,
    },

    // UI
    ClearToast,
}

impl ComposeAction {
    /// Log-safe action tag (never includes draft text).
    pub fn tag(&self) -> &'static str {
        match self {
            // Lifecycle
            ComposeAction::Begin { .. } => "Begin",
            ComposeAction::Submit => "Submit",
            ComposeAction::Discard => "Discard",

            // Thread
            ComposeAction::AddFollowUp => "AddFollowUp",
            ComposeAction::RemoveFollowUp { .. } => "RemoveFollowUp",
            ComposeAction::Focus { .. } => "Focus",

            // Text
            ComposeAction::InsertText { .. } => "InsertText",
            ComposeAction::ReplaceText { .. } => "ReplaceText",
            ComposeAction::RestoreBackupText { .. } => "RestoreBackupText",
            ComposeAction::SetCursor { .. } => "SetCursor",
            ComposeAction::InsertCustomEmoji { .. } => "InsertCustomEmoji",
            ComposeAction::SelectAutocompleteSuggestion { .. } => "SelectAutocompleteSuggestion",
            ComposeAction::ToggleContentWarning { .. } => "ToggleContentWarning",
            ComposeAction::SetContentWarningText { .. } => "SetContentWarningText",

            // Audience
            ComposeAction::SetVisibility { .. } => "SetVisibility",
            ComposeAction::SetLanguage { .. } => "SetLanguage",

            // Media
            ComposeAction::AddAttachment { .. } => "AddAttachment",
            ComposeAction::RemoveAttachment { .. } => "RemoveAttachment",
            ComposeAction::CancelUpload { .. } => "CancelUpload",
            ComposeAction::SetAttachmentDescription { .. } => "SetAttachmentDescription",

            // Poll
            ComposeAction::SetPollDraft { .. } => "SetPollDraft",
            ComposeAction::TogglePoll { .. } => "TogglePoll",
            ComposeAction::ClearPollDraft { .. } => "ClearPollDraft",

            // Instance
            ComposeAction::SetMaxCharacters { .. } => "SetMaxCharacters",

            // UI
            ComposeAction::ClearToast => "ClearToast",
        }
    }
}
