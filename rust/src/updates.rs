use crate::collaborators::UploadOutcome;
use crate::state::{AccountSuggestion, ComposerState, PostDraft};
use crate::ComposeAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum ComposerUpdate {
    FullState(ComposerState),
    /// The thread passed validation; hand these to the posting service in order.
    SubmissionReady {
        rev: u64,
        drafts: Vec<PostDraft>,
    },
}

impl ComposerUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            ComposerUpdate::FullState(s) => s.rev,
            ComposerUpdate::SubmissionReady { rev, .. } => *rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(ComposeAction),
    Internal(Box<InternalEvent>),
}

#[derive(Debug)]
pub enum InternalEvent {
    // Async results
    UploadFinished {
        session_id: String,
        attachment_id: String,
        token: u64,
        outcome: UploadOutcome,
    },
    MentionLookupFinished {
        session_id: String,
        token: u64,
        query: String,
        results: Vec<AccountSuggestion>,
    },

    // Platform swapped its capability provider.
    CapabilitiesChanged,
}
