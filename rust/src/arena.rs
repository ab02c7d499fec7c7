use std::collections::HashMap;

use crate::error::ComposeError;
use crate::session::CompositionSession;
use crate::state::PostDraft;

pub const MAX_FOLLOW_UPS: usize = 5;

/// A root draft plus the follow-ups that continue it as a thread.
///
/// Sessions are stored by id; follow-ups point at the root through their
/// `parent_id` and their thread order lives in `follow_up_ids`. The root is
/// never removed, so lookups of `root_id` always succeed.
#[derive(Debug, Clone)]
pub struct SessionArena {
    sessions: HashMap<String, CompositionSession>,
    root_id: String,
    follow_up_ids: Vec<String>,
    focused_id: String,
}

impl SessionArena {
    pub fn new(root: CompositionSession) -> Self {
        let root_id = root.id().to_string();
        let mut sessions = HashMap::new();
        sessions.insert(root_id.clone(), root);
        Self {
            sessions,
            focused_id: root_id.clone(),
            root_id,
            follow_up_ids: Vec::new(),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root(&self) -> &CompositionSession {
        &self.sessions[&self.root_id]
    }

    pub fn follow_up_ids(&self) -> &[String] {
        &self.follow_up_ids
    }

    pub fn session_count(&self) -> usize {
        1 + self.follow_up_ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CompositionSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CompositionSession> {
        self.sessions.get_mut(id)
    }

    /// Root first, then follow-ups in thread order.
    pub fn chain(&self) -> impl Iterator<Item = &CompositionSession> {
        std::iter::once(&self.root_id)
            .chain(self.follow_up_ids.iter())
            .filter_map(|id| self.sessions.get(id))
    }

    pub fn focused_id(&self) -> &str {
        &self.focused_id
    }

    pub fn focused(&self) -> &CompositionSession {
        self.sessions
            .get(&self.focused_id)
            .unwrap_or_else(|| self.root())
    }

    pub fn focus(&mut self, id: &str) -> bool {
        if !self.sessions.contains_key(id) {
            return false;
        }
        self.focused_id = id.to_string();
        true
    }

    /// Creates a follow-up that inherits the root's visibility as it is right now.
    pub fn add_follow_up(&mut self) -> Result<String, ComposeError> {
        if self.follow_up_ids.len() >= MAX_FOLLOW_UPS {
            return Err(ComposeError::CapacityExceeded {
                limit: MAX_FOLLOW_UPS as u32,
            });
        }
        let root = self.root();
        let follow_up = CompositionSession::follow_up(
            &self.root_id,
            root.visibility(),
            root.language_tag().map(ToString::to_string),
        );
        let id = follow_up.id().to_string();
        self.sessions.insert(id.clone(), follow_up);
        self.follow_up_ids.push(id.clone());
        Ok(id)
    }

    /// Removes a follow-up. Unknown ids and the root id are ignored.
    pub fn remove_follow_up(&mut self, id: &str) -> Option<CompositionSession> {
        let idx = self.follow_up_ids.iter().position(|f| f == id)?;
        self.follow_up_ids.remove(idx);
        if self.focused_id == id {
            self.focused_id = self.root_id.clone();
        }
        self.sessions.remove(id)
    }

    /// Whether the "add follow-up" button should be enabled: there is room and
    /// the last draft of the thread has text.
    pub fn can_add_follow_up(&self) -> bool {
        if self.follow_up_ids.len() >= MAX_FOLLOW_UPS {
            return false;
        }
        let last = self
            .follow_up_ids
            .last()
            .and_then(|id| self.sessions.get(id))
            .unwrap_or_else(|| self.root());
        !last.body_text().is_empty()
    }

    pub fn is_submittable(&self, max_characters: u32) -> bool {
        self.chain().all(|s| s.is_submittable(max_characters))
    }

    /// Media still waiting for its server id anywhere in the thread.
    pub fn has_pending_attachments(&self) -> bool {
        self.chain()
            .flat_map(|s| s.attachments())
            .any(|a| a.status.is_pending())
    }

    pub fn drafts(&self) -> Vec<PostDraft> {
        let mut previous: Option<String> = None;
        self.chain()
            .map(|s| {
                let draft = s.to_draft(previous.take());
                previous = Some(s.id().to_string());
                draft
            })
            .collect()
    }
}
