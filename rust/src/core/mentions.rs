use tokio::task::AbortHandle;

use super::ComposerCore;
use crate::collaborators::read_slot;
use crate::state::{AccountSuggestion, TokenKind};
use crate::text::{default_relevance, mention_candidates};
use crate::updates::{CoreMsg, InternalEvent};

/// The account search currently feeding `mention_suggestions`.
pub(super) struct MentionLookup {
    session_id: String,
    query: String,
    token: u64,
    abort: AbortHandle,
}

impl ComposerCore {
    /// `(session_id, query)` of the non-empty `@` token under the focused cursor.
    fn typed_mention(&self) -> Option<(String, String)> {
        let session = self.arena.focused();
        let token = session.autocomplete_token()?;
        if token.kind != TokenKind::Mention || token.query.is_empty() {
            return None;
        }
        Some((session.id().to_string(), token.query))
    }

    /// Starts, keeps or drops the account search so it matches what is typed.
    pub(super) fn sync_mention_lookup(&mut self) {
        let Some((session_id, query)) = self.typed_mention() else {
            self.cancel_mention_lookup();
            self.state.mention_suggestions.clear();
            return;
        };
        if self
            .mention_lookup
            .as_ref()
            .is_some_and(|l| l.session_id == session_id && l.query == query)
        {
            return;
        }
        self.cancel_mention_lookup();

        let Some(directory) = read_slot(&self.slots.account_directory) else {
            self.state.mention_suggestions.clear();
            return;
        };

        self.mention_lookup_token = self.mention_lookup_token.wrapping_add(1);
        let token = self.mention_lookup_token;
        let limit = self.config.mention_suggestion_limit();
        let tx = self.core_sender.clone();
        let event_session_id = session_id.clone();
        let event_query = query.clone();
        tracing::debug!(token, "mention lookup: starting");

        let handle = self.runtime.spawn(async move {
            let prefix = event_query.clone();
            match tokio::task::spawn_blocking(move || directory.search(prefix, limit)).await {
                Ok(results) => {
                    let _ = tx.send(CoreMsg::Internal(Box::new(
                        InternalEvent::MentionLookupFinished {
                            session_id: event_session_id,
                            token,
                            query: event_query,
                            results,
                        },
                    )));
                }
                Err(e) => tracing::warn!(err = %e, "mention lookup: task failed"),
            }
        });

        self.mention_lookup = Some(MentionLookup {
            session_id,
            query,
            token,
            abort: handle.abort_handle(),
        });
    }

    pub(super) fn cancel_mention_lookup(&mut self) {
        if let Some(lookup) = self.mention_lookup.take() {
            lookup.abort.abort();
        }
    }

    pub(super) fn handle_mention_lookup_finished(
        &mut self,
        session_id: &str,
        token: u64,
        query: &str,
        results: Vec<AccountSuggestion>,
    ) -> bool {
        let current = self.mention_lookup.as_ref().is_some_and(|l| l.token == token);
        let still_typed = self
            .typed_mention()
            .is_some_and(|(sid, q)| sid == session_id && q == query);
        if !current || !still_typed {
            tracing::debug!(token, "mention lookup: stale result dropped");
            return false;
        }

        // The directory may match on more than the handle; keep those results,
        // just behind the prefix matches.
        let limit = self.config.mention_suggestion_limit() as usize;
        self.state.mention_suggestions =
            mention_candidates(&results, query, |a, q| Some(default_relevance(a, q).unwrap_or(0)))
                .take(limit)
                .cloned()
                .collect();
        tracing::debug!(
            token,
            count = self.state.mention_suggestions.len(),
            "mention lookup: done"
        );
        true
    }
}
