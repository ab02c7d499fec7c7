//! Text helpers for the composer body.
//!
//! Cursor positions are counted in chars (Unicode scalar values), which is what
//! the native text views hand over after conversion. Lengths shown to the user
//! are counted in extended grapheme clusters, so an emoji with modifiers or a
//! flag counts as one character.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::state::{AccountSuggestion, AutocompleteToken, TokenKind};

pub fn visible_length(text: &str) -> usize {
    text.graphemes(true).count()
}

pub(crate) fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `char_idx`-th char, clamped to the end of `text`.
pub(crate) fn char_to_byte_index(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map_or(text.len(), |(idx, _)| idx)
}

/// Inserts `fragment` at `cursor` and returns the cursor just past it.
pub(crate) fn insert_at(text: &mut String, cursor: usize, fragment: &str) -> usize {
    let byte_idx = char_to_byte_index(text, cursor);
    text.insert_str(byte_idx, fragment);
    char_count(&text[..byte_idx]) + char_count(fragment)
}

/// Replaces chars `start..end` with `replacement` and returns the cursor just past it.
pub(crate) fn replace_chars(text: &mut String, start: usize, end: usize, replacement: &str) -> usize {
    let start_byte = char_to_byte_index(text, start);
    let end_byte = char_to_byte_index(text, end.max(start));
    text.replace_range(start_byte..end_byte, replacement);
    char_count(&text[..start_byte]) + char_count(replacement)
}

fn is_mention_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-' | '@')
}

fn is_hashtag_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Finds the `@mention` or `#hashtag` word the cursor is in.
///
/// The trigger must start the word (so `mail@example.org` is not a mention) and
/// sit before the cursor. Remote handles (`@user@instance.tld`) may contain one
/// inner `@`.
pub fn autocomplete_token(text: &str, cursor: usize) -> Option<AutocompleteToken> {
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());

    let mut start = cursor;
    while start > 0 && !chars[start - 1].is_whitespace() {
        start -= 1;
    }
    if start == cursor {
        return None;
    }
    let mut end = cursor;
    while end < chars.len() && !chars[end].is_whitespace() {
        end += 1;
    }

    let rest = &chars[start + 1..end];
    let kind = match chars[start] {
        '@' => {
            let inner_ats = rest.iter().filter(|c| **c == '@').count();
            if inner_ats > 1 || !rest.iter().all(|c| is_mention_char(*c)) {
                return None;
            }
            TokenKind::Mention
        }
        '#' => {
            if !rest.iter().all(|c| is_hashtag_char(*c)) {
                return None;
            }
            TokenKind::Hashtag
        }
        _ => return None,
    };

    Some(AutocompleteToken {
        kind,
        query: chars[start + 1..cursor].iter().collect(),
        start: start as u32,
        end: end as u32,
    })
}

/// Default ranking for mention candidates. `None` drops the account.
pub fn default_relevance(account: &AccountSuggestion, prefix: &str) -> Option<u32> {
    let needle = prefix.trim_start_matches('@').to_lowercase();
    if needle.is_empty() {
        return Some(1);
    }
    let handle = account.handle.trim_start_matches('@').to_lowercase();
    let name = account.display_name.to_lowercase();
    if handle == needle {
        Some(400)
    } else if handle.starts_with(&needle) {
        Some(300)
    } else if name.starts_with(&needle) {
        Some(200)
    } else if handle.contains(&needle) || name.contains(&needle) {
        Some(100)
    } else {
        None
    }
}

/// Ranked view over a borrowed candidate list.
///
/// Scores are computed once when the view is built; candidates are then yielded
/// one at a time. Cloning or calling [`MentionCandidates::restart`] replays the
/// same ranking without rescoring.
#[derive(Debug, Clone)]
pub struct MentionCandidates<'a> {
    accounts: &'a [AccountSuggestion],
    ranked: Arc<[usize]>,
    pos: usize,
}

impl<'a> MentionCandidates<'a> {
    pub fn empty() -> Self {
        Self {
            accounts: &[],
            ranked: Arc::from(Vec::new()),
            pos: 0,
        }
    }

    pub fn restart(&mut self) {
        self.pos = 0;
    }
}

impl<'a> Iterator for MentionCandidates<'a> {
    type Item = &'a AccountSuggestion;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = *self.ranked.get(self.pos)?;
        self.pos += 1;
        self.accounts.get(idx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ranked.len().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MentionCandidates<'_> {}

/// Ranks `accounts` against `prefix`, highest relevance first. Ties keep the
/// directory's order.
pub fn mention_candidates<'a, F>(
    accounts: &'a [AccountSuggestion],
    prefix: &str,
    relevance: F,
) -> MentionCandidates<'a>
where
    F: Fn(&AccountSuggestion, &str) -> Option<u32>,
{
    let mut scored: Vec<(usize, u32)> = accounts
        .iter()
        .enumerate()
        .filter_map(|(idx, account)| relevance(account, prefix).map(|score| (idx, score)))
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    MentionCandidates {
        accounts,
        ranked: scored.into_iter().map(|(idx, _)| idx).collect(),
        pos: 0,
    }
}
