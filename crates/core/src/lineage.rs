//! Reply / forward lineage between history entries.
//!
//! Structured fields (`parent_id`, `is_reply`, `is_forward`) are the source
//! of truth for new rows. Older rows may only carry text markers in the
//! description or the author-chain label, so classification walks an ordered
//! rule table and the first rule that decides wins. The order matters: the
//! signals can disagree on migrated data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;
use crate::viewer::Viewer;

/// Legacy description marker for forwarded entries (matched case-insensitively).
pub const FORWARD_MARKER: &str = "forward-";
/// Legacy description marker for replies (matched case-insensitively).
pub const REPLY_MARKER: &str = "reply-";

const CHAIN_REPLY_PREFIX: &str = "REPLY:";
const CHAIN_FORWARD_PREFIX: &str = "FORWARD:";
const CHAIN_ARROWS: [&str; 2] = ["→", "->"];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Standalone,
    Reply,
    Forward,
}

/// Everything classification looks at, borrowed from a row.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineageSignals<'a> {
    pub is_reply: bool,
    pub is_forward: bool,
    pub parent_id: Option<DbId>,
    pub description: &'a str,
    pub author_chain: Option<&'a str>,
}

/// One step of the classification cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationRule {
    /// `is_forward` beats `is_reply`.
    ExplicitFlags,
    /// A parent with no flags is a reply unless the description says forward.
    ParentReference,
    /// Author chain starts with `REPLY:` / `FORWARD:`.
    ChainPrefix,
    /// Description carries the forward marker.
    DescriptionMarker,
    /// Author chain contains an arrow; `FORWARD:` anywhere means forward.
    ChainArrow,
}

/// Rules in priority order.
pub const CLASSIFICATION_RULES: [ClassificationRule; 5] = [
    ClassificationRule::ExplicitFlags,
    ClassificationRule::ParentReference,
    ClassificationRule::ChainPrefix,
    ClassificationRule::DescriptionMarker,
    ClassificationRule::ChainArrow,
];

fn has_forward_marker(description: &str) -> bool {
    description.to_lowercase().contains(FORWARD_MARKER)
}

impl ClassificationRule {
    pub fn apply(self, s: &LineageSignals<'_>) -> Option<EntryKind> {
        match self {
            ClassificationRule::ExplicitFlags => {
                if s.is_forward {
                    Some(EntryKind::Forward)
                } else if s.is_reply {
                    Some(EntryKind::Reply)
                } else {
                    None
                }
            }
            ClassificationRule::ParentReference => s.parent_id.map(|_| {
                if has_forward_marker(s.description) {
                    EntryKind::Forward
                } else {
                    EntryKind::Reply
                }
            }),
            ClassificationRule::ChainPrefix => {
                let chain = s.author_chain?;
                if chain.starts_with(CHAIN_REPLY_PREFIX) {
                    Some(EntryKind::Reply)
                } else if chain.starts_with(CHAIN_FORWARD_PREFIX) {
                    Some(EntryKind::Forward)
                } else {
                    None
                }
            }
            ClassificationRule::DescriptionMarker => {
                has_forward_marker(s.description).then_some(EntryKind::Forward)
            }
            ClassificationRule::ChainArrow => {
                let chain = s.author_chain?;
                if !CHAIN_ARROWS.iter().any(|arrow| chain.contains(arrow)) {
                    return None;
                }
                if chain.contains(CHAIN_FORWARD_PREFIX) {
                    Some(EntryKind::Forward)
                } else {
                    Some(EntryKind::Reply)
                }
            }
        }
    }
}

/// Classify an entry; the first rule that decides wins.
pub fn classify(signals: &LineageSignals<'_>) -> EntryKind {
    CLASSIFICATION_RULES
        .iter()
        .find_map(|rule| rule.apply(signals))
        .unwrap_or(EntryKind::Standalone)
}

// ---------------------------------------------------------------------------
// Creating replies and forwards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Reply,
    Forward,
}

impl LinkKind {
    fn chain_prefix(self) -> &'static str {
        match self {
            LinkKind::Reply => CHAIN_REPLY_PREFIX,
            LinkKind::Forward => CHAIN_FORWARD_PREFIX,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Reply => f.write_str("reply"),
            LinkKind::Forward => f.write_str("forward"),
        }
    }
}

/// Display-only authorship label, e.g. `REPLY:Alice->Bob`.
pub fn chain_label(kind: LinkKind, parent_owner: &str, acting: &str) -> String {
    format!("{}{parent_owner}->{acting}", kind.chain_prefix())
}

/// The parent fields needed to derive a link.
#[derive(Debug, Clone, Copy)]
pub struct ParentRef {
    pub id: DbId,
    pub project_id: DbId,
    pub created_by: Option<DbId>,
}

/// Lineage columns for a new reply / forward row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedLink {
    pub parent_id: DbId,
    /// Inherited from the parent so the original owner keeps edit and
    /// delete rights over the whole chain.
    pub created_by: Option<DbId>,
    /// Who actually clicked reply / forward.
    pub acting_user_id: DbId,
    pub is_reply: bool,
    pub is_forward: bool,
    pub author_chain: String,
}

/// Derive the lineage columns of a reply or forward to `parent`.
///
/// `parent_owner_name` is the display name of the parent's `created_by`
/// user (or the acting user's own name when the parent has no owner).
pub fn derive_link(
    parent: &ParentRef,
    kind: LinkKind,
    parent_owner_name: &str,
    acting: &Viewer,
) -> DerivedLink {
    DerivedLink {
        parent_id: parent.id,
        created_by: parent.created_by,
        acting_user_id: acting.id,
        is_reply: kind == LinkKind::Reply,
        is_forward: kind == LinkKind::Forward,
        author_chain: chain_label(kind, parent_owner_name, &acting.name),
    }
}

/// Lineage hints as they arrive on a create request, from either the JSON
/// body or the `X-Is-Reply` / `X-Is-Forward` / `X-Parent-Id` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LinkHints {
    pub is_reply: Option<bool>,
    pub is_forward: Option<bool>,
    pub parent_id: Option<DbId>,
}

/// Merge body and header hints and decide what kind of entry is being
/// created. `None` means a plain entry.
///
/// The link kind comes from one source only: the body when it sets either
/// flag, the headers otherwise. The parent id is taken from the body when
/// present.
pub fn reconcile_link(
    body: LinkHints,
    headers: LinkHints,
) -> Result<Option<(LinkKind, DbId)>, CoreError> {
    let flags = if body.is_reply.is_some() || body.is_forward.is_some() {
        body
    } else {
        headers
    };
    let is_reply = flags.is_reply.unwrap_or(false);
    let is_forward = flags.is_forward.unwrap_or(false);
    let parent_id = body.parent_id.or(headers.parent_id);

    if is_reply && is_forward {
        return Err(CoreError::Validation(
            "An entry cannot be both a reply and a forward".to_string(),
        ));
    }

    match (parent_id, is_reply, is_forward) {
        (None, false, false) => Ok(None),
        (None, _, _) => Err(CoreError::Validation(
            "Replies and forwards require a parent_id".to_string(),
        )),
        (Some(id), _, true) => Ok(Some((LinkKind::Forward, id))),
        (Some(id), _, false) => Ok(Some((LinkKind::Reply, id))),
    }
}

/// Strip legacy `forward-` / `reply-` prefixes and `[Parent: n]` tags from a
/// description for display. Never used when writing.
pub fn strip_legacy_markers(description: &str) -> String {
    let marker_len = |text: &str, marker: &str| -> Option<usize> {
        text.get(..marker.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(marker))
            .then_some(marker.len())
    };

    let mut text = description.trim_start();
    while let Some(len) =
        marker_len(text, FORWARD_MARKER).or_else(|| marker_len(text, REPLY_MARKER))
    {
        text = text[len..].trim_start();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[Parent:") {
        out.push_str(&rest[..start]);
        match rest[start..].find(']') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
