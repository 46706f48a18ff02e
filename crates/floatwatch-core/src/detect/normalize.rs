//! Event normalizer
//!
//! Adapts the two heterogeneous host channels (screen-content snapshots,
//! notification postings) into the one canonical `RawEvent` shape. Pure
//! construction, no I/O.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classify::has_completion_phrase;
use crate::types::{RawEvent, SourceApp, SourceKind};

// ============ Screen-content channel ============

/// One node of a rendered-screen snapshot, as delivered by the host's
/// accessibility bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScreenNode>,
}

impl ScreenNode {
    pub fn leaf(text: &str) -> Self {
        ScreenNode {
            text: Some(text.to_string()),
            children: Vec::new(),
        }
    }

    pub fn branch(children: Vec<ScreenNode>) -> Self {
        ScreenNode {
            text: None,
            children,
        }
    }

    /// Lazy depth-first traversal of the non-empty text leaves, in document
    /// order. Consumers can short-circuit on first match without walking the
    /// whole tree.
    pub fn text_leaves(&self) -> TextLeaves<'_> {
        TextLeaves { stack: vec![self] }
    }
}

/// Iterator over a snapshot's text leaves (explicit stack, restartable)
pub struct TextLeaves<'a> {
    stack: Vec<&'a ScreenNode>,
}

impl<'a> Iterator for TextLeaves<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while let Some(node) = self.stack.pop() {
            // Children pushed in reverse so the leftmost child pops first.
            for child in node.children.iter().rev() {
                self.stack.push(child);
            }
            if let Some(text) = node.text.as_deref() {
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }
}

/// Normalize a screen-content snapshot into at most one event.
///
/// Non-allow-listed packages produce nothing. For watched apps, the body is
/// the concatenation of the text leaves that carry a completion phrase for
/// that app; when no leaf matches, there is no event to classify.
pub fn normalize_screen(package: &str, root: &ScreenNode, now_ms: i64) -> Option<RawEvent> {
    let app = SourceApp::from_package(package);
    if !app.is_allow_listed() {
        debug!(package = %package, "screen snapshot from unwatched package, skipping");
        return None;
    }

    let phrase_seen = root
        .text_leaves()
        .any(|leaf| has_completion_phrase(app, &leaf.to_lowercase()));
    if !phrase_seen {
        return None;
    }

    // The matched leaves alone rarely carry the amount (it sits in a sibling
    // node), so the body keeps every leaf once a phrase was seen.
    let body = root.text_leaves().collect::<Vec<_>>().join(" ");
    Some(RawEvent {
        source_kind: SourceKind::ScreenContent,
        source_app: app,
        package: package.to_string(),
        title: String::new(),
        body,
        observed_at: now_ms,
    })
}

// ============ Notification channel ============

/// A posted notification as delivered by the host's listener bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPosting {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Normalize a posted notification into at most one event.
///
/// Notifications from this application's own package are dropped so the
/// pipeline never feeds on its own output. Absent fields become empty
/// strings, never null.
pub fn normalize_notification(
    own_package: &str,
    posting: &NotificationPosting,
    now_ms: i64,
) -> Option<RawEvent> {
    if posting.package == own_package {
        debug!("notification from own package, skipping");
        return None;
    }

    Some(RawEvent {
        source_kind: SourceKind::Notification,
        source_app: SourceApp::from_package(&posting.package),
        package: posting.package.clone(),
        title: posting.title.clone().unwrap_or_default(),
        body: posting.text.clone().unwrap_or_default(),
        observed_at: now_ms,
    })
}
