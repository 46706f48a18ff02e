//! Host bridge - wire types and collaborator implementations
//!
//! The host process (the one that actually owns widgets, notification
//! listeners, and the accessibility tree) talks to the daemon over JSON
//! lines: events in on stdin, notices out on stdout. All decision state
//! lives in the daemon; the host side is a dumb view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use floatwatch_core::{
    CommitSink, NotificationPosting, OverlaySurface, PermissionProbe, ScreenNode, TransactionDraft,
};

// ============ Inbound events ============

/// One line on stdin
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// Accessibility callback: the active window's content tree
    #[serde(rename_all = "camelCase")]
    Screen { package: String, root: ScreenNode },
    /// Notification listener callback
    Notification(NotificationPosting),
    /// User edited the overlay fields in place
    #[serde(rename_all = "camelCase")]
    FieldEdit {
        #[serde(default)]
        amount: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    /// User pressed save
    Commit,
    /// User closed the overlay
    Dismiss,
    /// Host reports the current overlay-display grant state
    #[serde(rename_all = "camelCase")]
    Permission { overlay_granted: bool },
}

// ============ Outbound notices ============

/// One line on stdout
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeNotice {
    #[serde(rename_all = "camelCase")]
    OverlayShow {
        id: String,
        amount: String,
        merchant: String,
    },
    #[serde(rename_all = "camelCase")]
    OverlayUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        amount: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        merchant: Option<String>,
    },
    OverlayDismiss,
    /// Open the host settings screen for the overlay grant
    RequestOverlayGrant,
    /// Commit hand-off: the host opens the bookkeeping app deep link
    HandOff(TransactionDraft),
    /// Transient user-visible message
    #[serde(rename_all = "camelCase")]
    Toast { message: String },
}

/// Sender half for notices; safe to use from the dispatcher's sync context.
pub type NoticeSender = mpsc::UnboundedSender<BridgeNotice>;

// ============ Collaborator implementations ============

/// Overlay surface whose real widget lives host-side.
///
/// Keeps a mirror of the field values so `read_fields` works without a
/// round trip; `FieldEdit` events keep the mirror in sync with user input.
pub struct BridgeSurface {
    notices: NoticeSender,
    fields: Arc<Mutex<Option<(String, String)>>>,
}

impl BridgeSurface {
    pub fn new(notices: NoticeSender) -> (Self, Arc<Mutex<Option<(String, String)>>>) {
        let fields = Arc::new(Mutex::new(None));
        (
            Self {
                notices,
                fields: fields.clone(),
            },
            fields,
        )
    }
}

impl OverlaySurface for BridgeSurface {
    fn install(&mut self, amount: &str, merchant: &str) -> Result<()> {
        self.notices
            .send(BridgeNotice::OverlayShow {
                id: Uuid::new_v4().to_string(),
                amount: amount.to_string(),
                merchant: merchant.to_string(),
            })
            .map_err(|_| anyhow!("notice channel closed"))?;
        *self.fields.lock().unwrap() = Some((amount.to_string(), merchant.to_string()));
        Ok(())
    }

    fn apply(&mut self, amount: Option<&str>, merchant: Option<&str>) -> Result<()> {
        {
            let mut guard = self.fields.lock().unwrap();
            let (a, m) = guard
                .as_mut()
                .ok_or_else(|| anyhow!("apply with no installed overlay"))?;
            if let Some(amount) = amount {
                *a = amount.to_string();
            }
            if let Some(merchant) = merchant {
                *m = merchant.to_string();
            }
        }
        self.notices
            .send(BridgeNotice::OverlayUpdate {
                amount: amount.map(str::to_string),
                merchant: merchant.map(str::to_string),
            })
            .map_err(|_| anyhow!("notice channel closed"))
    }

    fn read_fields(&self) -> (String, String) {
        self.fields.lock().unwrap().clone().unwrap_or_default()
    }

    fn remove(&mut self) -> Result<()> {
        *self.fields.lock().unwrap() = None;
        self.notices
            .send(BridgeNotice::OverlayDismiss)
            .map_err(|_| anyhow!("notice channel closed"))
    }
}

/// Record a user field edit into the surface mirror. No-op when no overlay
/// is up (a stale edit from a window the host already closed).
pub fn apply_field_edit(
    fields: &Arc<Mutex<Option<(String, String)>>>,
    amount: Option<&str>,
    description: Option<&str>,
) {
    let mut guard = fields.lock().unwrap();
    let Some((a, m)) = guard.as_mut() else {
        debug!("field edit with no overlay, ignoring");
        return;
    };
    if let Some(amount) = amount {
        *a = amount.to_string();
    }
    if let Some(description) = description {
        *m = description.to_string();
    }
}

/// Grant state mirrored from host `Permission` events.
pub struct BridgeProbe {
    granted: Arc<AtomicBool>,
    notices: NoticeSender,
}

impl BridgeProbe {
    pub fn new(notices: NoticeSender) -> (Self, Arc<AtomicBool>) {
        let granted = Arc::new(AtomicBool::new(false));
        (
            Self {
                granted: granted.clone(),
                notices,
            },
            granted,
        )
    }
}

impl PermissionProbe for BridgeProbe {
    fn can_draw_overlay(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_overlay_grant(&self) {
        let _ = self.notices.send(BridgeNotice::RequestOverlayGrant);
    }
}

/// Commit hand-off: emit the draft for the host to turn into the
/// `float://add?...` deep link. Fire-and-forget.
pub struct BridgeSink {
    notices: NoticeSender,
}

impl BridgeSink {
    pub fn new(notices: NoticeSender) -> Self {
        Self { notices }
    }
}

impl CommitSink for BridgeSink {
    fn submit(&self, draft: TransactionDraft) -> Result<()> {
        self.notices
            .send(BridgeNotice::HandOff(draft))
            .map_err(|_| anyhow!("notice channel closed"))
    }
}
