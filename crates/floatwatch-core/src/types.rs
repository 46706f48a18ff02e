//! Core types for floatwatch
//!
//! Shared shapes for the detection pipeline: raw events, classification
//! results, monetary amounts, and the commit hand-off payload.

use serde::{Deserialize, Serialize};

// ============ Sources ============

/// Which input channel produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Rendered-screen content snapshot from the accessibility channel
    ScreenContent,
    /// Posted-notification payload from the notification channel
    Notification,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ScreenContent => "screen_content",
            SourceKind::Notification => "notification",
        }
    }
}

/// Source application, resolved from the host package identifier.
///
/// The allow-listed payment apps get their own variants because each has its
/// own completion-phrase set; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceApp {
    Alipay,
    WeChat,
    Other,
}

/// Host package identifier for Alipay
pub const ALIPAY_PACKAGE: &str = "com.eg.android.AlipayGphone";
/// Host package identifier for WeChat
pub const WECHAT_PACKAGE: &str = "com.tencent.mm";

impl SourceApp {
    pub fn from_package(package: &str) -> Self {
        match package {
            ALIPAY_PACKAGE => SourceApp::Alipay,
            WECHAT_PACKAGE => SourceApp::WeChat,
            _ => SourceApp::Other,
        }
    }

    /// Is this one of the allow-listed payment apps watched on the
    /// screen-content channel?
    pub fn is_allow_listed(&self) -> bool {
        !matches!(self, SourceApp::Other)
    }
}

// ============ Events ============

/// One normalized event, regardless of which channel produced it.
///
/// Created at the moment a host callback fires, consumed synchronously by
/// the pipeline, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub source_kind: SourceKind,
    pub source_app: SourceApp,
    /// Original host package identifier (kept for logging)
    pub package: String,
    pub title: String,
    pub body: String,
    /// Epoch milliseconds at callback time
    pub observed_at: i64,
}

// ============ Money ============

/// Text displayed when no amount could be extracted.
///
/// The host UI historically used "0.00" both for "nothing found" and a true
/// zero amount; internally an absent amount is `Option::None`, and this
/// sentinel only reappears at display time.
pub const NO_AMOUNT_SENTINEL: &str = "0.00";

/// A detected monetary amount, stored as the matched substring.
///
/// Invariant: `display()` always carries two fraction digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money(String);

impl Money {
    /// Wrap a matched amount substring. Returns `None` for the "0.00"
    /// sentinel so an extraction miss never masquerades as a real amount.
    pub fn from_match(matched: &str) -> Option<Self> {
        if matched == NO_AMOUNT_SENTINEL {
            return None;
        }
        Some(Money(matched.to_string()))
    }

    /// The matched substring, verbatim.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render with two fraction digits, appending ".00" to bare integers.
    pub fn display(&self) -> String {
        if self.0.contains('.') {
            self.0.clone()
        } else {
            format!("{}.00", self.0)
        }
    }
}

/// Display text for an optional amount: the sentinel when absent.
pub fn display_amount(amount: Option<&Money>) -> String {
    match amount {
        Some(m) => m.display(),
        None => NO_AMOUNT_SENTINEL.to_string(),
    }
}

// ============ Classification ============

/// How confident the classifier is in a positive decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// A strict money pattern matched in the text
    PatternMatch,
    /// Only a transaction keyword (or loose currency hint) matched
    KeywordOnly,
}

/// Result of classifying one event. Derived value, not stored beyond the
/// current event's processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_transaction: bool,
    pub amount: Option<Money>,
    /// Best-effort merchant label; falls back to a fixed placeholder
    pub merchant: String,
    pub confidence: Confidence,
}

impl Classification {
    pub fn rejected() -> Self {
        Classification {
            is_transaction: false,
            amount: None,
            merchant: String::new(),
            confidence: Confidence::KeywordOnly,
        }
    }
}

// ============ Commit hand-off ============

/// Payload for the outbound commit hand-off (deep link into the host app).
///
/// Fire-and-forget: no response is awaited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub amount: String,
    pub description: String,
    pub auto: bool,
}
