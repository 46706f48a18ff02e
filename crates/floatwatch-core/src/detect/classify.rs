//! Transaction classifier
//!
//! Decides whether a normalized event denotes a completed transaction.
//! Two gates: a per-app completion-phrase gate (screen-content channel) and
//! a bilingual keyword / currency-hint gate. Both are best-effort heuristics,
//! tunable, not a grammar.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::extract::{extract_amount, extract_merchant};
use crate::types::{Classification, Confidence, RawEvent, SourceApp, SourceKind};

/// Classifier operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectMode {
    /// Production: every gate is mandatory
    Strict,
    /// Diagnostic: accept every event regardless of gate outcome
    Permissive,
}

impl DetectMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectMode::Strict => "strict",
            DetectMode::Permissive => "permissive",
        }
    }
}

/// Completion phrases per allow-listed app. Overlapping but not identical:
/// WeChat ends payment flows on a bare "完成" screen.
static COMPLETION_PHRASES: Lazy<HashMap<SourceApp, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<SourceApp, &'static [&'static str]> = HashMap::new();
    m.insert(SourceApp::Alipay, &["支付成功", "交易成功", "付款成功"]);
    m.insert(SourceApp::WeChat, &["支付成功", "完成", "付款成功"]);
    m
});

/// Bilingual transaction keywords checked against lowercased title+body
const TRANSACTION_KEYWORDS: &[&str] = &[
    "支付",
    "收款",
    "到账",
    "消费",
    "交易",
    "余额",
    "转账",
    "付款",
    "payment",
    "transaction",
    "received",
    "spent",
    "支出",
];

/// Loose currency hint: a currency symbol/word followed eventually by digits
static CURRENCY_HINT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(¥|\$|€|元).*\d").unwrap());

/// Completion phrases for one app, empty for non-allow-listed apps.
pub fn completion_phrases(app: SourceApp) -> &'static [&'static str] {
    COMPLETION_PHRASES.get(&app).copied().unwrap_or(&[])
}

/// Does the text contain any completion phrase for the given app?
pub fn has_completion_phrase(app: SourceApp, text: &str) -> bool {
    completion_phrases(app).iter().any(|p| text.contains(p))
}

fn has_transaction_keyword(text: &str) -> bool {
    TRANSACTION_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Classify one event.
///
/// `Permissive` short-circuits every gate; it exists for diagnostics only
/// and is never used in normal operation.
pub fn classify(event: &RawEvent, mode: DetectMode) -> Classification {
    let combined = format!("{} {}", event.title, event.body).to_lowercase();

    if mode == DetectMode::Permissive {
        debug!(package = %event.package, source = event.source_kind.as_str(), "permissive mode, accepting");
        return accepted(&combined);
    }

    match event.source_kind {
        // Screen-content events come only from allow-listed apps; the
        // completion-phrase gate is the whole decision there. WeChat ends
        // payment flows on a bare "完成" screen, so no keyword gate after.
        SourceKind::ScreenContent => {
            if !has_completion_phrase(event.source_app, &combined) {
                debug!(package = %event.package, "no completion phrase, rejecting");
                return Classification::rejected();
            }
        }
        // Notifications can come from anywhere; a transaction keyword or a
        // currency hint is mandatory.
        SourceKind::Notification => {
            if !has_transaction_keyword(&combined) && !CURRENCY_HINT_PATTERN.is_match(&combined) {
                debug!(package = %event.package, "no keyword or currency hint, rejecting");
                return Classification::rejected();
            }
        }
    }

    accepted(&combined)
}

fn accepted(combined: &str) -> Classification {
    let amount = extract_amount(combined);
    let confidence = if amount.is_some() {
        Confidence::PatternMatch
    } else {
        Confidence::KeywordOnly
    };
    Classification {
        is_transaction: true,
        amount,
        merchant: extract_merchant(combined),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Money, SourceApp, SourceKind};

    fn screen_event(app: SourceApp, package: &str, body: &str) -> RawEvent {
        RawEvent {
            source_kind: SourceKind::ScreenContent,
            source_app: app,
            package: package.to_string(),
            title: String::new(),
            body: body.to_string(),
            observed_at: 0,
        }
    }

    fn notification_event(title: &str, body: &str) -> RawEvent {
        RawEvent {
            source_kind: SourceKind::Notification,
            source_app: SourceApp::Other,
            package: "com.example.bank".to_string(),
            title: title.to_string(),
            body: body.to_string(),
            observed_at: 0,
        }
    }

    #[test]
    fn test_alipay_payment_success_with_amount() {
        let ev = screen_event(
            SourceApp::Alipay,
            "com.eg.android.AlipayGphone",
            "支付成功 ¥-12.50",
        );
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
        assert_eq!(c.amount, Money::from_match("-12.50"));
        assert_eq!(c.confidence, Confidence::PatternMatch);
    }

    #[test]
    fn test_wechat_done_phrase() {
        let ev = screen_event(SourceApp::WeChat, "com.tencent.mm", "完成 ¥20.00");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
        assert_eq!(c.amount, Money::from_match("20.00"));
    }

    #[test]
    fn test_wechat_done_without_currency_symbol() {
        // The phrase gate alone decides screen-content events; a completion
        // screen with no keyword and no currency symbol still qualifies.
        let ev = screen_event(SourceApp::WeChat, "com.tencent.mm", "完成 20.00");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
        assert_eq!(c.amount, Money::from_match("20.00"));
    }

    #[test]
    fn test_done_phrase_is_wechat_only() {
        // "完成" alone completes a WeChat flow but not an Alipay one.
        assert!(has_completion_phrase(SourceApp::WeChat, "完成"));
        assert!(!has_completion_phrase(SourceApp::Alipay, "完成"));
        assert!(completion_phrases(SourceApp::Other).is_empty());
    }

    #[test]
    fn test_screen_without_phrase_rejected() {
        let ev = screen_event(
            SourceApp::Alipay,
            "com.eg.android.AlipayGphone",
            "正在支付 ¥12.50",
        );
        let c = classify(&ev, DetectMode::Strict);
        assert!(!c.is_transaction);
    }

    #[test]
    fn test_notification_keyword_balance() {
        let ev = notification_event("Bank", "Your balance is now 100.00");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction, "余额/balance keyword should match");
        assert_eq!(c.amount, Money::from_match("100.00"));
    }

    #[test]
    fn test_notification_keyword_chinese() {
        let ev = notification_event("银行", "您尾号1234的账户到账 50.00 元");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
        assert_eq!(c.amount, Money::from_match("50.00"));
    }

    #[test]
    fn test_notification_currency_hint_without_keyword() {
        let ev = notification_event("Shop", "Order total ¥ 45");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
        assert_eq!(c.amount, Money::from_match("45"));
        assert_eq!(c.confidence, Confidence::PatternMatch);
    }

    #[test]
    fn test_notification_unrelated_rejected() {
        let ev = notification_event("News", "Sunny with a chance of rain");
        let c = classify(&ev, DetectMode::Strict);
        assert!(!c.is_transaction);
    }

    #[test]
    fn test_keyword_only_confidence_without_amount() {
        let ev = notification_event("Bank", "A payment was made");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
        assert!(c.amount.is_none());
        assert_eq!(c.confidence, Confidence::KeywordOnly);
        assert_eq!(c.merchant, "自动识别交易");
    }

    #[test]
    fn test_permissive_accepts_everything() {
        let ev = notification_event("News", "Sunny with a chance of rain");
        let c = classify(&ev, DetectMode::Permissive);
        assert!(c.is_transaction);
        assert!(c.amount.is_none());
    }

    #[test]
    fn test_title_participates_in_combined_text() {
        let ev = notification_event("Payment received", "from a friend");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let ev = notification_event("BANK", "PAYMENT of 9.99 COMPLETED");
        let c = classify(&ev, DetectMode::Strict);
        assert!(c.is_transaction);
        assert_eq!(c.amount, Money::from_match("9.99"));
    }
}
