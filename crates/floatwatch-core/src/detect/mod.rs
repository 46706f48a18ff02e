//! Transaction detection pipeline
//!
//! Normalization of the two host channels into one event shape, heuristic
//! transaction classification, and amount/merchant extraction.

mod classify;
mod extract;
mod normalize;

pub use classify::{classify, completion_phrases, has_completion_phrase, DetectMode};
pub use extract::{extract_amount, extract_merchant, MERCHANT_FALLBACK};
pub use normalize::{
    normalize_notification, normalize_screen, NotificationPosting, ScreenNode, TextLeaves,
};
