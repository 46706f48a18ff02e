//! floatwatch-core - transaction detection pipeline and overlay lifecycle
//!
//! Watches two host channels (rendered-screen snapshots and posted
//! notifications) for completed payments, extracts an amount and merchant
//! label, and drives a single confirm/edit overlay. Structure:
//!
//! - [`detect`] - normalization, classification, extraction
//! - [`debounce`] - duplicate-trigger suppression
//! - [`overlay`] - singleton overlay state machine behind host-side seams
//! - [`dispatch`] - the serialized lane tying it all together
//! - [`settings`] - persisted detection toggles, read per event

pub mod debounce;
pub mod detect;
pub mod dispatch;
pub mod overlay;
pub mod settings;
pub mod types;

pub use debounce::{DebounceGuard, DEFAULT_COOLDOWN_MS};
pub use detect::{
    classify, extract_amount, extract_merchant, normalize_notification, normalize_screen,
    DetectMode, NotificationPosting, ScreenNode,
};
pub use dispatch::{Dispatcher, DispatcherHandle, DispatcherOptions, PipelineCommand};
pub use overlay::{
    CommitSink, ControllerEvent, OverlayController, OverlayState, OverlaySurface, PermissionProbe,
};
pub use settings::{Settings, SettingsStore};
pub use types::{
    display_amount, Classification, Confidence, Money, RawEvent, SourceApp, SourceKind,
    TransactionDraft, ALIPAY_PACKAGE, NO_AMOUNT_SENTINEL, WECHAT_PACKAGE,
};
