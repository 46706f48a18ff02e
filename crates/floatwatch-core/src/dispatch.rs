//! Dispatcher - the pipeline's serialized lane
//!
//! Both host channels deliver callbacks on contexts the core does not
//! control, and they may run concurrently. The dispatcher funnels every
//! normalized event through one bounded mpsc queue with a single consumer
//! task, so settings read, classification, debounce mutation, and overlay
//! mutation form one atomic logical step per event. User actions from the
//! host overlay (save/close) travel through the same queue, which keeps the
//! overlay state mutated from exactly one task.

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::debounce::{DebounceGuard, DEFAULT_COOLDOWN_MS};
use crate::detect::{
    classify, normalize_notification, normalize_screen, DetectMode, NotificationPosting,
    ScreenNode, MERCHANT_FALLBACK,
};
use crate::overlay::OverlayController;
use crate::settings::{Settings, SettingsStore};
use crate::types::{display_amount, RawEvent, SourceKind};

/// Commands accepted by the serialized lane
#[derive(Debug)]
pub enum PipelineCommand {
    /// Screen-content snapshot from the accessibility channel
    Screen { package: String, root: ScreenNode },
    /// Posted notification from the listener channel
    Notification(NotificationPosting),
    /// User pressed save on the overlay
    Commit,
    /// User closed the overlay
    Dismiss,
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// This application's own package identifier (self-notifications are
    /// dropped)
    pub own_package: String,
    /// Cooldown between accepted overlay triggers
    pub cooldown_ms: i64,
    /// Bound of the command queue
    pub queue_capacity: usize,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            own_package: "com.floatisland.app".to_string(),
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            queue_capacity: 64,
        }
    }
}

/// Clonable sender half; hand one to each host callback context.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<PipelineCommand>,
}

impl DispatcherHandle {
    pub async fn screen_snapshot(&self, package: String, root: ScreenNode) {
        let _ = self
            .tx
            .send(PipelineCommand::Screen { package, root })
            .await;
    }

    pub async fn notification(&self, posting: NotificationPosting) {
        let _ = self.tx.send(PipelineCommand::Notification(posting)).await;
    }

    pub async fn commit(&self) {
        let _ = self.tx.send(PipelineCommand::Commit).await;
    }

    pub async fn dismiss(&self) {
        let _ = self.tx.send(PipelineCommand::Dismiss).await;
    }
}

/// The consumer loop. Owns the debounce guard and the overlay controller;
/// nothing outside this task ever touches either.
pub struct Dispatcher {
    settings: SettingsStore,
    controller: OverlayController,
    debounce: DebounceGuard,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Spawn the lane. Subscribe to controller events before calling this;
    /// the controller moves into the consumer task.
    pub fn spawn(
        settings: SettingsStore,
        controller: OverlayController,
        options: DispatcherOptions,
    ) -> (DispatcherHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(options.queue_capacity);
        let dispatcher = Dispatcher {
            settings,
            controller,
            debounce: DebounceGuard::new(options.cooldown_ms),
            options,
        };
        let join = tokio::spawn(dispatcher.run(rx));
        (DispatcherHandle { tx }, join)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<PipelineCommand>) {
        info!(cooldown_ms = self.options.cooldown_ms, "dispatcher lane started");
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        // All senders gone: the host bridge went away. Tear the overlay
        // down rather than leaving an orphan window.
        self.controller.dismiss();
        info!("dispatcher lane stopped");
    }

    fn handle(&mut self, cmd: PipelineCommand) {
        match cmd {
            PipelineCommand::Screen { package, root } => {
                // Settings are read once per event, never cached.
                let settings = self.settings.load();
                if !settings.source_enabled(SourceKind::ScreenContent) {
                    debug!("screen source disabled, dropping");
                    return;
                }
                let now = Utc::now().timestamp_millis();
                if let Some(event) = normalize_screen(&package, &root, now) {
                    self.process(event, &settings);
                }
            }
            PipelineCommand::Notification(posting) => {
                let settings = self.settings.load();
                if !settings.source_enabled(SourceKind::Notification) {
                    debug!("notification source disabled, dropping");
                    return;
                }
                let now = Utc::now().timestamp_millis();
                if let Some(event) =
                    normalize_notification(&self.options.own_package, &posting, now)
                {
                    self.process(event, &settings);
                }
            }
            PipelineCommand::Commit => self.controller.commit(),
            PipelineCommand::Dismiss => self.controller.dismiss(),
        }
    }

    /// Classification, debounce, and overlay mutation for one event.
    fn process(&mut self, event: RawEvent, settings: &Settings) {
        let mode = settings.detect_mode();
        let classification = classify(&event, mode);
        if !classification.is_transaction {
            return;
        }
        if !self.debounce.try_accept(event.observed_at) {
            return;
        }

        let amount_text = display_amount(classification.amount.as_ref());
        info!(
            package = %event.package,
            source = event.source_kind.as_str(),
            mode = mode.as_str(),
            amount = %amount_text,
            "transaction detected"
        );

        let merchant = self.merchant_label(
            &event,
            &classification.merchant,
            mode,
            classification.amount.is_some(),
        );
        self.controller.show(&amount_text, &merchant);
    }

    /// Display label for the description field.
    ///
    /// Notifications label with their title when one exists; when no amount
    /// was extracted, the raw body goes under the label so the user can
    /// still see what triggered the popup. Diagnostic mode appends the
    /// source package.
    fn merchant_label(
        &self,
        event: &RawEvent,
        fallback: &str,
        mode: DetectMode,
        has_amount: bool,
    ) -> String {
        match event.source_kind {
            SourceKind::ScreenContent => fallback.to_string(),
            SourceKind::Notification => {
                let mut label = if event.title.is_empty() {
                    MERCHANT_FALLBACK.to_string()
                } else {
                    event.title.clone()
                };
                if mode == DetectMode::Permissive {
                    label = format!("{}\n({})", label, event.package);
                }
                if !has_amount && !event.body.is_empty() {
                    label = format!("{}\n{}", label, event.body);
                }
                label
            }
        }
    }
}
