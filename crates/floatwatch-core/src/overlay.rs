//! Overlay controller
//!
//! Owns the singleton overlay resource and its `Absent`/`Visible` lifecycle.
//! The real widget lives on the host side behind the [`OverlaySurface`]
//! trait; this controller holds the only handle to it. Every failure path
//! recovers locally: the state machine is forced back to `Absent` rather
//! than left with a dangling half-attached resource, and the failure is
//! surfaced as a user-visible notice, never escalated.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::types::TransactionDraft;

// ============ Collaborator seams ============

/// The host-owned overlay widget. Install/apply/remove are fallible because
/// the host window manager can reject them at any time.
pub trait OverlaySurface: Send {
    fn install(&mut self, amount: &str, merchant: &str) -> Result<()>;
    /// Apply field updates; `None` leaves the field (and any user edit to
    /// it) untouched.
    fn apply(&mut self, amount: Option<&str>, merchant: Option<&str>) -> Result<()>;
    /// Current field values, including user edits.
    fn read_fields(&self) -> (String, String);
    fn remove(&mut self) -> Result<()>;
}

/// Host permission queries. Precondition checks only; the controller never
/// retries a denied grant on its own.
pub trait PermissionProbe: Send + Sync {
    fn can_draw_overlay(&self) -> bool;
    /// One-shot request-to-grant side effect (opens the host settings UI).
    fn request_overlay_grant(&self);
}

/// Outbound commit hand-off (deep link into the host application).
/// Fire-and-forget; delivery failure never rolls back a dismiss.
pub trait CommitSink: Send + Sync {
    fn submit(&self, draft: TransactionDraft) -> Result<()>;
}

// ============ State machine ============

/// Singleton overlay lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Absent,
    Visible { amount: String, merchant: String },
}

impl OverlayState {
    pub fn is_visible(&self) -> bool {
        matches!(self, OverlayState::Visible { .. })
    }
}

/// Transitions and notices published for the host to surface as toasts
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    Shown { amount: String, merchant: String },
    Updated { amount: String, merchant: String },
    /// Update requested with content the overlay already shows
    AlreadyCurrent,
    Dismissed,
    /// Show aborted: overlay permission missing, grant request raised
    PermissionRequested,
    Committed(TransactionDraft),
    /// Hand-off delivery failed; the dismiss that follows still happens
    HandOffFailed(String),
    /// Surface create/mutate/remove failed; state forced to Absent
    SurfaceError(String),
}

/// Owns the overlay resource. Reachable only from the dispatcher's
/// serialized lane, so no two transitions ever race.
pub struct OverlayController {
    surface: Box<dyn OverlaySurface>,
    probe: Arc<dyn PermissionProbe>,
    sink: Arc<dyn CommitSink>,
    state: OverlayState,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl OverlayController {
    pub fn new(
        surface: Box<dyn OverlaySurface>,
        probe: Arc<dyn PermissionProbe>,
        sink: Arc<dyn CommitSink>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            surface,
            probe,
            sink,
            state: OverlayState::Absent,
            event_tx,
        }
    }

    /// Subscribe to transition notices
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Show the overlay pre-populated with the given fields.
    ///
    /// Precondition: the overlay-display grant. When it is missing, the
    /// transition fails, a single grant request fires, and nothing else
    /// changes. When the overlay is already visible, `show` is redirected
    /// to [`update`](Self::update) so a second concurrent overlay can never
    /// exist.
    pub fn show(&mut self, amount: &str, merchant: &str) {
        if !self.probe.can_draw_overlay() {
            warn!("overlay permission missing, requesting grant");
            self.probe.request_overlay_grant();
            self.emit(ControllerEvent::PermissionRequested);
            return;
        }

        if self.state.is_visible() {
            info!("overlay already visible, redirecting show to update");
            self.update(amount, merchant);
            return;
        }

        match self.surface.install(amount, merchant) {
            Ok(()) => {
                info!(amount = %amount, "overlay shown");
                self.state = OverlayState::Visible {
                    amount: amount.to_string(),
                    merchant: merchant.to_string(),
                };
                self.emit(ControllerEvent::Shown {
                    amount: amount.to_string(),
                    merchant: merchant.to_string(),
                });
            }
            Err(e) => self.recover_surface_failure("install", e),
        }
    }

    /// Replace only the fields for which a non-empty value was supplied.
    /// Valid only while visible; ignored otherwise.
    pub fn update(&mut self, amount: &str, merchant: &str) {
        if !self.state.is_visible() {
            warn!("update with no visible overlay, ignoring");
            return;
        }

        let (current_amount, current_merchant) = self.surface.read_fields();
        let new_amount = (!amount.is_empty()).then_some(amount);
        let new_merchant = (!merchant.is_empty()).then_some(merchant);

        let effective_amount = new_amount.unwrap_or(&current_amount);
        let effective_merchant = new_merchant.unwrap_or(&current_merchant);
        if effective_amount == current_amount && effective_merchant == current_merchant {
            info!("overlay already shows this content");
            self.emit(ControllerEvent::AlreadyCurrent);
            return;
        }

        match self.surface.apply(new_amount, new_merchant) {
            Ok(()) => {
                let (amount, merchant) = self.surface.read_fields();
                info!(amount = %amount, "overlay updated");
                self.state = OverlayState::Visible {
                    amount: amount.clone(),
                    merchant: merchant.clone(),
                };
                self.emit(ControllerEvent::Updated { amount, merchant });
            }
            Err(e) => self.recover_surface_failure("apply", e),
        }
    }

    /// Tear the overlay down. Valid from any state, idempotent.
    pub fn dismiss(&mut self) {
        if !self.state.is_visible() {
            return;
        }
        if let Err(e) = self.surface.remove() {
            // State is forced to Absent regardless; a failed removal must
            // not leave the controller thinking a window is up.
            self.recover_surface_failure("remove", e);
            return;
        }
        info!("overlay dismissed");
        self.state = OverlayState::Absent;
        self.emit(ControllerEvent::Dismissed);
    }

    /// User pressed save: read the (possibly edited) fields, hand the draft
    /// off, then dismiss. Delivery failure is reported but never blocks the
    /// dismiss.
    pub fn commit(&mut self) {
        if !self.state.is_visible() {
            warn!("commit with no visible overlay, ignoring");
            return;
        }

        let (amount, description) = self.surface.read_fields();
        let draft = TransactionDraft {
            amount,
            description,
            auto: true,
        };
        match self.sink.submit(draft.clone()) {
            Ok(()) => {
                info!(amount = %draft.amount, "transaction handed off");
                self.emit(ControllerEvent::Committed(draft));
            }
            Err(e) => {
                warn!(error = %e, "commit hand-off failed");
                self.emit(ControllerEvent::HandOffFailed(e.to_string()));
            }
        }
        self.dismiss();
    }

    fn recover_surface_failure(&mut self, op: &str, e: anyhow::Error) {
        warn!(op = %op, error = %e, "overlay surface failure, resetting to absent");
        let _ = self.surface.remove();
        self.state = OverlayState::Absent;
        self.emit(ControllerEvent::SurfaceError(format!("{}: {}", op, e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSurface {
        fields: Mutex<Option<(String, String)>>,
        fail_install: bool,
        fail_remove: bool,
    }

    // Shared handle so tests can poke at fields after handing the box over.
    struct SharedSurface(Arc<FakeSurface>);

    impl OverlaySurface for SharedSurface {
        fn install(&mut self, amount: &str, merchant: &str) -> Result<()> {
            if self.0.fail_install {
                return Err(anyhow!("window manager rejected view"));
            }
            *self.0.fields.lock().unwrap() = Some((amount.to_string(), merchant.to_string()));
            Ok(())
        }

        fn apply(&mut self, amount: Option<&str>, merchant: Option<&str>) -> Result<()> {
            let mut guard = self.0.fields.lock().unwrap();
            let (a, m) = guard.as_mut().expect("apply before install");
            if let Some(amount) = amount {
                *a = amount.to_string();
            }
            if let Some(merchant) = merchant {
                *m = merchant.to_string();
            }
            Ok(())
        }

        fn read_fields(&self) -> (String, String) {
            self.0
                .fields
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_default()
        }

        fn remove(&mut self) -> Result<()> {
            if self.0.fail_remove {
                return Err(anyhow!("view not attached"));
            }
            *self.0.fields.lock().unwrap() = None;
            Ok(())
        }
    }

    struct FakeProbe {
        granted: bool,
        requests: AtomicUsize,
    }

    impl FakeProbe {
        fn granted() -> Self {
            Self {
                granted: true,
                requests: AtomicUsize::new(0),
            }
        }

        fn denied() -> Self {
            Self {
                granted: false,
                requests: AtomicUsize::new(0),
            }
        }
    }

    impl PermissionProbe for FakeProbe {
        fn can_draw_overlay(&self) -> bool {
            self.granted
        }

        fn request_overlay_grant(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeSink {
        drafts: Mutex<Vec<TransactionDraft>>,
        fail: AtomicBool,
    }

    impl CommitSink for FakeSink {
        fn submit(&self, draft: TransactionDraft) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("host app unreachable"));
            }
            self.drafts.lock().unwrap().push(draft);
            Ok(())
        }
    }

    fn controller(
        surface: Arc<FakeSurface>,
        probe: Arc<FakeProbe>,
        sink: Arc<FakeSink>,
    ) -> OverlayController {
        OverlayController::new(Box::new(SharedSurface(surface)), probe, sink)
    }

    #[test]
    fn test_show_installs_and_populates() {
        let surface = Arc::new(FakeSurface::default());
        let mut ctl = controller(
            surface.clone(),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );

        ctl.show("12.50", "自动识别交易");
        assert!(ctl.state().is_visible());
        assert_eq!(
            *surface.fields.lock().unwrap(),
            Some(("12.50".to_string(), "自动识别交易".to_string()))
        );
    }

    #[test]
    fn test_show_denied_permission() {
        let surface = Arc::new(FakeSurface::default());
        let probe = Arc::new(FakeProbe::denied());
        let mut ctl = controller(surface.clone(), probe.clone(), Arc::new(FakeSink::default()));
        let mut rx = ctl.subscribe();

        ctl.show("12.50", "m");
        assert_eq!(*ctl.state(), OverlayState::Absent);
        assert_eq!(probe.requests.load(Ordering::SeqCst), 1);
        assert!(surface.fields.lock().unwrap().is_none());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ControllerEvent::PermissionRequested
        ));
    }

    #[test]
    fn test_second_show_redirects_to_update() {
        let surface = Arc::new(FakeSurface::default());
        let mut ctl = controller(
            surface.clone(),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );

        ctl.show("12.50", "first");
        ctl.show("45.00", "");
        assert_eq!(
            *surface.fields.lock().unwrap(),
            Some(("45.00".to_string(), "first".to_string()))
        );
        // Still exactly one overlay.
        assert!(ctl.state().is_visible());
    }

    #[test]
    fn test_update_preserves_user_edits_on_empty_fields() {
        let surface = Arc::new(FakeSurface::default());
        let mut ctl = controller(
            surface.clone(),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );

        ctl.show("12.50", "merchant");
        // User edits the description in place.
        surface
            .fields
            .lock()
            .unwrap()
            .as_mut()
            .unwrap()
            .1 = "午饭".to_string();

        ctl.update("13.00", "");
        assert_eq!(
            *surface.fields.lock().unwrap(),
            Some(("13.00".to_string(), "午饭".to_string()))
        );
    }

    #[test]
    fn test_update_identical_content_is_noop() {
        let surface = Arc::new(FakeSurface::default());
        let mut ctl = controller(
            surface.clone(),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );
        ctl.show("12.50", "m");
        let mut rx = ctl.subscribe();

        ctl.update("12.50", "m");
        assert!(matches!(
            rx.try_recv().unwrap(),
            ControllerEvent::AlreadyCurrent
        ));
    }

    #[test]
    fn test_dismiss_idempotent() {
        let surface = Arc::new(FakeSurface::default());
        let mut ctl = controller(
            surface.clone(),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );

        ctl.show("12.50", "m");
        ctl.dismiss();
        assert_eq!(*ctl.state(), OverlayState::Absent);
        ctl.dismiss();
        assert_eq!(*ctl.state(), OverlayState::Absent);

        // From Absent, before any show, also fine.
        let mut fresh = controller(
            Arc::new(FakeSurface::default()),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );
        fresh.dismiss();
        fresh.dismiss();
        assert_eq!(*fresh.state(), OverlayState::Absent);
    }

    #[test]
    fn test_install_failure_self_heals() {
        let surface = Arc::new(FakeSurface {
            fail_install: true,
            ..Default::default()
        });
        let mut ctl = controller(
            surface.clone(),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );
        let mut rx = ctl.subscribe();

        ctl.show("12.50", "m");
        assert_eq!(*ctl.state(), OverlayState::Absent);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ControllerEvent::SurfaceError(_)
        ));
    }

    #[test]
    fn test_remove_failure_still_resets_state() {
        let surface = Arc::new(FakeSurface {
            fail_remove: true,
            ..Default::default()
        });
        let mut ctl = controller(
            surface.clone(),
            Arc::new(FakeProbe::granted()),
            Arc::new(FakeSink::default()),
        );

        ctl.show("12.50", "m");
        ctl.dismiss();
        assert_eq!(*ctl.state(), OverlayState::Absent);
    }

    #[test]
    fn test_commit_reads_edited_fields_and_dismisses() {
        let surface = Arc::new(FakeSurface::default());
        let sink = Arc::new(FakeSink::default());
        let mut ctl = controller(surface.clone(), Arc::new(FakeProbe::granted()), sink.clone());

        ctl.show("12.50", "自动识别交易");
        surface
            .fields
            .lock()
            .unwrap()
            .as_mut()
            .unwrap()
            .1 = "咖啡".to_string();
        ctl.commit();

        let drafts = sink.drafts.lock().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, "12.50");
        assert_eq!(drafts[0].description, "咖啡");
        assert!(drafts[0].auto);
        drop(drafts);
        assert_eq!(*ctl.state(), OverlayState::Absent);
    }

    #[test]
    fn test_commit_handoff_failure_still_dismisses() {
        let surface = Arc::new(FakeSurface::default());
        let sink = Arc::new(FakeSink::default());
        sink.fail.store(true, Ordering::SeqCst);
        let mut ctl = controller(surface.clone(), Arc::new(FakeProbe::granted()), sink.clone());
        ctl.show("12.50", "m");
        let mut rx = ctl.subscribe();

        ctl.commit();
        assert!(matches!(
            rx.try_recv().unwrap(),
            ControllerEvent::HandOffFailed(_)
        ));
        assert!(matches!(rx.try_recv().unwrap(), ControllerEvent::Dismissed));
        assert_eq!(*ctl.state(), OverlayState::Absent);
        assert!(sink.drafts.lock().unwrap().is_empty());
    }
}
