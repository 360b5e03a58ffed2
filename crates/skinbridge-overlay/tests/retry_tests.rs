use std::time::Duration;

use skinbridge_overlay::*;
use skinbridge_protocol::{parse_inbound, OutboundMessage};

const ANCHOR: &[&str] = &["skin-selection-item-information", "loyalty-reward-icon--rewards"];

struct Driver {
    overlay: Overlay,
    tree: MemoryTree,
    outbox: Vec<OutboundMessage>,
    timers: Vec<(Duration, TimerEvent)>,
}

impl Driver {
    fn new() -> Self {
        let mut driver = Self {
            overlay: Overlay::new(OverlayConfig::default()),
            tree: MemoryTree::new(),
            outbox: Vec::new(),
            timers: Vec::new(),
        };
        driver.overlay.start(&mut driver.outbox);
        driver
    }

    fn inbound(&mut self, json: &str) {
        let message = parse_inbound(json).unwrap().unwrap();
        let mut env = Env::new(&mut self.tree, &mut self.outbox, &mut self.timers);
        self.overlay.handle_inbound(message, &mut env);
    }

    fn fire(&mut self, event: TimerEvent) {
        let mut env = Env::new(&mut self.tree, &mut self.outbox, &mut self.timers);
        self.overlay.handle_timer(event, &mut env);
    }

    fn flush_mutations(&mut self) {
        let batch = self.tree.take_mutations();
        let mut env = Env::new(&mut self.tree, &mut self.outbox, &mut self.timers);
        self.overlay.handle_mutations(&batch, &mut env);
    }

    /// Fire timers until none are left, returning every locator retry fired.
    fn run_timers(&mut self) -> Vec<Duration> {
        let mut retries = Vec::new();
        while !self.timers.is_empty() {
            let (delay, event) = self.timers.remove(0);
            if matches!(event, TimerEvent::LocatorRetry { .. }) {
                retries.push(delay);
            }
            self.fire(event);
        }
        retries
    }

    fn pending_retries(&self) -> usize {
        self.timers
            .iter()
            .filter(|(_, e)| matches!(e, TimerEvent::LocatorRetry { .. }))
            .count()
    }
}

#[test]
fn test_missing_anchor_retries_exactly_five_times() {
    let mut d = Driver::new();
    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.inbound(r#"{"type":"state-update","active":true}"#);
    assert_eq!(d.pending_retries(), 1);

    assert!(d.overlay.retry_pending());

    let retries = d.run_timers();
    assert_eq!(retries, vec![Duration::from_millis(500); 5]);
    assert_eq!(d.overlay.retry_attempts(), 0);
    assert!(!d.overlay.retry_pending());
    assert!(d.timers.is_empty());
}

#[test]
fn test_new_trigger_after_abandon_starts_over() {
    let mut d = Driver::new();
    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.inbound(r#"{"type":"state-update","active":true}"#);
    assert_eq!(d.run_timers().len(), 5);

    d.inbound(r#"{"type":"state-update","active":true}"#);
    assert_eq!(d.pending_retries(), 1);
    assert_eq!(d.run_timers().len(), 5);
}

#[test]
fn test_mutation_during_pending_retry_does_not_double_arm() {
    let mut d = Driver::new();
    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.inbound(r#"{"type":"state-update","active":true}"#);
    d.inbound(r#"{"type":"asset-delivered","key":"flag","handleRef":"blob:flag"}"#);
    assert_eq!(d.pending_retries(), 1);

    let root = d.tree.root();
    d.tree.append(root, &["skin-selection-item"], None);
    d.flush_mutations();
    assert_eq!(d.pending_retries(), 1);

    let item = d.tree.select_first(&["skin-selection-item"]).unwrap();
    d.tree.add_class(item, "skin-carousel-offset-2");
    let anchor = d.tree.append(item, ANCHOR, None);
    d.flush_mutations();
    assert!(d.tree.has_class(anchor, "lu-random-flag-active"));
    let styles = d.tree.styles(anchor);

    // The retry armed earlier converges to the same result.
    let retries = d.run_timers();
    assert_eq!(retries.len(), 1);
    assert_eq!(d.tree.styles(anchor), styles);
    assert!(d.timers.is_empty());
}

#[test]
fn test_retry_after_phase_exit_is_inert() {
    let mut d = Driver::new();
    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.inbound(r#"{"type":"state-update","active":true}"#);
    let stale: Vec<TimerEvent> = d.timers.drain(..).map(|(_, e)| e).collect();

    d.inbound(r#"{"type":"phase-signal","phase":"InProgress"}"#);
    assert_eq!(d.overlay.retry_attempts(), 0);

    // Old timers must not act after re-entering.
    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.timers.clear();
    let sent = d.outbox.len();
    for event in stale {
        d.fire(event);
    }

    assert!(d.timers.is_empty());
    assert_eq!(d.overlay.retry_attempts(), 0);
    assert!(d.overlay.control_node().is_none());
    assert_eq!(d.outbox.len(), sent);
}

#[test]
fn test_retry_while_out_of_phase_does_nothing() {
    let mut d = Driver::new();
    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.inbound(r#"{"type":"state-update","active":true}"#);
    d.inbound(r#"{"type":"phase-signal","phase":"EndOfGame"}"#);

    assert_eq!(d.run_timers().len(), 1);
    assert!(d.timers.is_empty());
    assert!(d.tree.is_empty());
}

#[test]
fn test_flag_delivery_after_abandon_renders_anchor_found_by_class_change() {
    let mut d = Driver::new();
    let root = d.tree.root();
    let item = d.tree.append(root, &["skin-selection-item"], None);
    let info = d.tree.append(item, &["skin-selection-item-information"], None);
    d.tree.take_mutations();

    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.inbound(r#"{"type":"state-update","active":true}"#);
    assert_eq!(d.run_timers().len(), 5);
    assert!(!d.overlay.retry_pending());

    // The host turns existing nodes into the anchor without a structural
    // change, so nothing reaches the watcher.
    d.tree.add_class(item, "skin-carousel-offset-2");
    d.tree.add_class(info, "loyalty-reward-icon--rewards");
    d.tree.take_mutations();
    assert!(!d.tree.has_class(info, "lu-random-flag-active"));

    d.inbound(r#"{"type":"asset-delivered","key":"flag","handleRef":"blob:flag"}"#);
    assert!(d.tree.has_class(info, "lu-random-flag-active"));
    assert_eq!(d.overlay.rendered_anchor(), Some(info));
    assert!(d.timers.is_empty());
}

#[test]
fn test_repeated_flag_delivery_still_reconciles() {
    let mut d = Driver::new();
    d.inbound(r#"{"type":"phase-signal","phase":"ChampSelect"}"#);
    d.inbound(r#"{"type":"state-update","active":true}"#);
    d.inbound(r#"{"type":"asset-delivered","key":"flag","handleRef":"blob:flag"}"#);
    assert_eq!(d.run_timers().len(), 5);

    let root = d.tree.root();
    let item = d.tree.append(root, &["skin-selection-item", "skin-carousel-offset-2"], None);
    let anchor = d.tree.append(item, ANCHOR, None);
    d.tree.take_mutations();

    // Second delivery for a resolved key changes no cache but still triggers.
    d.inbound(r#"{"type":"asset-delivered","key":"flag","handleRef":"blob:other"}"#);
    assert!(d.tree.has_class(anchor, "lu-random-flag-active"));
    assert_eq!(
        d.tree.style(anchor, "background-image").as_deref(),
        Some("url(\"blob:flag\")")
    );
}
