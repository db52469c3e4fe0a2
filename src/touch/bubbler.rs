//! Event bubbling - observers first, host input framework second
//!
//! Each derived event is offered to the observers registered for its kind, in
//! registration order. Any observer may claim it by setting
//! [`TouchEventArgs::handled`]; a claimed event never reaches the
//! [`InputSink`]. Unclaimed events update the visible position and are then
//! reported to the sink exactly once, both with the event's own point. Edits an
//! observer makes to [`TouchEventArgs::point`] stay local to the observers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::debug;

use crate::touch::event::{ScaledPoint, TouchEvent, TouchEventArgs, TouchEventKind};

/// Default reporting path of the hosting input framework
pub trait InputSink: Send + Sync {
    fn report_move(&self, point: ScaledPoint);
    fn report_up(&self, point: ScaledPoint);
    fn report_down(&self, point: ScaledPoint);
}

pub type Observer = Arc<dyn Fn(&mut TouchEventArgs) + Send + Sync>;

/// Registration token returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleOutcome {
    /// An observer claimed the event
    Handled,
    /// The event went to the input sink
    Reported,
}

#[derive(Default)]
struct ObserverRegistry {
    next_id: u64,
    entries: Vec<(ObserverId, TouchEventKind, Observer)>,
}

impl ObserverRegistry {
    fn add(&mut self, kind: TouchEventKind, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, kind, observer));
        id
    }

    fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _, _)| *entry_id != id);
        self.entries.len() != before
    }

    fn observers_for(&self, kind: TouchEventKind) -> Vec<Observer> {
        self.entries
            .iter()
            .filter(|(_, entry_kind, _)| *entry_kind == kind)
            .map(|(_, _, observer)| observer.clone())
            .collect()
    }
}

pub struct EventBubbler {
    registry: Mutex<ObserverRegistry>,
    position: RwLock<ScaledPoint>,
    sink: Arc<dyn InputSink>,
}

impl EventBubbler {
    pub fn new(sink: Arc<dyn InputSink>) -> Self {
        Self {
            registry: Mutex::new(ObserverRegistry::default()),
            position: RwLock::new(ScaledPoint::default()),
            sink,
        }
    }

    pub fn subscribe(&self, kind: TouchEventKind, observer: Observer) -> ObserverId {
        let id = self.registry().add(kind, observer);
        debug!("Observer {:?} subscribed to {} events", id, kind);
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.registry().remove(id);
        debug!("Observer {:?} unsubscribed: {}", id, removed);
        removed
    }

    pub fn observer_count(&self, kind: TouchEventKind) -> usize {
        self.registry().observers_for(kind).len()
    }

    /// Position of the last event that reached the input sink
    pub fn position(&self) -> ScaledPoint {
        *self.position.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offers the event to observers, then to the input sink unless claimed.
    pub fn bubble(&self, event: TouchEvent) -> BubbleOutcome {
        let mut args = TouchEventArgs::new(event);

        // Observers run without the registry lock so they can (un)subscribe.
        let observers = self.registry().observers_for(args.kind);
        for observer in &observers {
            observer(&mut args);
        }

        if args.handled {
            debug!("{} at {} handled by observer", args.kind, args.point);
            return BubbleOutcome::Handled;
        }

        *self.position.write().unwrap_or_else(PoisonError::into_inner) = event.point();
        match event {
            TouchEvent::Move(point) => self.sink.report_move(point),
            TouchEvent::Up(point) => self.sink.report_up(point),
            TouchEvent::Down(point) => self.sink.report_down(point),
        }
        BubbleOutcome::Reported
    }

    fn registry(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        moves: AtomicUsize,
        ups: AtomicUsize,
        downs: AtomicUsize,
    }

    impl InputSink for CountingSink {
        fn report_move(&self, _point: ScaledPoint) {
            self.moves.fetch_add(1, Ordering::SeqCst);
        }
        fn report_up(&self, _point: ScaledPoint) {
            self.ups.fetch_add(1, Ordering::SeqCst);
        }
        fn report_down(&self, _point: ScaledPoint) {
            self.downs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn unclaimed_event_is_reported_once() {
        let sink = Arc::new(CountingSink::default());
        let bubbler = EventBubbler::new(sink.clone());
        bubbler.subscribe(TouchEventKind::Move, Arc::new(|_args: &mut TouchEventArgs| {}));

        let point = ScaledPoint::new(3.0, 4.0);
        assert_eq!(bubbler.bubble(TouchEvent::Move(point)), BubbleOutcome::Reported);
        assert_eq!(sink.moves.load(Ordering::SeqCst), 1);
        assert_eq!(bubbler.position(), point);
    }

    #[test]
    fn edited_point_does_not_move_the_reported_position() {
        let sink = Arc::new(CountingSink::default());
        let bubbler = EventBubbler::new(sink.clone());
        bubbler.subscribe(
            TouchEventKind::Move,
            Arc::new(|args: &mut TouchEventArgs| args.point = ScaledPoint::new(999.0, 999.0)),
        );

        let point = ScaledPoint::new(1.0, 2.0);
        assert_eq!(bubbler.bubble(TouchEvent::Move(point)), BubbleOutcome::Reported);
        assert_eq!(sink.moves.load(Ordering::SeqCst), 1);
        assert_eq!(bubbler.position(), point);
    }

    #[test]
    fn claimed_event_skips_the_sink() {
        let sink = Arc::new(CountingSink::default());
        let bubbler = EventBubbler::new(sink.clone());
        bubbler.subscribe(
            TouchEventKind::Down,
            Arc::new(|args: &mut TouchEventArgs| args.handled = true),
        );

        let outcome = bubbler.bubble(TouchEvent::Down(ScaledPoint::new(1.0, 1.0)));
        assert_eq!(outcome, BubbleOutcome::Handled);
        assert_eq!(sink.downs.load(Ordering::SeqCst), 0);
        assert_eq!(bubbler.position(), ScaledPoint::default());
    }

    #[test]
    fn observers_run_in_registration_order_and_see_earlier_claims() {
        let sink = Arc::new(CountingSink::default());
        let bubbler = EventBubbler::new(sink.clone());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        bubbler.subscribe(
            TouchEventKind::Up,
            Arc::new(move |args: &mut TouchEventArgs| {
                first.lock().unwrap().push(("first", args.handled));
                args.handled = true;
            }),
        );
        let second = order.clone();
        bubbler.subscribe(
            TouchEventKind::Up,
            Arc::new(move |args: &mut TouchEventArgs| {
                second.lock().unwrap().push(("second", args.handled));
            }),
        );

        bubbler.bubble(TouchEvent::Up(ScaledPoint::default()));
        assert_eq!(
            *order.lock().unwrap(),
            vec![("first", false), ("second", true)]
        );
        assert_eq!(sink.ups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removed_observer_is_not_called() {
        let sink = Arc::new(CountingSink::default());
        let bubbler = EventBubbler::new(sink.clone());
        let id = bubbler.subscribe(
            TouchEventKind::Move,
            Arc::new(|args: &mut TouchEventArgs| args.handled = true),
        );

        assert!(bubbler.unsubscribe(id));
        assert!(!bubbler.unsubscribe(id));
        assert_eq!(bubbler.observer_count(TouchEventKind::Move), 0);

        bubbler.bubble(TouchEvent::Move(ScaledPoint::default()));
        assert_eq!(sink.moves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observers_only_see_their_kind() {
        let sink = Arc::new(CountingSink::default());
        let bubbler = EventBubbler::new(sink.clone());
        bubbler.subscribe(
            TouchEventKind::Move,
            Arc::new(|args: &mut TouchEventArgs| args.handled = true),
        );

        assert_eq!(
            bubbler.bubble(TouchEvent::Down(ScaledPoint::default())),
            BubbleOutcome::Reported
        );
        assert_eq!(sink.downs.load(Ordering::SeqCst), 1);
    }
}
