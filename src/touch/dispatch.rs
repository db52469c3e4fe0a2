//! Dispatch bridge - hands hardware records to the consumer thread
//!
//! The controller calls back on a thread it owns, whenever it likes. The
//! callback only copies the record into a FIFO queue; everything else runs on
//! one dedicated consumer thread, one record at a time:
//!
//! ```text
//! link thread ──► RecordSink ──[queue]──► consumer: gate { translate ─► bubble }
//! ```
//!
//! The consumer holds the [`TranslationGate`] for the whole translation,
//! observers included. Hooking a new surface takes the same gate, so a region
//! swap never lands in the middle of a translation. A panic anywhere inside the
//! gate is caught, logged and costs only that record's event.

use chrono::{DateTime, Local};
use statum::{machine, state};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::touch::bubbler::{BubbleOutcome, EventBubbler};
use crate::touch::record::{RawRecord, RecordError};
use crate::touch::translator::TouchTranslator;

/// Single-in-flight gate around a binding's translator
pub struct TranslationGate {
    translator: Mutex<TouchTranslator>,
}

impl TranslationGate {
    pub fn new(translator: TouchTranslator) -> Self {
        Self {
            translator: Mutex::new(translator),
        }
    }

    /// Blocks until no translation is in flight. Released when the guard drops.
    pub fn enter(&self) -> MutexGuard<'_, TouchTranslator> {
        self.translator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// One record queued for translation
#[derive(Debug, Clone)]
pub struct Delivery {
    pub context: i32,
    pub record: RawRecord,
    pub received_at: DateTime<Local>,
}

#[derive(Debug)]
enum Dispatch {
    Record(Delivery),
    Shutdown,
}

/// Callback endpoint handed to the hardware link.
///
/// Cheap to clone and safe to call from any thread. Only waits while the
/// bridge is shutting down.
#[derive(Clone)]
pub struct RecordSink {
    sender: mpsc::UnboundedSender<Dispatch>,
    // Held for reading across check and send, so no record lands behind `Shutdown`.
    open: Arc<RwLock<bool>>,
}

impl RecordSink {
    /// Queues one raw record. Returns false if the record was dropped.
    pub fn deliver(&self, context: i32, bytes: &[u8]) -> bool {
        let open = self.open.read().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            debug!("Sink closed, dropping record from context {}", context);
            return false;
        }

        let record = match RawRecord::from_slice(bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!("Dropping malformed record from context {}: {}", context, e);
                return false;
            }
        };

        let delivery = Delivery {
            context,
            record,
            received_at: Local::now(),
        };
        match self.sender.send(Dispatch::Record(delivery)) {
            Ok(_) => true,
            Err(_) => {
                debug!("Consumer thread gone, dropping record");
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub thread_name: String,
    pub stats_interval_secs: i64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            thread_name: "touch-consumer".to_string(),
            stats_interval_secs: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to spawn consumer thread: {0}")]
    SpawnError(String),

    #[error("Dispatch channel closed unexpectedly")]
    ChannelClosed,

    #[error("Invalid dispatch settings: {0}")]
    SettingsError(String),
}

#[derive(Debug, Clone)]
struct WorkerStats {
    translations: u64,
    reported: u64,
    handled: u64,
    faults: u64,
    window_start: DateTime<Local>,
}

impl WorkerStats {
    fn new() -> Self {
        Self {
            translations: 0,
            reported: 0,
            handled: 0,
            faults: 0,
            window_start: Local::now(),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
enum WorkerState {
    Waiting,
    Translating(Delivery),
}

#[machine]
struct TranslationWorker<S: WorkerState> {
    receiver: mpsc::UnboundedReceiver<Dispatch>,
    gate: Arc<TranslationGate>,
    bubbler: Arc<EventBubbler>,
    stats: WorkerStats,
    stats_interval: chrono::Duration,
}

impl TranslationWorker<Waiting> {
    fn create(
        receiver: mpsc::UnboundedReceiver<Dispatch>,
        gate: Arc<TranslationGate>,
        bubbler: Arc<EventBubbler>,
        stats_interval_secs: i64,
    ) -> Result<Self, DispatchError> {
        let stats_interval = chrono::Duration::try_seconds(stats_interval_secs.max(1))
            .ok_or_else(|| {
                DispatchError::SettingsError(format!(
                    "stats interval of {} seconds is out of range",
                    stats_interval_secs
                ))
            })?;
        Ok(Self::new(
            receiver,
            gate,
            bubbler,
            WorkerStats::new(),
            stats_interval,
        ))
    }

    /// Blocks until the next record arrives. `None` means shutdown was requested.
    fn wait_for_delivery(mut self) -> Result<Option<TranslationWorker<Translating>>, DispatchError> {
        match self.receiver.blocking_recv() {
            Some(Dispatch::Record(delivery)) => Ok(Some(self.transition_with(delivery))),
            Some(Dispatch::Shutdown) => Ok(None),
            None => Err(DispatchError::ChannelClosed),
        }
    }
}

impl TranslationWorker<Translating> {
    /// Runs the full translation for the current record under the gate.
    fn translate(mut self) -> TranslationWorker<Waiting> {
        let delivery = match self.get_state_data() {
            Some(delivery) => delivery.clone(),
            None => {
                warn!("Translating state without a delivery");
                return self.transition();
            }
        };

        let outcome = {
            let mut translator = self.gate.enter();
            let bubbler = &self.bubbler;
            panic::catch_unwind(AssertUnwindSafe(
                || -> Result<Option<BubbleOutcome>, RecordError> {
                    Ok(translator
                        .translate(&delivery.record)?
                        .map(|event| bubbler.bubble(event)))
                },
            ))
        };

        self.stats.translations += 1;
        match outcome {
            Ok(Ok(Some(BubbleOutcome::Reported))) => self.stats.reported += 1,
            Ok(Ok(Some(BubbleOutcome::Handled))) => self.stats.handled += 1,
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                self.stats.faults += 1;
                warn!(
                    "Dropping record from context {}: {}",
                    delivery.context, e
                );
            }
            Err(panic) => {
                self.stats.faults += 1;
                error!(
                    "Translation fault, event dropped: {}",
                    panic_message(panic.as_ref())
                );
            }
        }

        let latency = Local::now() - delivery.received_at;
        debug!(
            "Record translated {}µs after delivery",
            latency.num_microseconds().unwrap_or(i64::MAX)
        );
        self.log_stats();

        self.transition()
    }

    fn log_stats(&mut self) {
        let now = Local::now();
        let elapsed = now - self.stats.window_start;
        if elapsed <= self.stats_interval {
            return;
        }

        info!(
            "Consumer stats: {} translations, {} reported, {} handled, {} faults in {} seconds",
            self.stats.translations,
            self.stats.reported,
            self.stats.handled,
            self.stats.faults,
            elapsed.num_seconds()
        );
        self.stats = WorkerStats::new();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn run_worker_loop(mut worker: TranslationWorker<Waiting>) -> Result<(), DispatchError> {
    info!("Entering consumer loop");
    loop {
        match worker.wait_for_delivery()? {
            Some(translating) => worker = translating.translate(),
            None => {
                info!("Consumer loop received shutdown");
                return Ok(());
            }
        }
    }
}

/// Owner of the consumer thread and its queue
pub struct DispatchBridge {
    sink: RecordSink,
    consumer: Option<JoinHandle<()>>,
}

impl DispatchBridge {
    pub fn spawn(
        gate: Arc<TranslationGate>,
        bubbler: Arc<EventBubbler>,
        settings: DispatchSettings,
    ) -> Result<Self, DispatchError> {
        info!("Spawning dispatch bridge with settings: {:?}", settings);

        let (sender, receiver) = mpsc::unbounded_channel();
        let sink = RecordSink {
            sender,
            open: Arc::new(RwLock::new(true)),
        };

        let worker =
            TranslationWorker::create(receiver, gate, bubbler, settings.stats_interval_secs)?;
        let consumer = thread::Builder::new()
            .name(settings.thread_name.clone())
            .spawn(move || {
                if let Err(e) = run_worker_loop(worker) {
                    error!("Consumer loop terminated with error: {}", e);
                } else {
                    info!("Consumer loop finished");
                }
            })
            .map_err(|e| DispatchError::SpawnError(e.to_string()))?;

        debug!("Consumer thread {:?} started", consumer.thread().id());
        Ok(Self {
            sink,
            consumer: Some(consumer),
        })
    }

    pub fn sink(&self) -> RecordSink {
        self.sink.clone()
    }

    pub fn consumer_thread(&self) -> Option<ThreadId> {
        self.consumer.as_ref().map(|handle| handle.thread().id())
    }

    pub fn is_running(&self) -> bool {
        self.consumer.is_some()
    }

    /// Stops accepting records and waits for the queued ones to finish.
    ///
    /// Called from the consumer thread itself (an observer disposing its
    /// device) it only closes the queue; the loop exits after the current record.
    pub fn shutdown(&mut self) {
        let Some(consumer) = self.consumer.take() else {
            return;
        };

        info!("Shutting down dispatch bridge");
        {
            let mut open = self.sink.open.write().unwrap_or_else(PoisonError::into_inner);
            *open = false;
            if self.sink.sender.send(Dispatch::Shutdown).is_err() {
                debug!("Consumer already stopped");
            }
        }

        if thread::current().id() == consumer.thread().id() {
            warn!("Dispatch bridge shut down from its own consumer thread, not waiting");
            return;
        }

        if consumer.join().is_err() {
            error!("Consumer thread panicked during shutdown");
        } else {
            debug!("Consumer thread joined");
        }
    }
}

impl Drop for DispatchBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimulatedLink;
    use crate::touch::bubbler::InputSink;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use crate::touch::event::{ScaledPoint, TouchEventArgs, TouchEventKind};
    use crate::touch::record::{RawButtonSample, RawPositionalSample, RECORD_LEN};
    use crate::touch::translator::TranslatorSettings;

    #[derive(Default)]
    struct RecordingSink {
        reported: Mutex<Vec<(TouchEventKind, ScaledPoint)>>,
    }

    impl InputSink for RecordingSink {
        fn report_move(&self, point: ScaledPoint) {
            self.reported.lock().unwrap().push((TouchEventKind::Move, point));
        }
        fn report_up(&self, point: ScaledPoint) {
            self.reported.lock().unwrap().push((TouchEventKind::Up, point));
        }
        fn report_down(&self, point: ScaledPoint) {
            self.reported.lock().unwrap().push((TouchEventKind::Down, point));
        }
    }

    fn bridge_with(sink: Arc<RecordingSink>) -> (DispatchBridge, Arc<EventBubbler>) {
        let (bridge, bubbler, _gate) = bridge_with_gate(sink);
        (bridge, bubbler)
    }

    fn bridge_with_gate(
        sink: Arc<RecordingSink>,
    ) -> (DispatchBridge, Arc<EventBubbler>, Arc<TranslationGate>) {
        let link = Arc::new(SimulatedLink::new());
        let translator = TouchTranslator::new(link, TranslatorSettings::default());
        let gate = Arc::new(TranslationGate::new(translator));
        let bubbler = Arc::new(EventBubbler::new(sink));
        let bridge =
            DispatchBridge::spawn(gate.clone(), bubbler.clone(), DispatchSettings::default())
                .unwrap();
        (bridge, bubbler, gate)
    }

    fn positional(raw: u32) -> RawRecord {
        RawPositionalSample {
            raw_x: raw,
            raw_y: raw,
            cal_x: raw,
            cal_y: raw,
            ..Default::default()
        }
        .to_record()
    }

    #[test]
    fn records_are_translated_in_order_on_the_consumer_thread() {
        let sink = Arc::new(RecordingSink::default());
        let (mut bridge, bubbler) = bridge_with(sink.clone());
        let consumer = bridge.consumer_thread().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_observer = seen.clone();
        bubbler.subscribe(
            TouchEventKind::Move,
            Arc::new(move |_args: &mut TouchEventArgs| {
                seen_by_observer.lock().unwrap().push(thread::current().id());
            }),
        );

        let record_sink = bridge.sink();
        for raw in [100, 200, 300] {
            assert!(record_sink.deliver(0, positional(raw).as_bytes()));
        }
        bridge.shutdown();

        let reported = sink.reported.lock().unwrap();
        let xs: Vec<f64> = reported.iter().map(|(_, point)| point.x).collect();
        assert_eq!(xs, vec![100.0, 200.0, 300.0]);
        assert!(seen.lock().unwrap().iter().all(|id| *id == consumer));
    }

    #[test]
    fn panicking_observer_does_not_wedge_the_gate() {
        let sink = Arc::new(RecordingSink::default());
        let (mut bridge, bubbler) = bridge_with(sink.clone());
        let tripped = Arc::new(AtomicBool::new(false));
        let trip = tripped.clone();
        bubbler.subscribe(
            TouchEventKind::Move,
            Arc::new(move |_args: &mut TouchEventArgs| {
                if !trip.swap(true, Ordering::SeqCst) {
                    panic!("observer failure");
                }
            }),
        );

        let record_sink = bridge.sink();
        record_sink.deliver(0, positional(100).as_bytes());
        // Queued behind the faulting record, still translated.
        record_sink.deliver(0, positional(200).as_bytes());
        bridge.shutdown();

        assert!(tripped.load(Ordering::SeqCst));
        let reported = sink.reported.lock().unwrap();
        assert_eq!(
            *reported,
            vec![(TouchEventKind::Move, ScaledPoint::new(200.0, 200.0))]
        );
    }

    #[test]
    fn malformed_and_late_records_are_refused() {
        let sink = Arc::new(RecordingSink::default());
        let (mut bridge, _bubbler) = bridge_with(sink.clone());
        let record_sink = bridge.sink();

        assert!(!record_sink.deliver(0, &[0u8; RECORD_LEN - 1]));
        bridge.shutdown();
        assert!(!record_sink.is_open());

        let late = RawButtonSample {
            left: true,
            ..Default::default()
        }
        .to_record();
        assert!(!record_sink.deliver(0, late.as_bytes()));
        assert!(sink.reported.lock().unwrap().is_empty());
    }

    #[test]
    fn out_of_range_stats_interval_is_rejected() {
        let link = Arc::new(SimulatedLink::new());
        let translator = TouchTranslator::new(link, TranslatorSettings::default());
        let gate = Arc::new(TranslationGate::new(translator));
        let bubbler = Arc::new(EventBubbler::new(Arc::new(RecordingSink::default())));
        let settings = DispatchSettings {
            stats_interval_secs: i64::MAX,
            ..Default::default()
        };

        let result = DispatchBridge::spawn(gate, bubbler, settings);
        assert!(matches!(result, Err(DispatchError::SettingsError(_))));
    }

    #[test]
    fn every_accepted_record_is_translated_across_shutdown() {
        let sink = Arc::new(RecordingSink::default());
        let (mut bridge, _bubbler, gate) = bridge_with_gate(sink);
        let accepted = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let record_sink = bridge.sink();
                let accepted = accepted.clone();
                thread::spawn(move || {
                    let press = RawButtonSample {
                        left: true,
                        ..Default::default()
                    }
                    .to_record();
                    for _ in 0..500 {
                        if record_sink.deliver(0, press.as_bytes()) {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        thread::sleep(std::time::Duration::from_millis(1));
        bridge.shutdown();
        for producer in producers {
            producer.join().unwrap();
        }

        let translated = gate.enter().snapshot().accepted_samples;
        assert_eq!(translated, accepted.load(Ordering::SeqCst) as u64);
    }
}
