//! # Chord Engine
//!
//! Ties onset detection to the analysis pipeline and publishes results.
//!
//! ## Threads
//! - **Audio callback**: calls [`ChordEngine::on_amplitude`]. Only the flux
//!   decision runs there; a fired onset is handed to the worker.
//! - **Analysis worker**: waits out the latch delay (cancellable by newer
//!   onsets), snapshots the samples, runs the pipeline and publishes.
//! - **Consumers**: read [`ChordEngine::current`] or receive
//!   [`EngineEvent`]s from [`ChordEngine::subscribe`].
//!
//! Every start and stop bumps a session counter. Results computed for an
//! older session are dropped instead of published.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::{AnalysisError, Result};
use crate::matcher;
use crate::onset::{OnsetDetector, OnsetPhase, Trigger};
use crate::pipeline::Analyzer;
use crate::templates::TemplateBank;
use crate::{Candidate, ChromaVector, DetectionResult, NO_CHORD};

/// Provider of raw audio for snapshots.
///
/// Implementations must return a copy so the writer can keep going while the
/// worker reads.
pub trait SampleSource: Send + Sync {
    /// Sample rate in Hz, fixed for the duration of a session.
    fn sample_rate(&self) -> f32;
    /// Copies the most recent audio.
    ///
    /// # Arguments
    /// * `count` - Number of samples wanted, normally the analysis window
    ///
    /// # Returns
    /// The newest `count` mono samples, oldest first. Fewer are returned
    /// while the buffer is still filling; the analysis then skips the onset.
    fn recent_samples(&self, count: usize) -> Vec<f32>;
}

/// Notifications pushed to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A strum was heard; the published chord was reset to `"--"`.
    Onset { session: u64, trigger_id: u64 },
    /// An analysis finished and its result is now the published state.
    Detection(DetectionResult),
    /// The engine was started or stopped and the published state cleared.
    Cleared { session: u64 },
}

/// Messages from the control and audio threads to the analysis worker.
#[derive(Debug)]
enum Command {
    Arm(Trigger),
    Shutdown,
}

/// State shared between the engine handle and its worker thread.
struct Shared {
    config: EngineConfig,
    source: Arc<dyn SampleSource>,
    bank: RwLock<TemplateBank>,
    onset: Mutex<OnsetDetector>,
    session: AtomicU64,
    running: AtomicBool,
    published: Mutex<DetectionResult>,
    listeners: Mutex<Vec<Sender<EngineEvent>>>,
    empty_bank_reported: AtomicBool,
}

/// Locks a mutex, recovering the data if a panicking thread poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn notify(&self, event: EngineEvent) {
        lock(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Bumps the session if requested, cancels pending work and clears the
    /// published state. Returns the session the cleared state belongs to.
    ///
    /// The session only changes while the onset lock is held, together with
    /// the reset that drops the pending trigger.
    fn clear(&self, new_session: bool) -> u64 {
        let mut published = lock(&self.published);
        let session = {
            let mut onset = lock(&self.onset);
            onset.reset();
            if new_session {
                self.session.fetch_add(1, Ordering::SeqCst) + 1
            } else {
                self.session.load(Ordering::SeqCst)
            }
        };
        *published = DetectionResult::cleared(session);
        drop(published);
        self.notify(EngineEvent::Cleared { session });
        session
    }

    /// Consumes trigger `id` and returns the session it belongs to.
    ///
    /// Returns `None` if the trigger was preempted or cancelled. A claim that
    /// wins against a concurrent [`Shared::clear`] carries the old session,
    /// so its result is rejected by [`Shared::publish`].
    fn claim(&self, id: u64) -> Option<u64> {
        let mut onset = lock(&self.onset);
        onset
            .claim(id)
            .then(|| self.session.load(Ordering::SeqCst))
    }

    /// Publishes `result` unless its session has been superseded.
    fn publish(&self, result: DetectionResult) -> bool {
        let mut published = lock(&self.published);
        if result.session != self.session.load(Ordering::SeqCst) {
            return false;
        }
        *published = result.clone();
        drop(published);
        self.notify(EngineEvent::Detection(result));
        true
    }
}

/// Real-time strum chord recogniser.
///
/// Constructed once per session owner and shared by reference (usually in an
/// `Arc`) between the audio callback and consumers. All methods take `&self`.
pub struct ChordEngine {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    command_rx: Receiver<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChordEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChordEngine")
            .field("running", &self.is_running())
            .field("session", &self.session())
            .field("templates", &self.template_count())
            .finish()
    }
}

impl ChordEngine {
    /// Creates a stopped engine with a freshly generated template bank.
    pub fn new(config: EngineConfig, source: Arc<dyn SampleSource>) -> Result<Self> {
        Self::with_bank(config, source, TemplateBank::new())
    }

    /// Creates a stopped engine around an explicit template bank.
    ///
    /// # Arguments
    /// * `config` - Onset, analysis and tuning parameters; validated here
    /// * `source` - Where snapshots are read from when a trigger comes due
    /// * `bank` - Templates to score against. An empty bank is accepted and
    ///   makes every strum read `"?"`
    ///
    /// # Returns
    /// * `Ok(engine)` - A stopped engine; call [`ChordEngine::start`] to listen
    /// * `Err(e)` - The config failed [`EngineConfig::validate`]
    pub fn with_bank(
        config: EngineConfig,
        source: Arc<dyn SampleSource>,
        bank: TemplateBank,
    ) -> Result<Self> {
        config.validate()?;
        if bank.is_empty() {
            warn!("ChordEngine created with an empty template bank; every strum will read \"?\"");
        }
        info!(
            "ChordEngine ready: {} templates, tuning {}",
            bank.len(),
            config.tuning.display_name()
        );

        let (commands, command_rx) = crossbeam_channel::unbounded();
        let shared = Shared {
            onset: Mutex::new(OnsetDetector::new(&config.onset)),
            config,
            source,
            bank: RwLock::new(bank),
            session: AtomicU64::new(0),
            running: AtomicBool::new(false),
            published: Mutex::new(DetectionResult::default()),
            listeners: Mutex::new(Vec::new()),
            empty_bank_reported: AtomicBool::new(false),
        };
        Ok(Self {
            shared: Arc::new(shared),
            commands,
            command_rx,
            worker: Mutex::new(None),
        })
    }

    /// Clears state and starts the analysis worker. No-op if already running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        // Leftovers from a previous run belong to a dead session.
        while self.command_rx.try_recv().is_ok() {}
        let session = self.shared.clear(true);

        let shared = self.shared.clone();
        let commands = self.command_rx.clone();
        let spawned = thread::Builder::new()
            .name("chord-analysis".into())
            .spawn(move || run_worker(shared, commands));

        match spawned {
            Ok(handle) => {
                *lock(&self.worker) = Some(handle);
                info!("ChordEngine started (session {})", session);
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                error!("Failed to spawn analysis worker: {}", e);
            }
        }
    }

    /// Stops listening, cancels pending analysis and clears the published
    /// state before returning. Calling it again yields the same state.
    pub fn stop(&self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        let session = self.shared.clear(was_running);

        if let Some(handle) = lock(&self.worker).take() {
            let _ = self.commands.send(Command::Shutdown);
            if handle.join().is_err() {
                error!("Analysis worker panicked during shutdown");
            }
        }
        if was_running {
            info!("ChordEngine stopped (session {})", session);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Regenerates the template bank. Safe while running.
    pub fn refresh_templates(&self) -> usize {
        let count = self
            .shared
            .bank
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .refresh();
        self.shared.empty_bank_reported.store(false, Ordering::SeqCst);
        info!("Refreshed {} chord templates", count);
        count
    }

    pub fn template_count(&self) -> usize {
        self.shared.bank.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Feeds one amplitude value from the audio callback, timestamped now.
    pub fn on_amplitude(&self, amp: f32) {
        self.on_amplitude_at(amp, Instant::now());
    }

    /// Feeds one amplitude value observed at `now`.
    ///
    /// # Arguments
    /// * `amp` - RMS-like amplitude of one audio callback block
    /// * `now` - When the block was captured; also the base of the latch deadline
    ///
    /// Does no spectral work. When an onset fires, the published chord is
    /// reset to `"--"` and the worker is armed with the new trigger, which
    /// replaces any trigger still waiting for its latch delay.
    pub fn on_amplitude_at(&self, amp: f32, now: Instant) {
        if !self.shared.running.load(Ordering::Relaxed) {
            return;
        }
        let Some(trigger) = lock(&self.shared.onset).observe(amp, now) else {
            return;
        };

        let session = {
            let mut published = lock(&self.shared.published);
            published.chord = NO_CHORD.to_string();
            published.confidence = 0.0;
            published.session
        };
        self.shared.notify(EngineEvent::Onset {
            session,
            trigger_id: trigger.id,
        });
        if self.commands.send(Command::Arm(trigger)).is_err() {
            error!("Analysis worker channel closed; onset {} dropped", trigger.id);
        }
    }

    /// Registers a listener. Every later event is delivered to it.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        lock(&self.shared.listeners).push(tx);
        rx
    }

    /// Snapshot of the published state.
    pub fn current(&self) -> DetectionResult {
        lock(&self.shared.published).clone()
    }

    pub fn detected_chord(&self) -> String {
        lock(&self.shared.published).chord.clone()
    }

    pub fn confidence(&self) -> f32 {
        lock(&self.shared.published).confidence
    }

    pub fn chroma_vector(&self) -> ChromaVector {
        lock(&self.shared.published).chroma
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        lock(&self.shared.published).candidates.clone()
    }

    pub fn session(&self) -> u64 {
        self.shared.session.load(Ordering::SeqCst)
    }

    pub fn onset_phase(&self) -> OnsetPhase {
        lock(&self.shared.onset).phase(Instant::now())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }
}

impl Drop for ChordEngine {
    fn drop(&mut self) {
        if self.is_running() || lock(&self.worker).is_some() {
            self.stop();
        }
    }
}

/// Worker loop: holds at most one armed trigger and fires it at its deadline.
fn run_worker(shared: Arc<Shared>, commands: Receiver<Command>) {
    debug!("[WORKER] analysis worker started");
    let mut analyzer: Option<Analyzer> = None;
    let mut armed: Option<Trigger> = None;

    loop {
        let command = match armed {
            Some(trigger) => crossbeam_channel::select! {
                recv(commands) -> msg => msg.ok(),
                recv(crossbeam_channel::at(trigger.due_at)) -> _ => {
                    armed = None;
                    fire(&shared, &mut analyzer, trigger);
                    continue;
                },
            },
            None => commands.recv().ok(),
        };

        match command {
            Some(Command::Arm(trigger)) => {
                if let Some(previous) = armed.replace(trigger) {
                    debug!("[WORKER] onset {} preempted by {}", previous.id, trigger.id);
                }
            }
            Some(Command::Shutdown) | None => break,
        }
    }
    debug!("[WORKER] analysis worker exiting");
}

/// Runs one analysis for `trigger` if it is still the current onset.
fn fire(shared: &Shared, analyzer: &mut Option<Analyzer>, trigger: Trigger) {
    let Some(session) = shared.claim(trigger.id) else {
        debug!("[WORKER] onset {} was cancelled", trigger.id);
        return;
    };

    if analyzer.is_none() {
        match Analyzer::new(&shared.config.analysis) {
            Ok(built) => *analyzer = Some(built),
            Err(e) => {
                error!("[WORKER] analyzer setup failed: {}", e);
                return;
            }
        }
    }
    let Some(analyzer) = analyzer.as_ref() else {
        return;
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let samples = shared.source.recent_samples(analyzer.window_size());
        let sample_rate = shared.source.sample_rate();
        let bank = shared.bank.read().unwrap_or_else(|e| e.into_inner());
        if bank.is_empty() && !shared.empty_bank_reported.swap(true, Ordering::SeqCst) {
            warn!("[WORKER] {}; reporting \"?\"", AnalysisError::EmptyTemplateBank);
        }
        analyzer.analyze(&samples, sample_rate, bank.templates(), session)
    }));

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(AnalysisError::InsufficientData { needed, got })) => {
            debug!("[WORKER] not enough audio yet ({} of {} samples)", got, needed);
            return;
        }
        Ok(Err(e)) => {
            error!("[WORKER] analysis failed: {}", e);
            return;
        }
        Err(_) => {
            error!("[WORKER] analysis panicked; still listening");
            return;
        }
    };

    if result.is_confident() {
        debug!("Strum locked: {} ({:.2})", result.chord, result.confidence);
    }
    if let Some(tie) = matcher::near_tie(&result.candidates) {
        debug!(
            "Near tie: {} ({:.2}) vs {} ({:.2})",
            tie.top.name, tie.top.score, tie.runner_up.name, tie.runner_up.score
        );
    }
    if !shared.publish(result) {
        debug!("[WORKER] discarded result from stale session {}", session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silence;

    impl SampleSource for Silence {
        fn sample_rate(&self) -> f32 {
            44_100.0
        }

        fn recent_samples(&self, count: usize) -> Vec<f32> {
            vec![0.0; count]
        }
    }

    fn engine() -> ChordEngine {
        ChordEngine::new(EngineConfig::default(), Arc::new(Silence)).unwrap()
    }

    fn late_result(session: u64) -> DetectionResult {
        DetectionResult {
            chord: "C".to_string(),
            confidence: 0.95,
            ..DetectionResult::cleared(session)
        }
    }

    #[test]
    fn result_claimed_before_stop_is_not_published() {
        let engine = engine();
        engine.start();
        let trigger = lock(&engine.shared.onset).observe(0.3, Instant::now()).unwrap();

        // The worker wins the claim, then stop runs before it publishes.
        let session = engine.shared.claim(trigger.id).unwrap();
        engine.stop();

        assert!(session < engine.session());
        assert!(!engine.shared.publish(late_result(session)));
        assert_eq!(engine.current(), DetectionResult::cleared(engine.session()));
    }

    #[test]
    fn trigger_cleared_by_stop_cannot_be_claimed() {
        let engine = engine();
        engine.start();
        let trigger = lock(&engine.shared.onset).observe(0.3, Instant::now()).unwrap();

        engine.stop();
        assert_eq!(engine.shared.claim(trigger.id), None);
        assert_eq!(engine.detected_chord(), NO_CHORD);
    }

    #[test]
    fn current_session_result_is_published() {
        let engine = engine();
        engine.start();
        let trigger = lock(&engine.shared.onset).observe(0.3, Instant::now()).unwrap();
        let session = engine.shared.claim(trigger.id).unwrap();

        assert_eq!(session, engine.session());
        assert!(engine.shared.publish(late_result(session)));
        assert_eq!(engine.detected_chord(), "C");
        engine.stop();
    }
}
