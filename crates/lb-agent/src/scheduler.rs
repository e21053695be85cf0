//! The periodic collection loop.
//!
//! [`Scheduler`] owns everything a cycle touches: both registrars, the cached
//! marker directories, the sink and the cycle counter. Nothing is shared, so
//! nothing is locked; each cycle runs on tokio's blocking pool with the
//! scheduler moved in and handed back out.
//!
//! # Cycle
//!
//! ```text
//! tick ──► full scan (first cycle, then every `full_rescan_every`)
//!      │   or prune cached targets
//!      ├─► list targets: detect ─► collect ─► sink
//!      ├─► LOG targets:  detect ─► collect ─► sink
//!      └─► flush each dirty registrar
//! ```
//!
//! The stop signal is only observed between cycles. A cycle in progress
//! always finishes, and the registrar is flushed only after the collecting
//! pass, so a crash mid-cycle re-delivers rather than loses files.
//!
//! # Usage
//!
//! ```no_run
//! use lb_agent::{ChannelSink, Scheduler};
//! use lb_core::Config;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), lb_agent::AgentError> {
//! let (sink, mut events) = ChannelSink::new();
//! let scheduler = Scheduler::new(Config::default(), sink)?;
//! let stop = CancellationToken::new();
//!
//! let run = tokio::spawn(scheduler.run(stop.clone()));
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.path);
//! }
//! stop.cancel();
//! let summary = run.await??;
//! println!("{} files in {} cycles", summary.collected, summary.cycles);
//! # Ok(())
//! # }
//! ```

use lb_core::{Config, MarkerKind, ScanTarget};
use lb_scanner::{MarkerLocator, RegistrarStore, find_new_or_changed, prune};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::collector::Collector;
use crate::error::AgentError;
use crate::report::{CycleReport, KindReport, RunSummary};
use crate::sink::Sink;

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Waiting for the next tick. The only state that observes the stop signal.
    Idle,
    /// Running a cycle.
    Collecting,
    /// Sink closed; terminal.
    Stopped,
}

/// Periodic collector for `list` and `LOG` marker directories.
pub struct Scheduler<S: Sink + 'static> {
    config: Config,
    locator: MarkerLocator,
    collector: Collector,
    list_registrar: RegistrarStore,
    log_registrar: RegistrarStore,
    list_targets: Vec<ScanTarget>,
    log_targets: Vec<ScanTarget>,
    /// Cycles completed or in progress.
    cycle: u64,
    /// Cycles since the last full scan.
    since_full_scan: u32,
    state: SchedulerState,
    sink: S,
}

impl<S: Sink + 'static> std::fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .field("cycle", &self.cycle)
            .field("list_targets", &self.list_targets.len())
            .field("log_targets", &self.log_targets.len())
            .finish_non_exhaustive()
    }
}

impl<S: Sink + 'static> Scheduler<S> {
    /// Creates a scheduler, loading both registrars from disk.
    ///
    /// Missing or malformed registrar files start empty (see
    /// [`RegistrarStore::load`]).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `config` fails
    /// [`Config::validate`], e.g. a zero period.
    pub fn new(config: Config, sink: S) -> Result<Self, AgentError> {
        config.validate()?;

        let list_registrar = RegistrarStore::load(config.registrar.list_file());
        let log_registrar = RegistrarStore::load(config.registrar.log_file());
        let locator = MarkerLocator::new().with_follow_links(config.scan.follow_links);

        tracing::info!(
            roots = config.scan.roots.len(),
            period_secs = config.schedule.period_secs,
            full_rescan_every = config.schedule.full_rescan_every,
            list_entries = list_registrar.len(),
            log_entries = log_registrar.len(),
            "Scheduler created"
        );

        Ok(Self {
            config,
            locator,
            collector: Collector::new(),
            list_registrar,
            log_registrar,
            list_targets: Vec::new(),
            log_targets: Vec::new(),
            cycle: 0,
            since_full_scan: 0,
            state: SchedulerState::Idle,
            sink,
        })
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of cycles run so far.
    #[inline]
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Cached marker directories of `kind`.
    #[must_use]
    pub fn targets(&self, kind: MarkerKind) -> &[ScanTarget] {
        match kind {
            MarkerKind::List => &self.list_targets,
            MarkerKind::Log => &self.log_targets,
        }
    }

    /// Registrar for files of `kind`.
    #[must_use]
    pub const fn registrar(&self, kind: MarkerKind) -> &RegistrarStore {
        match kind {
            MarkerKind::List => &self.list_registrar,
            MarkerKind::Log => &self.log_registrar,
        }
    }

    /// The sink events are published to.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs one collection cycle synchronously.
    ///
    /// Per-file and per-directory failures are logged and counted in the
    /// report; they never abort the cycle. Does nothing once stopped.
    pub fn run_cycle(&mut self) -> CycleReport {
        if self.state == SchedulerState::Stopped {
            tracing::warn!("Cycle requested after stop, ignoring");
            return CycleReport::new(self.cycle, false);
        }
        self.state = SchedulerState::Collecting;
        self.cycle += 1;
        self.since_full_scan += 1;

        let full_scan =
            self.cycle == 1 || self.since_full_scan >= self.config.schedule.full_rescan_every;
        self.refresh_targets(full_scan);

        let mut report = CycleReport::new(self.cycle, full_scan);
        let mut budget = self.config.scan.max_files_per_cycle;
        for kind in MarkerKind::ALL {
            self.collect_kind(kind, report.kind_mut(kind), &mut budget);
        }
        for kind in MarkerKind::ALL {
            let counters = report.kind_mut(kind);
            let registrar = self.registrar_mut(kind);
            if registrar.is_dirty() {
                let saved = registrar.flush();
                counters.flushed = saved;
                counters.flush_failed = !saved;
            }
        }

        tracing::info!(
            cycle = report.cycle,
            full_scan = report.full_scan,
            list_targets = report.list.targets,
            log_targets = report.log.targets,
            collected = report.collected(),
            deferred = report.deferred(),
            failures = report.failures(),
            "Cycle complete"
        );

        self.state = SchedulerState::Idle;
        report
    }

    /// Closes the sink and makes a last attempt to persist dirty registrars.
    ///
    /// Idempotent: the sink is closed on the first call only.
    pub fn shutdown(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        self.sink.close();
        for kind in MarkerKind::ALL {
            let registrar = self.registrar_mut(kind);
            if registrar.is_dirty() && !registrar.flush() {
                tracing::error!(kind = %kind, path = %registrar.path(), "Registrar not persisted at shutdown");
            }
        }
        self.state = SchedulerState::Stopped;
        tracing::info!(cycles = self.cycle, "Scheduler stopped");
    }

    /// Consumes the scheduler, returning the sink.
    ///
    /// Shuts down first if that has not happened yet.
    pub fn into_sink(mut self) -> S {
        self.shutdown();
        self.sink
    }

    /// Ticks every `schedule.period_secs` until `stop` is cancelled.
    ///
    /// The first cycle runs after one period, or immediately when
    /// `schedule.collect_on_start` is set. Missed ticks are delayed, never
    /// bunched up. On return the sink has been closed.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::TaskFailed`] if a cycle panics. The sink is not
    /// closed in that case; it was lost with the task.
    pub async fn run(self, stop: CancellationToken) -> Result<RunSummary, AgentError> {
        let period = self.config.schedule.period();
        let start = if self.config.schedule.collect_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = RunSummary::default();
        let mut scheduler = self;

        tracing::info!(period = ?period, "Collection loop started");
        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => {
                    tracing::info!("Stop requested");
                    break;
                }
                _ = interval.tick() => {}
            }

            let (returned, report) = tokio::task::spawn_blocking(move || {
                let report = scheduler.run_cycle();
                (scheduler, report)
            })
            .await?;
            scheduler = returned;
            summary.absorb(&report);
        }

        tokio::task::spawn_blocking(move || scheduler.shutdown()).await?;
        tracing::info!(
            cycles = summary.cycles,
            collected = summary.collected,
            failures = summary.failures,
            "Collection loop finished"
        );
        Ok(summary)
    }

    fn refresh_targets(&mut self, full_scan: bool) {
        if full_scan {
            self.since_full_scan = 0;
            let roots = &self.config.scan.roots;
            self.list_targets = self.locator.full_scan(roots, MarkerKind::List);
            self.log_targets = self.locator.full_scan(roots, MarkerKind::Log);
        } else {
            self.list_targets = prune(std::mem::take(&mut self.list_targets));
            self.log_targets = prune(std::mem::take(&mut self.log_targets));
        }
    }

    /// Detects and collects every changed file of one kind.
    ///
    /// `budget` counts read attempts left this cycle; files over it are
    /// deferred without touching the registrar.
    fn collect_kind(&mut self, kind: MarkerKind, counters: &mut KindReport, budget: &mut Option<usize>) {
        let (targets, registrar) = match kind {
            MarkerKind::List => (&self.list_targets, &mut self.list_registrar),
            MarkerKind::Log => (&self.log_targets, &mut self.log_registrar),
        };
        counters.targets = targets.len();

        for target in targets {
            let candidates = match find_new_or_changed(target, kind.extension(), registrar) {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(dir = %target.path, error = %e, "Cannot list marker directory, will retry");
                    counters.list_failures += 1;
                    continue;
                }
            };

            for candidate in candidates {
                if let Some(left) = budget.as_mut() {
                    if *left == 0 {
                        tracing::trace!(path = %candidate.full_path(), "Per-cycle cap reached, deferring");
                        counters.deferred += 1;
                        continue;
                    }
                    *left -= 1;
                }
                match self.collector.collect(candidate, kind, registrar, &mut self.sink) {
                    Ok(_) => counters.collected += 1,
                    Err(_) => counters.read_failures += 1,
                }
            }
        }
    }

    const fn registrar_mut(&mut self, kind: MarkerKind) -> &mut RegistrarStore {
        match kind {
            MarkerKind::List => &mut self.list_registrar,
            MarkerKind::Log => &mut self.log_registrar,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use chrono::{DateTime, TimeZone, Utc};
    use filetime::FileTime;
    use lb_core::OutboundEvent;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::sink::ChannelSink;

    const T1: i64 = 1_709_280_000;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: Utf8PathBuf,
        state: Utf8PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
            let root = base.join("data");
            fs::create_dir_all(&root).unwrap();
            Self {
                _dir: dir,
                root,
                state: base.join("state"),
            }
        }

        fn config(&self) -> Config {
            let mut config = Config::default();
            config.scan.roots = vec![self.root.clone()];
            config.registrar.list_path = self.state.clone();
            config.registrar.log_path = self.state.clone();
            config
        }

        fn write(&self, relative: &str, content: &str, mtime: i64) -> Utf8PathBuf {
            let path = self.root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
            path
        }

        fn scheduler(&self, config: Config) -> (Scheduler<ChannelSink>, UnboundedReceiver<OutboundEvent>) {
            let (sink, rx) = ChannelSink::new();
            (Scheduler::new(config, sink).unwrap(), rx)
        }
    }

    fn drain(rx: &mut UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_two_cycle_scenario() {
        let fx = Fixture::new();
        fx.write("job/list/a.list", "alpha", T1);
        let (mut scheduler, mut rx) = fx.scheduler(fx.config());

        let first = scheduler.run_cycle();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].filename, "a.list");
        assert_eq!(events[0].kind, MarkerKind::List);
        assert_eq!(events[0].modtime, at(T1));
        assert_eq!(events[0].content, b"alpha");
        assert!(first.full_scan);
        assert!(first.list.flushed);
        assert!(!first.log.flushed);

        let saved = RegistrarStore::load(fx.config().registrar.list_file());
        assert_eq!(saved.lookup(&fx.root.join("job/list"), "a.list"), Some(at(T1)));

        let second = scheduler.run_cycle();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(second.collected(), 0);
        assert!(!second.list.flushed);
        assert!(!second.log.flushed);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_unchanged_files_are_never_resent() {
        let fx = Fixture::new();
        fx.write("a/list/one.list", "1", T1);
        fx.write("a/LOG/run.log", "ok", T1);
        let (mut scheduler, mut rx) = fx.scheduler(fx.config());

        scheduler.run_cycle();
        assert_eq!(drain(&mut rx).len(), 2);
        for _ in 0..3 {
            let report = scheduler.run_cycle();
            assert_eq!(report.collected(), 0);
        }
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_newer_mtime_is_collected_again() {
        let fx = Fixture::new();
        let path = fx.write("a/LOG/run.log", "first", T1);
        let (mut scheduler, mut rx) = fx.scheduler(fx.config());

        scheduler.run_cycle();
        assert_eq!(drain(&mut rx).len(), 1);

        fs::write(&path, "second").unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(T1 + 60, 0)).unwrap();

        let report = scheduler.run_cycle();
        let events = drain(&mut rx);
        assert_eq!(report.log.collected, 1);
        assert_eq!(events[0].content, b"second");
        assert_eq!(
            scheduler.registrar(MarkerKind::Log).lookup(&fx.root.join("a/LOG"), "run.log"),
            Some(at(T1 + 60))
        );
    }

    #[test]
    fn test_other_extensions_are_ignored() {
        let fx = Fixture::new();
        fx.write("a/list/x.txt", "no", T1);
        fx.write("a/list/x.log", "wrong marker", T1);
        fx.write("a/LOG/y.list", "wrong marker", T1);
        let (mut scheduler, mut rx) = fx.scheduler(fx.config());

        let report = scheduler.run_cycle();
        assert_eq!(report.collected(), 0);
        assert!(drain(&mut rx).is_empty());
        assert!(scheduler.registrar(MarkerKind::List).is_empty());
    }

    #[test]
    fn test_prune_without_full_rescan() {
        let fx = Fixture::new();
        fx.write("a/list/one.list", "1", T1);
        fx.write("b/list/two.list", "2", T1);
        let mut config = fx.config();
        config.schedule.full_rescan_every = 10;
        let (mut scheduler, _rx) = fx.scheduler(config);

        let first = scheduler.run_cycle();
        assert_eq!(first.list.targets, 2);

        fs::remove_dir_all(fx.root.join("b")).unwrap();
        fx.write("c/list/three.list", "3", T1);

        let second = scheduler.run_cycle();
        assert!(!second.full_scan);
        assert_eq!(second.list.targets, 1);
        assert_eq!(second.collected(), 0);
        assert_eq!(scheduler.targets(MarkerKind::List)[0].path, fx.root.join("a/list"));
    }

    #[test]
    fn test_full_rescan_cadence() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.schedule.full_rescan_every = 2;
        let (mut scheduler, _rx) = fx.scheduler(config);

        let pattern: Vec<bool> = (0..5).map(|_| scheduler.run_cycle().full_scan).collect();
        assert_eq!(pattern, [true, false, true, false, true]);
        assert_eq!(scheduler.cycles(), 5);
    }

    #[test]
    fn test_new_marker_found_on_rescan() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.schedule.full_rescan_every = 2;
        let (mut scheduler, mut rx) = fx.scheduler(config);

        scheduler.run_cycle();
        fx.write("late/LOG/run.log", "x", T1);
        assert_eq!(scheduler.run_cycle().collected(), 0);
        assert_eq!(scheduler.run_cycle().log.collected, 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_cap_defers_to_next_cycle() {
        let fx = Fixture::new();
        fx.write("a/list/one.list", "1", T1);
        fx.write("a/list/two.list", "2", T1);
        fx.write("a/LOG/run.log", "3", T1);
        let mut config = fx.config();
        config.scan.max_files_per_cycle = Some(2);
        let (mut scheduler, mut rx) = fx.scheduler(config);

        let first = scheduler.run_cycle();
        assert_eq!(first.collected(), 2);
        assert_eq!(first.deferred(), 1);
        assert!(scheduler.registrar(MarkerKind::Log).is_empty());

        let second = scheduler.run_cycle();
        assert_eq!(second.log.collected, 1);
        assert_eq!(second.deferred(), 0);
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[test]
    fn test_registrar_survives_restart() {
        let fx = Fixture::new();
        fx.write("a/list/one.list", "1", T1);

        let (mut scheduler, mut rx) = fx.scheduler(fx.config());
        scheduler.run_cycle();
        assert_eq!(drain(&mut rx).len(), 1);
        drop(scheduler.into_sink());

        let (mut restarted, mut rx) = fx.scheduler(fx.config());
        assert_eq!(restarted.run_cycle().collected(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_flush_failure_keeps_state_and_retries() {
        let fx = Fixture::new();
        fx.write("a/list/one.list", "1", T1);
        // A regular file where the registrar directory should be.
        fs::create_dir_all(fx.state.parent().unwrap()).unwrap();
        fs::write(&fx.state, "blocker").unwrap();
        let (mut scheduler, mut rx) = fx.scheduler(fx.config());

        let first = scheduler.run_cycle();
        assert_eq!(first.list.collected, 1);
        assert!(first.list.flush_failed);
        assert!(scheduler.registrar(MarkerKind::List).is_dirty());

        fs::remove_file(&fx.state).unwrap();
        let second = scheduler.run_cycle();
        assert_eq!(second.collected(), 0);
        assert!(second.list.flushed);
        assert!(!scheduler.registrar(MarkerKind::List).is_dirty());
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_new_rejects_invalid_schedule() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.schedule.period_secs = 0;

        let (sink, _rx) = ChannelSink::new();
        let err = Scheduler::new(config, sink).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_shutdown_closes_sink_once() {
        let fx = Fixture::new();
        let (mut scheduler, mut rx) = fx.scheduler(fx.config());

        scheduler.shutdown();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(!scheduler.sink().is_open());
        scheduler.shutdown();

        let report = scheduler.run_cycle();
        assert_eq!(report.cycle, 0);
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_run_collects_until_cancelled() {
        let fx = Fixture::new();
        fx.write("job/list/a.list", "alpha", T1);
        let mut config = fx.config();
        config.schedule.collect_on_start = true;
        config.schedule.period_secs = 3600;
        let (scheduler, mut rx) = fx.scheduler(config);

        let stop = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(stop.clone()));

        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.filename, "a.list");

        stop.cancel();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.collected, 1);
        assert_eq!(summary.full_scans, 1);

        // Channel closes once the sink is closed.
        assert!(rx.recv().await.is_none());
        assert!(fx.config().registrar.list_file().exists());
    }

    #[tokio::test]
    async fn test_run_stops_before_first_tick() {
        let fx = Fixture::new();
        fx.write("job/list/a.list", "alpha", T1);
        let (scheduler, mut rx) = fx.scheduler(fx.config());

        let stop = CancellationToken::new();
        stop.cancel();
        let summary = scheduler.run(stop).await.unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(rx.recv().await.is_none());
        assert!(!fx.config().registrar.list_file().exists());
    }
}
