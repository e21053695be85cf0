//! Collection loop for listbeat.
//!
//! This crate ties the scanner pieces into a running agent:
//!
//! - [`Scheduler`]: ticks on a fixed period, refreshes the marker cache,
//!   collects changed files and flushes the registrars
//! - [`Collector`]: reads one file, records it, publishes its event
//! - [`Sink`]: where events go ([`JsonLinesSink`], [`ChannelSink`])
//! - [`CycleReport`] / [`RunSummary`]: what each cycle and the whole run did
//!
//! # Example
//!
//! ```no_run
//! use lb_agent::{Scheduler, open_sink};
//! use lb_core::Config;
//!
//! # fn example() -> Result<(), lb_agent::AgentError> {
//! let config = Config::from_json(r#"{"scan": {"roots": ["/data"]}}"#)?;
//! let sink = open_sink(&config.output)?;
//! let mut scheduler = Scheduler::new(config, sink)?;
//!
//! let report = scheduler.run_cycle();
//! println!("Collected {} files", report.collected());
//! scheduler.shutdown();
//! # Ok(())
//! # }
//! ```

mod collector;
mod error;
mod report;
mod scheduler;
mod sink;

pub use collector::Collector;
pub use error::AgentError;
pub use report::{CycleReport, KindReport, RunSummary};
pub use scheduler::{Scheduler, SchedulerState};
pub use sink::{ChannelSink, JsonLinesSink, Sink, open_sink};
