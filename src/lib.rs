//! # widget-deck
//!
//! A terminal dashboard whose panels are produced by small shell scripts.
//!
//! Each widget is an executable that prints a line-oriented text protocol
//! (`title:`, `row:`, `action:`, `datastore:` ...). The dashboard validates the
//! script, runs it under a timeout with a minimal environment, parses its
//! output into a [`WidgetDocument`] and renders that document.
//!
//! ## Pipeline
//!
//! - [`validator`]: path containment, symlink and permission checks, and
//!   SHA-256 fingerprint pinning.
//! - [`exec`]: process launch, streaming capture, timeout and cancellation
//!   with SIGTERM, a grace period, then SIGKILL of the process group.
//! - [`protocol`]: lenient parsing of script output into rows, inline
//!   elements, tables, actions and storage directives.
//! - [`storage`]: SQLite time-series samples behind [`TimeSeriesRepository`].
//! - [`refresh`]: per-widget refresh loops and action execution.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use widget_deck::{Parser, WidgetRunner};
//!
//! # async fn example() -> Result<(), widget_deck::Error> {
//! let config = Parser::new().load_config("widget-deck.yaml")?;
//! let runner = WidgetRunner::new(Arc::new(config), None);
//!
//! let document = runner.refresh("cpu", &CancellationToken::new()).await;
//! println!("{:?}", document.title);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod protocol;
pub mod refresh;
pub mod storage;
pub mod tui;
pub mod validator;

pub use config::{Config, Parser};
pub use error::{Error, Result};
pub use exec::{Engine, ExecutionOutcome, TerminationCause};
pub use protocol::{ProtocolParser, WidgetDocument};
pub use refresh::{ActionRunner, Scheduler, WidgetRunner};
pub use storage::{SqliteRepository, TimeSeriesRepository};
pub use validator::{ValidationVerdict, Validator};
