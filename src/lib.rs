//! # run-recorder: Demonstration Experiment Run Recorder
//!
//! Records a single experiment run to an MLflow tracking server or a local
//! run store: one param (`alpha`), one metric (`auroch` = 0.123), two tags
//! (`run_origin`, `log_artifact`) and optionally an `info.txt` artifact.
//!
//! ## Design Principles
//!
//! - **One seam**: every backend call goes through [`tracking::TrackingClient`]
//! - **Scoped runs**: [`run::ActiveRun`] ends the run on success and failure
//! - **No recovery**: the first error ends the run `FAILED` and propagates
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use run_recorder::recorder::{record_run, RunArgs, RunMetadata};
//! use run_recorder::tracking::FileStore;
//!
//! # async fn example() -> run_recorder::Result<()> {
//! let store = FileStore::new("run-records")?;
//! let args = RunArgs::new("0.1", "notebook", true);
//! let workdir = std::env::current_dir()?;
//! let summary = record_run(
//!     &store,
//!     "0",
//!     &args,
//!     &RunMetadata::from_env(),
//!     &workdir,
//!     &mut std::io::stdout(),
//! )
//! .await?;
//! println!("recorded {}", summary.run_id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cli;
pub mod config;
pub mod error;
pub mod experiment;
pub mod recorder;
pub mod run;
pub mod tracking;

pub use error::{Error, Result};
