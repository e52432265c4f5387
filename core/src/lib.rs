//! SBAS user position and integrity performance engine
//!
//! This crate post-processes simulated GNSS/SBAS line-of-sight (LOS) logs over a grid of ground users. For every
//! user and every epoch it forms the weighted least-squares position error from the logged ranging errors, derives
//! the precision approach protection levels and safety indices, and writes one POS row. Over the whole day each
//! user's rows are folded into availability and accuracy statistics written as one PERF row per user.
//!
//! The crate is built on:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): geometry matrices, inversion and the SVD pseudo-inverse.
//! - [`serde`](https://crates.io/crates/serde) with `serde_json`, `serde_yaml` and `toml`: configuration files.
//! - [`csv`](https://crates.io/crates/csv): tabular export of the performance records.
//! - [`log`](https://crates.io/crates/log): diagnostics; the binary decides where they go.
//!
//! The protection level equations follow RTCA DO-229 (MOPS) Appendix J.
//!
//! ## Crate overview
//!
//! - [los]: LOS record parsing and the streaming epoch reader.
//! - [selection]: elevation mask and PA usability filtering.
//! - [geometry]: geometry matrix, weights and range errors.
//! - [linalg]: linear algebra helpers (symmetrization, pseudo-inverse).
//! - [solver]: DOPs and the weighted least-squares position error.
//! - [integrity]: protection levels and safety indices.
//! - [position]: the per user-epoch record and the POS file format.
//! - [performance]: per-user aggregation and the PERF file format.
//! - [stats]: RMS and percentile estimators.
//! - [engine]: the processing loop tying everything together.
//! - [config]: run configuration and its persistence.
//!
//! ## Position domain
//!
//! All solutions are expressed in the local East-North-Up frame of the user with a receiver clock term:
//!
//! $$
//! x = [e, n, u, c\,\delta t]
//! $$
//!
//! Since the LOS log already carries the error of each ranging measurement, the solution of the linearized system
//! is the position *error* itself; no absolute position is ever estimated.
//!
//! ## Example
//!
//! ```no_run
//! use usrperf::{UsrConfig, process_file};
//!
//! let config = UsrConfig::default();
//! let (perf, _) = process_file("LOS_INFO_demo.dat", "POS_INFO_demo.dat", "PERF_APVI_demo.dat", &config)
//!     .expect("processing failed");
//! for user in &perf {
//!     println!("user {}: {:.2} % available", user.user_id, user.availability);
//! }
//! ```
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod integrity;
pub mod linalg;
pub mod los;
pub mod performance;
pub mod position;
pub mod selection;
pub mod solver;
pub mod stats;

pub use config::{ErrorBudget, PercentileMethod, UsrConfig};
pub use engine::{RunSummary, UsrEngine, compute_user_epoch, process_file};
pub use error::{Result, UsrError};
pub use los::{EpochReader, LosRecord};
pub use performance::{UsrPerfRecord, UsrPerformance, write_perf_csv};
pub use position::{PosWriter, UsrPosRecord};
