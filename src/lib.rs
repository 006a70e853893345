//! Rate-limited client for the CRPT "introduce goods into circulation" API.
//!
//! The crate has three layers:
//! 1. [`model`]: typed request envelope, document and product line items,
//!    checked when built and serialized in the field order the API documents.
//! 2. [`gateway`]: a stateless sender that posts one JSON body and classifies
//!    the answer. It is generic over any `tower::Service` transport and uses
//!    [`ReqwestService`](gateway::reqwest_integration::ReqwestService) by default.
//! 3. [`CrptApi`]: the submission front. It admits at most `request_limit`
//!    dispatches per sliding `window`, queues callers over quota in arrival
//!    order, and runs admitted exchanges on a bounded tokio worker pool.
//!
//! # Algorithm Overview
//!
//! Admission keeps the timestamps of dispatches still inside the window. A
//! caller takes the head of a fair queue, drops expired timestamps, and either
//! records `now` and proceeds or sleeps until the oldest timestamp leaves the
//! window. Unlike a fixed window, this never lets `2 * request_limit`
//! requests through around a window boundary.
//!
//! # Basic Usage
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use chrono::NaiveDate;
//! use crpt_api::{
//!     CrptApi,
//!     model::{Description, Document, DocumentStatus, DocumentType, Product},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let api = CrptApi::new(Duration::from_secs(1), 10)?;
//!
//! let document = Document::builder()
//!     .description(Description::new("7707083893")?)
//!     .doc_status(DocumentStatus::New)
//!     .doc_type(DocumentType::LpIntroduceGoods)
//!     .owner_inn("7707083893")
//!     .participant_inn("7707083893")
//!     .producer_inn("7707083893")
//!     .products(vec![
//!         Product::builder()
//!             .owner_inn("7707083893")
//!             .producer_inn("7707083893")
//!             .production_date(NaiveDate::from_ymd_opt(2020, 1, 23).unwrap())
//!             .build()?,
//!     ])
//!     .reg_date("2020-01-23")
//!     .reg_number("REG-1")
//!     .build()?;
//!
//! let created: serde_json::Value = api.submit(document, "<detached signature>").await?;
//! println!("{created}");
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//! Events go through `tracing` under the `crpt_api::submitter` and
//! `crpt_api::gateway` targets; install any subscriber to collect them.
//! Request bodies are never logged. Counters and histograms are recorded via
//! the `metrics` facade and are no-ops until a recorder is installed.

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod submitter;

#[macro_use]
extern crate tracing;

pub use config::{CrptApiConfig, HttpVersion, WorkerPoolConfig};
pub use error::CrptApiError;
pub use submitter::{CrptApi, ShutdownOutcome, SubmissionState, SubmitOptions};

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
