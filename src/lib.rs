//! Tapedeck - HTTP interaction record and replay for tests
//!
//! Real HTTP exchanges are recorded into cassette files on first run and
//! served back on later runs, so tests stay deterministic and offline.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod hooks;
pub mod ignore;
pub mod interaction;
pub mod matcher;
pub mod network;
pub mod replay;
pub mod serializer;
pub mod transport;
pub mod vcr;

pub use cassette::{Cassette, CassetteOptions, RecordMode};
pub use config::Config;
pub use error::{Result, VcrError};
pub use interaction::{Interaction, Method, Request, Response};
pub use transport::{LiveExecutor, Outcome, Transport};
pub use vcr::{Vcr, VcrBuilder};
