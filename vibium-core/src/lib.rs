//! `vibium-core` — a WebDriver-BiDi protocol broker with a Playwright-style
//! extension command surface (spec §1 "Overview"):
//!
//! ```text
//! client <-> ClientTransport  \                         / BidiChannel <-> browser
//!             (C1)             \  Broker / Router (C4)  /    (C2)
//! client <-> ClientTransport   -+- Session (C3) --------+
//!             (C1)             /   Correlator            \
//!                             /    Actionability (C5)     \
//!                                  Extension commands (C6)
//!                                  Trace recorder (C7)
//!                                  Ref table (C8)
//! ```
//!
//! Every client transport is multiplexed onto a single shared BiDi channel
//! to the browser; the broker correlates internal extension-command
//! replies against client-issued BiDi traffic by id range (spec §3
//! "Correlation"). A direct-call adapter (C10, [`direct`]) exposes the
//! same extension commands as plain async function calls for embedders
//! that don't want a second network hop.

pub mod actionability;
pub mod bidi;
pub mod broker;
pub mod clock;
pub mod commands;
pub mod config;
pub mod correlator;
pub mod direct;
pub mod error;
pub mod jswrap;
pub mod locator;
pub mod reftable;
pub mod session;
pub mod state;
pub mod trace;
pub mod transport;

pub use error::{Result, VibiumError};
