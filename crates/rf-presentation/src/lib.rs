//! # rf-presentation - FluxForge Result Presentation
//!
//! Orchestrates one presentation flow per server spin result: runs the
//! cascade presenter, resolves the win tier, gates win presentation behind
//! the configured trigger policy and publishes milestone facts.
//!
//! ## Architecture
//!
//! ```text
//!  SpinPayload ──▶ ResultPresentationController
//!                    │  FlowContext (flow id, guards, WinGate, token)
//!                    │
//!                    ├─▶ TimelineRunner (six phases, rf-timeline)
//!                    │      └─▶ StepSequencePresenter (rf-cascade)
//!                    │
//!                    └─▶ FactBus ──▶ observers (FactLog, HUD, audio…)
//! ```
//!
//! Facts are outputs only; nothing in the flow waits on a fact it emitted.

pub mod config;
pub mod controller;
pub mod error;
pub mod facts;
pub mod flow;
pub mod tier;
pub mod trigger;

pub use config::*;
pub use controller::*;
pub use error::*;
pub use facts::*;
pub use flow::*;
pub use tier::*;
pub use trigger::*;
