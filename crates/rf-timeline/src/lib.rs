//! # rf-timeline - FluxForge Presentation Timeline
//!
//! Cooperative scheduler used to sequence spin-result presentation.
//!
//! ## Building blocks
//!
//! - [`CancellationToken`]: idempotent, callback-carrying cancellation handle
//! - [`TimelineAction`]: unit of work with a *declared* duration
//!   (Delay, Parallel, Loop, Conditional, Callback, Sequence)
//! - [`SequenceBuilder`]: fluent assembly of ordered action lists
//! - [`TimelineRunner`]: drives one action list with pause/resume/stop,
//!   looping and deterministic progress
//!
//! ## Architecture
//!
//! ```text
//! SequenceBuilder ──build()──▶ Vec<Arc<dyn TimelineAction>>
//!                                     │
//!                                     v
//!                              TimelineRunner::start()
//!                                     │  (one CancellationToken per run)
//!                                     v
//!                 action.execute(&token).await  →  on_update(progress)
//! ```
//!
//! Durations are never measured from the wall clock: progress only advances
//! by the declared duration of each completed action.

pub mod action;
pub mod builder;
pub mod cancel;
pub mod error;
pub mod runner;

pub use action::*;
pub use builder::*;
pub use cancel::*;
pub use error::*;
pub use runner::*;
