//! # rf-cascade - FluxForge Cascade Presentation
//!
//! Spin step model and the cascade (tumble) state machine that replays
//! server-reported steps against a reel view.
//!
//! ## Pipeline per CASCADE step
//!
//! ```text
//! REMOVAL ──▶ DROP ──▶ REFILL ──▶ COMMIT
//!  dedup       server     spare       resync to
//!  fade out    moves or   instances   server grid,
//!  then clear  gravity    drop in     emit facts
//! ```
//!
//! Each phase is a barrier: every tween of a phase settles before the next
//! phase starts. The [`SymbolMap`] arena is owned by the running
//! [`StepSequencePresenter::execute`] call and holds instance indices only.

pub mod geometry;
pub mod grid;
pub mod headless;
pub mod ingest;
pub mod matrix;
pub mod presenter;
pub mod step;
pub mod symbol_map;
pub mod timing;
pub mod view;

pub use geometry::*;
pub use grid::*;
pub use headless::*;
pub use ingest::*;
pub use matrix::*;
pub use presenter::*;
pub use step::*;
pub use symbol_map::*;
pub use timing::*;
pub use view::*;
