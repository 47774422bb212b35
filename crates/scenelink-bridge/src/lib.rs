//! Scenelink scene-side bridge.
//!
//! The coordinator half of the system: scene nodes with the dirty-transform
//! ownership protocol, the [`FrameSync`] loop that drives the worker one step
//! at a time, touch (contact episode) tracking, and the one-shot readiness
//! latch.

pub mod ready;
pub mod scene;
pub mod sync;
pub mod touch;

pub use ready::ReadyLatch;
pub use scene::{SceneNode, TrackedObject};
pub use sync::{ConstraintFeedback, FrameSync};
pub use touch::{TouchEvent, TouchTracker};
