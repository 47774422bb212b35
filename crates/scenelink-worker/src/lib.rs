//! Scenelink simulation worker.
//!
//! The simulation side of the bridge: the [`PhysicsEngine`] trait the world
//! drives, a small built-in rigid-body engine for tests and headless use, the
//! [`SimulationWorld`] that dispatches commands and encodes per-step reports,
//! and the [`Worker`] thread service that runs a world over channels.

pub mod basic;
pub mod engine;
pub mod service;
pub mod world;

pub use basic::BasicEngine;
pub use engine::{
    BodyState, ConstraintState, ContactManifold, PhysicsEngine, ShapeCache, WheelState,
};
pub use service::Worker;
pub use world::SimulationWorld;
