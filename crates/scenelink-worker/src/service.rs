//! The worker thread service.
//!
//! [`Worker::spawn`] moves an engine onto a dedicated thread running a
//! [`SimulationWorld`] over a pair of channels. Commands are processed
//! strictly in send order; command failures are logged and the loop keeps
//! running, so one bad command never takes the simulation down.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use scenelink_protocol::{Command, CommandError, WorkerEvent};

use crate::engine::PhysicsEngine;
use crate::world::SimulationWorld;

/// Handle to a running simulation thread.
///
/// Dropping the handle closes the command channel, which ends the worker
/// loop; the drop blocks until the thread has exited.
pub struct Worker {
    commands: Option<Sender<Command>>,
    events: Receiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start a worker thread around `engine`.
    ///
    /// The worker announces `EngineLoaded` and `Ready` before processing its
    /// first command.
    pub fn spawn<E: PhysicsEngine + 'static>(engine: E, fixed_time_step: f32) -> Worker {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("scenelink-worker".into())
            .spawn(move || run(engine, fixed_time_step, command_rx, event_tx))
            .ok();
        Worker {
            commands: Some(command_tx),
            events: event_rx,
            thread,
        }
    }

    pub fn send(&self, command: Command) -> Result<(), CommandError> {
        let sender = self.commands.as_ref().ok_or(CommandError::Disconnected)?;
        sender.send(command).map_err(|_| CommandError::Disconnected)
    }

    /// Blocking receive of the next worker event.
    pub fn recv(&self) -> Result<WorkerEvent, CommandError> {
        self.events.recv().map_err(|_| CommandError::Disconnected)
    }

    /// Non-blocking receive; `Ok(None)` when no event is pending.
    pub fn try_recv(&self) -> Result<Option<WorkerEvent>, CommandError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CommandError::Disconnected),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // closing the command channel ends the loop
        self.commands.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(
    engine: impl PhysicsEngine,
    fixed_time_step: f32,
    commands: Receiver<Command>,
    events: Sender<WorkerEvent>,
) {
    let mut world = SimulationWorld::new(engine, fixed_time_step);
    let mut out = Vec::new();

    if events.send(WorkerEvent::EngineLoaded).is_err() {
        return;
    }
    if events.send(WorkerEvent::Ready).is_err() {
        return;
    }
    tracing::debug!(fixed_time_step, "simulation worker up");

    while let Ok(command) = commands.recv() {
        if let Err(error) = world.apply(command, &mut out) {
            tracing::warn!(%error, "command failed");
        }
        for event in out.drain(..) {
            if events.send(event).is_err() {
                return;
            }
        }
    }
}
