//! Scenelink wire protocol.
//!
//! Everything that crosses the thread boundary between the simulation worker
//! and the scene coordinator: the command envelope, the out-of-band worker
//! events, and the flat binary report buffers produced after each step.
//!
//! Commands flow coordinator -> worker and are processed in send order.
//! Reports and acknowledgements flow worker -> coordinator. Report buffers
//! are owned by exactly one side at a time; the coordinator hands each buffer
//! back after decoding so the worker can reuse it without reallocating.

pub mod codec;
pub mod command;
pub mod report;

pub use codec::{decode_command, decode_event, encode_command, encode_event, CodecError};
pub use command::{Command, CommandError, MotorCommand, WorkerEvent};
pub use report::{
    FixedRecords, ReportBuffer, ReportError, ReportKind, SoftRecord, SoftRecords,
    CHUNK_RECORDS, HEADER_SIZE,
};
