//! Byte codec for protocol envelopes.
//!
//! In-process transports move [`Command`] and [`WorkerEvent`] values over
//! channels directly; transports that need bytes (a socket, a wasm message
//! port) go through these functions.

use thiserror::Error;

use crate::command::{Command, WorkerEvent};

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Encode a command to bytes.
pub fn encode_command(command: &Command) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serde::encode_to_vec(
        command,
        bincode::config::standard(),
    )?)
}

/// Decode a command from bytes.
pub fn decode_command(data: &[u8]) -> Result<Command, CodecError> {
    let (command, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
    Ok(command)
}

/// Encode a worker event to bytes.
pub fn encode_event(event: &WorkerEvent) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serde::encode_to_vec(
        event,
        bincode::config::standard(),
    )?)
}

/// Decode a worker event from bytes.
pub fn decode_event(data: &[u8]) -> Result<WorkerEvent, CodecError> {
    let (event, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportBuffer, ReportKind};
    use glam::Vec3;
    use scenelink_core::Handle;

    #[test]
    fn roundtrip_update_transform() {
        let cmd = Command::UpdateTransform {
            handle: Handle(12),
            position: Some(Vec3::new(1.0, 2.0, 3.0)),
            rotation: None,
        };

        let encoded = encode_command(&cmd).unwrap();
        let decoded = decode_command(&encoded).unwrap();
        assert_eq!(cmd, decoded);
    }

    #[test]
    fn roundtrip_report_event() {
        let mut buf = ReportBuffer::new(ReportKind::Collision);
        buf.begin_fixed(1);
        buf.write_record(0, &[1.0, 2.0, 0.0, 1.0, 0.0]);
        let event = WorkerEvent::Report(buf);

        let encoded = encode_event(&event).unwrap();
        let decoded = decode_event(&encoded).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn compact_encoding() {
        let cmd = Command::Simulate {
            time_step: 1.0 / 60.0,
            max_sub_steps: 4,
        };
        let encoded = encode_command(&cmd).unwrap();
        assert!(encoded.len() < 16, "encoded size was {}", encoded.len());
    }
}
