//! One query, one stream: read to end, answer once, signal completion.

use super::error_code_varint;
use doqd_domain::protocol::MAX_STREAM_MESSAGE_SIZE;
use doqd_domain::{DomainError, DoqErrorCode};
use quinn::{ReadError, ReadToEndError, RecvStream, SendStream, WriteError};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Reads until the peer finishes its send side. Anything above 65535 bytes
/// cannot be a DNS message.
pub async fn read_message(recv: &mut RecvStream) -> Result<Vec<u8>, DomainError> {
    recv.read_to_end(MAX_STREAM_MESSAGE_SIZE)
        .await
        .map_err(map_read_to_end_error)
}

/// Writes the whole message. A writer that stops accepting bytes before the
/// end is a `ShortWrite`, never a silently truncated answer.
pub async fn write_message<W>(send: &mut W, message: &[u8]) -> Result<(), DomainError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while written < message.len() {
        match send.write(&message[written..]).await {
            Ok(0) => {
                return Err(DomainError::ShortWrite {
                    expected: message.len(),
                    written,
                })
            }
            Ok(n) => written += n,
            Err(e) => return Err(DomainError::StreamWrite(e.to_string())),
        }
    }
    Ok(())
}

/// Signals end-of-write with No-Error.
pub fn finish(send: &mut SendStream) -> Result<(), DomainError> {
    send.finish()
        .map_err(|e| DomainError::StreamWrite(e.to_string()))
}

/// Resets the send side and stops the receive side with `code`.
pub fn abort(send: &mut SendStream, recv: &mut RecvStream, code: DoqErrorCode) {
    let code = error_code_varint(code);
    let _ = send.reset(code);
    let _ = recv.stop(code);
}

pub fn map_read_to_end_error(error: ReadToEndError) -> DomainError {
    match error {
        ReadToEndError::TooLong => DomainError::StreamRead(format!(
            "message exceeds {} bytes",
            MAX_STREAM_MESSAGE_SIZE
        )),
        ReadToEndError::Read(e) => map_read_error(e),
    }
}

pub fn map_read_error(error: ReadError) -> DomainError {
    match error {
        ReadError::Reset(code) => DomainError::StreamReset {
            code: DoqErrorCode::from_u64(code.into_inner()),
        },
        ReadError::ConnectionLost(e) => DomainError::ConnectionLost(e.to_string()),
        other => DomainError::StreamRead(other.to_string()),
    }
}

pub fn map_write_error(error: WriteError) -> DomainError {
    match error {
        WriteError::Stopped(code) => DomainError::StreamReset {
            code: DoqErrorCode::from_u64(code.into_inner()),
        },
        WriteError::ConnectionLost(e) => DomainError::ConnectionLost(e.to_string()),
        other => DomainError::StreamWrite(other.to_string()),
    }
}
