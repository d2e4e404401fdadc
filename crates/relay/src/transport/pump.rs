//! Transport bridge - moves frames between a connection and the session's channel pair.
//!
//! Two loops run as sibling futures in one task:
//! - **read**: connection → inbound channel, until end-of-stream or read error
//! - **write**: outbound channel → connection, until stop, channel close or write error
//!
//! The first loop to finish decides the result; the other is dropped before
//! `pump` returns, so no task outlives the call.

use std::pin::pin;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::bridge::codec::frame_codec;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection read failed: {0}")]
    Read(#[source] BoxError),
    #[error("connection write failed: {0}")]
    Write(#[source] BoxError),
}

/// Pump frames until the connection ends, the stop signal fires, or I/O fails.
///
/// Clean end-of-stream and stop both return `Ok(())`.
pub async fn pump<R, W, E>(
    reader: R,
    writer: W,
    inbound: mpsc::Sender<Bytes>,
    outbound: mpsc::Receiver<Bytes>,
    stop: CancellationToken,
) -> Result<(), TransportError>
where
    R: Stream<Item = Result<Bytes, E>>,
    W: Sink<Bytes, Error = E>,
    E: Into<BoxError>,
{
    let result = tokio::select! {
        result = read_loop(reader, inbound) => result,
        result = write_loop(writer, outbound, stop) => result,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Transport failed");
    }
    result
}

async fn read_loop<R, E>(reader: R, inbound: mpsc::Sender<Bytes>) -> Result<(), TransportError>
where
    R: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let mut reader = pin!(reader);
    while let Some(frame) = reader.next().await {
        let frame = frame.map_err(|e| TransportError::Read(e.into()))?;
        tracing::trace!(frame_size_bytes = frame.len(), "Frame received");
        if inbound.send(frame).await.is_err() {
            tracing::debug!("Inbound receiver dropped, stopping reader");
            return Ok(());
        }
    }
    tracing::debug!("Connection reached end of stream");
    Ok(())
}

async fn write_loop<W, E>(
    writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    stop: CancellationToken,
) -> Result<(), TransportError>
where
    W: Sink<Bytes, Error = E>,
    E: Into<BoxError>,
{
    let mut writer = pin!(writer);
    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => {
                tracing::debug!("Stop signal received, closing connection");
                if let Err(e) = writer.close().await {
                    let e: BoxError = e.into();
                    tracing::debug!(error = %e, "Error closing connection");
                }
                return Ok(());
            }

            msg = outbound.recv() => {
                let Some(frame) = msg else {
                    tracing::debug!("Outbound channel closed, stopping writer");
                    return Ok(());
                };
                let frame_size_bytes = frame.len();
                writer
                    .send(frame)
                    .await
                    .map_err(|e| TransportError::Write(e.into()))?;
                tracing::trace!(frame_size_bytes, "Frame sent");
            }
        }
    }
}

/// Split a byte stream into a length-delimited frame reader/writer pair for [`pump`].
pub fn framed<T>(
    io: T,
) -> (
    impl Stream<Item = std::io::Result<Bytes>>,
    impl Sink<Bytes, Error = std::io::Error>,
)
where
    T: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(io);
    let reader =
        FramedRead::new(read_half, frame_codec()).map(|frame| frame.map(BytesMut::freeze));
    let writer = FramedWrite::new(write_half, frame_codec());
    (reader, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_err(msg: &str) -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionReset, msg.to_string())
    }

    #[tokio::test]
    async fn forwards_both_directions_until_end_of_stream() {
        let (local, remote) = tokio::io::duplex(1024);
        let (reader, writer) = framed(local);
        let (mut remote_reader, mut remote_writer) = framed(remote);

        let (in_tx, mut in_rx) = mpsc::channel(4);
        let (out_tx, out_rx) = mpsc::channel(4);
        let stop = CancellationToken::new();

        let pumping = tokio::spawn(pump(reader, writer, in_tx, out_rx, stop));

        out_tx.send(Bytes::from_static(b"to-peer")).await.unwrap();
        let got = remote_reader.next().await.unwrap().unwrap();
        assert_eq!(&got[..], b"to-peer");

        remote_writer
            .send(Bytes::from_static(b"from-peer"))
            .await
            .unwrap();
        assert_eq!(&in_rx.recv().await.unwrap()[..], b"from-peer");

        // Peer hangs up: clean completion.
        drop(remote_writer);
        drop(remote_reader);
        assert!(pumping.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn stop_signal_ends_pump_cleanly() {
        let (local, _remote) = tokio::io::duplex(1024);
        let (reader, writer) = framed(local);
        let (in_tx, _in_rx) = mpsc::channel(4);
        let (_out_tx, out_rx) = mpsc::channel(4);
        let stop = CancellationToken::new();

        let pumping = tokio::spawn(pump(reader, writer, in_tx, out_rx, stop.clone()));
        stop.cancel();
        assert!(pumping.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let reader = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"first")),
            Err(io_err("reset by peer")),
        ]);
        let writer = futures::sink::drain().sink_map_err(|never| match never {});
        let (in_tx, mut in_rx) = mpsc::channel(4);
        let (_out_tx, out_rx) = mpsc::channel(4);

        let result = pump(reader, writer, in_tx, out_rx, CancellationToken::new()).await;

        assert!(matches!(result, Err(TransportError::Read(_))));
        assert_eq!(&in_rx.recv().await.unwrap()[..], b"first");
    }

    #[tokio::test]
    async fn write_error_is_reported() {
        let reader = futures::stream::pending::<io::Result<Bytes>>();
        let writer = futures::sink::unfold((), |(), _frame: Bytes| async move {
            Err::<(), _>(io_err("broken pipe"))
        });
        let (in_tx, _in_rx) = mpsc::channel(4);
        let (out_tx, out_rx) = mpsc::channel(4);
        out_tx.send(Bytes::from_static(b"payload")).await.unwrap();

        let result = pump(reader, writer, in_tx, out_rx, CancellationToken::new()).await;

        match result {
            Err(TransportError::Write(e)) => assert!(e.to_string().contains("broken pipe")),
            other => panic!("expected write error, got {other:?}"),
        }
    }
}
