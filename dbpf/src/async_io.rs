//! Suspension-point variants of the I/O-bound operations, built on
//! `tokio`. Cancellation is cooperative: callers pass a flag checked
//! at each boundary named below, and a cancelled operation leaves
//! whatever it was reading or writing untouched.
//!
//! Chunk-level access after `open_async` is synchronous: the whole
//! stream is read in one asynchronous pass (the single I/O boundary
//! this layer owns) and handed to the synchronous [`Package::open`]
//! as an in-memory cursor, which already gives lazy, byte-exact
//! read-back for free.

use crate::compressor;
use crate::package::Package;
use dbpf_common::error::DbpfError;
use dbpf_common::Result;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

fn check_cancelled(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        Err(DbpfError::Cancelled)
    } else {
        Ok(())
    }
}

/// Read `reader` to completion, then parse it exactly as
/// [`Package::open`] would. `cancel` is checked before the read starts
/// and again before parsing, so a cancelled call never touches the
/// package's in-memory state.
pub async fn open_async<R>(mut reader: R, read_only: bool, cancel: &AtomicBool) -> Result<Package>
where
    R: AsyncRead + Unpin,
{
    check_cancelled(cancel)?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    check_cancelled(cancel)?;
    Package::open(Cursor::new(bytes), read_only)
}

/// Serialize `package` synchronously into memory, then write the
/// result to `writer` asynchronously. `cancel` is checked before the
/// in-memory save and again before the write, so a cancelled call
/// never reaches the output stream.
pub async fn save_async<W>(package: &mut Package, writer: &mut W, cancel: &AtomicBool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    check_cancelled(cancel)?;
    let mut buf = Vec::new();
    package.save(&mut buf)?;
    check_cancelled(cancel)?;
    writer.write_all(&buf).await?;
    Ok(())
}

/// Async-suspending wrapper over [`compressor::decompress`]. The
/// decompression itself is CPU-bound and synchronous; this yields
/// once to the executor so a long decompress doesn't monopolize a
/// cooperative runtime, and checks `cancel` on either side of it.
pub async fn decode_async(
    data: &[u8],
    compression_flag: u16,
    memory_size: usize,
    cancel: &AtomicBool,
) -> Result<Vec<u8>> {
    check_cancelled(cancel)?;
    tokio::task::yield_now().await;
    let result = compressor::decompress(data, compression_flag, memory_size)?;
    check_cancelled(cancel)?;
    Ok(result)
}

/// Async-suspending wrapper over [`compressor::compress`]. See
/// [`decode_async`].
pub async fn encode_async(data: &[u8], cancel: &AtomicBool) -> Result<Vec<u8>> {
    check_cancelled(cancel)?;
    tokio::task::yield_now().await;
    let result = compressor::compress(data);
    check_cancelled(cancel)?;
    Ok(result)
}
