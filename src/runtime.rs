//! Threads, cancellation and output blocks
//!
//! The render loop and the sequencer loop each run on their own thread until
//! their [`StopToken`] is cancelled. The render loop only ever *polls* the
//! token (one atomic load per block); the sequencer *waits* on it, so a
//! cancel wakes it from a long step sleep immediately.

use crate::engine::SynthRenderer;
use crate::error::{Error, Result};
use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

/// Frames rendered per sink write
pub const BLOCK_FRAMES: usize = 128;

#[derive(Debug, Default)]
struct StopInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Cooperative cancellation shared by the worker loops
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every loop holding this token to finish
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `timeout` or until cancelled. Returns `true` if cancelled.
    ///
    /// Never call this from the render thread.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.lock.lock();
        if self.is_cancelled() {
            return true;
        }
        self.inner.wake.wait_while_for(
            &mut guard,
            |_| !self.inner.cancelled.load(Ordering::Acquire),
            timeout,
        );
        self.is_cancelled()
    }
}

/// Destination for rendered audio (device stream, file writer, test buffer)
///
/// `write` may block; that is what paces the render loop to real time.
pub trait AudioSink: Send {
    fn write(&mut self, block: &[f32]) -> Result<()>;
}

impl<F> AudioSink for F
where
    F: FnMut(&[f32]) -> Result<()> + Send,
{
    fn write(&mut self, block: &[f32]) -> Result<()> {
        self(block)
    }
}

/// Render blocks into `sink` until `token` is cancelled or the sink fails
pub fn run_render_loop<S: AudioSink>(
    renderer: &mut SynthRenderer,
    sink: &mut S,
    token: &StopToken,
) -> Result<()> {
    let mut block = [0.0_f32; BLOCK_FRAMES];
    debug!("render loop started");

    while !token.is_cancelled() {
        renderer.render_block(&mut block);
        if let Err(err) = sink.write(&block) {
            error!(%err, "audio sink failed, stopping render loop");
            return Err(err);
        }
    }

    debug!("render loop stopped");
    Ok(())
}

/// Move the renderer onto a dedicated thread running [`run_render_loop`]
pub fn spawn_render_loop<S>(
    mut renderer: SynthRenderer,
    mut sink: S,
    token: StopToken,
) -> Result<JoinHandle<Result<()>>>
where
    S: AudioSink + 'static,
{
    thread::Builder::new()
        .name("monosynth-render".into())
        .spawn(move || run_render_loop(&mut renderer, &mut sink, &token))
        .map_err(|source| Error::Spawn {
            name: "render",
            source,
        })
}

/// Convert a sample to signed 16-bit PCM (`sample × i16::MAX`)
#[inline]
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Pack samples as 16-bit little-endian mono PCM into `out`.
///
/// Writes `min(samples.len(), out.len() / 2)` frames and returns that count.
pub fn encode_pcm16_le(samples: &[f32], out: &mut [u8]) -> usize {
    let frames = samples.len().min(out.len() / 2);
    for (sample, bytes) in samples.iter().zip(out.chunks_exact_mut(2)).take(frames) {
        bytes.copy_from_slice(&to_pcm16(*sample).to_le_bytes());
    }
    frames
}
