use log::{trace, warn};

use crate::bus::BusTransport;
use crate::color::Pixel;
use crate::protocol::FrameEncoder;

/// Request clock that tells the bus to send whenever convenient, but not
/// before `minclock`
pub const BACKGROUND_PRIORITY_CLOCK: u64 = 0x7fff_ffff_0000_0000;

/// Largest payload the bus accepts per `send`
pub const MAX_CHUNK_SIZE: usize = 20;

/// Outcome of a [`TransmissionScheduler::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The pixels matched the last submitted state; nothing was sent.
    Unchanged,
    Sent { chunks: usize, bytes: usize, minclock: u64 },
}

/// Encodes changed pixel states and hands them to the bus in chunks.
pub struct TransmissionScheduler {
    encoder: FrameEncoder,
    last_pixels: Option<Vec<Pixel>>,
}

impl TransmissionScheduler {
    pub fn new(encoder: FrameEncoder) -> Self {
        TransmissionScheduler {
            encoder,
            last_pixels: None,
        }
    }

    pub fn encoder(&self) -> &FrameEncoder {
        &self.encoder
    }

    pub fn last_pixels(&self) -> Option<&[Pixel]> {
        self.last_pixels.as_deref()
    }

    /// Transmit `pixels` no earlier than `print_time` (or as soon as possible).
    ///
    /// Bus errors are logged and the remaining chunks are still handed over;
    /// retrying is the bus's business.
    pub fn submit<B>(&mut self, bus: &mut B, pixels: &[Pixel], print_time: Option<f64>) -> Dispatch
    where
        B: BusTransport + ?Sized,
    {
        if self.last_pixels.as_deref() == Some(pixels) {
            return Dispatch::Unchanged;
        }
        self.last_pixels = Some(pixels.to_vec());

        let frame = self.encoder.encode(pixels);
        let minclock = print_time.map_or(0, |t| bus.time_to_clock(t));

        let mut chunks = 0;
        for chunk in frame.chunks(MAX_CHUNK_SIZE) {
            if let Err(e) = bus.send(chunk, minclock, BACKGROUND_PRIORITY_CLOCK) {
                warn!("Failed to queue {} byte chunk: {:#}", chunk.len(), e);
            }
            chunks += 1;
        }
        trace!("Dispatched {} bytes in {} chunks (minclock {})", frame.len(), chunks, minclock);

        Dispatch::Sent {
            chunks,
            bytes: frame.len(),
            minclock,
        }
    }
}
