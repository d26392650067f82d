use crate::color::{ChannelMapping, ColorOrder, Pixel};
use crate::gamma::GammaTable;
use std::iter;

/// Bytes per LED on the wire
const STRIDE: usize = 3;

/// Number of zero bytes that latch a chain of `chain_count` LEDs
pub fn latch_len(chain_count: usize) -> usize {
    chain_count.div_ceil(32)
}

/// Total encoded frame size for a chain of `chain_count` LEDs
pub fn frame_len(chain_count: usize) -> usize {
    latch_len(chain_count) + STRIDE * chain_count
}

/// Build an LPD8806 frame: zero latch preamble, then three gamma corrected
/// bytes per LED in wire order.
///
/// The last LED is always sent dark; the chip treats it as the reset pixel.
/// The frame length depends only on `chain_count`: surplus pixels are dropped
/// and missing ones are encoded as off.
pub fn build_lpd8806_frame(
    pixels: &[Pixel],
    order: ColorOrder,
    mapping: ChannelMapping,
    gamma: &GammaTable,
    chain_count: usize,
) -> Vec<u8> {
    let latch = latch_len(chain_count);
    let mut frame = vec![0u8; frame_len(chain_count)];

    let data = &mut frame[latch..];
    let padded = pixels.iter().chain(iter::repeat(&Pixel::OFF));
    for (slot, pixel) in data.chunks_exact_mut(STRIDE).zip(padded) {
        slot.copy_from_slice(&order.arrange(mapping, pixel, |v| gamma.correct(v)));
    }

    // Terminator pixel
    if chain_count > 0 {
        let end = frame.len();
        frame[end - STRIDE..].fill(0);
    }

    frame
}

/// Encoder bound to one strip's fixed settings
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    order: ColorOrder,
    mapping: ChannelMapping,
    gamma: GammaTable,
    chain_count: usize,
}

impl FrameEncoder {
    pub fn new(order: ColorOrder, mapping: ChannelMapping, chain_count: usize) -> Self {
        FrameEncoder {
            order,
            mapping,
            gamma: GammaTable::new(),
            chain_count,
        }
    }

    pub fn encode(&self, pixels: &[Pixel]) -> Vec<u8> {
        build_lpd8806_frame(pixels, self.order, self.mapping, &self.gamma, self.chain_count)
    }
}
