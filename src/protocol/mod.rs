mod lpd8806;

pub use lpd8806::{build_lpd8806_frame, frame_len, latch_len, FrameEncoder};
