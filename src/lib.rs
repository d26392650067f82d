//! LPD8806 LED strip driver.
//!
//! Pixels are gamma corrected, reordered and framed by [`protocol`], then
//! split into bus-sized chunks by [`scheduler::TransmissionScheduler`], which
//! skips states identical to the last one it sent.

pub mod bus;
pub mod clock;
pub mod color;
pub mod config;
pub mod driver;
pub mod gamma;
pub mod led_helper;
pub mod opc_server;
pub mod protocol;
pub mod scheduler;

pub use bus::{BusTransport, SerialBus};
pub use color::{ChannelMapping, ColorOrder, Pixel};
pub use config::Config;
pub use driver::{Lpd8806, SetLed};
pub use gamma::GammaTable;
pub use protocol::{build_lpd8806_frame, FrameEncoder};
pub use scheduler::{Dispatch, TransmissionScheduler, BACKGROUND_PRIORITY_CLOCK, MAX_CHUNK_SIZE};
