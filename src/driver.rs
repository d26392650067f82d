use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bus::BusTransport;
use crate::color::Pixel;
use crate::config::StripConfig;
use crate::led_helper::{IndexError, LedHelper, LedStatus};
use crate::protocol::FrameEncoder;
use crate::scheduler::{Dispatch, TransmissionScheduler};

/// A SET_LED request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetLed {
    pub color: Pixel,
    /// 1-based LED index; `None` sets the whole chain
    pub index: Option<usize>,
    /// Send the new state right away instead of waiting for the next update
    pub transmit: bool,
    pub print_time: Option<f64>,
}

/// Frame counters shared with the statistics thread
#[derive(Debug, Default)]
pub struct DriverStats {
    pub frames_sent: AtomicU64,
    pub frames_unchanged: AtomicU64,
}

/// One LPD8806 chain: its current state, encoder and bus.
pub struct Lpd8806<B: BusTransport> {
    helper: LedHelper,
    scheduler: TransmissionScheduler,
    bus: B,
    stats: Arc<DriverStats>,
}

impl<B: BusTransport> Lpd8806<B> {
    pub fn new(strip: &StripConfig, bus: B) -> Self {
        let encoder = FrameEncoder::new(strip.color_order, strip.channel_mapping, strip.chain_count);
        Lpd8806 {
            helper: LedHelper::new(strip.chain_count, strip.initial_pixel()),
            scheduler: TransmissionScheduler::new(encoder),
            bus,
            stats: Arc::default(),
        }
    }

    /// Push the current state once the bus is up
    pub fn handle_connect(&mut self) -> Dispatch {
        let pixels = self.helper.color_data().to_vec();
        self.update_leds(&pixels, None)
    }

    pub fn update_leds(&mut self, pixels: &[Pixel], print_time: Option<f64>) -> Dispatch {
        let dispatch = self.scheduler.submit(&mut self.bus, pixels, print_time);
        let counter = match dispatch {
            Dispatch::Unchanged => &self.stats.frames_unchanged,
            Dispatch::Sent { .. } => &self.stats.frames_sent,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        dispatch
    }

    /// Replace the chain state and transmit it
    pub fn show(&mut self, pixels: &[Pixel], print_time: Option<f64>) -> Dispatch {
        self.helper.replace(pixels);
        let pixels = self.helper.color_data().to_vec();
        self.update_leds(&pixels, print_time)
    }

    pub fn set_led(&mut self, cmd: &SetLed) -> Result<Option<Dispatch>, IndexError> {
        self.helper.set_color(cmd.index, cmd.color)?;
        if !cmd.transmit {
            return Ok(None);
        }
        let pixels = self.helper.color_data().to_vec();
        Ok(Some(self.update_leds(&pixels, cmd.print_time)))
    }

    /// Turn the strip off without touching the stored state
    pub fn blank(&mut self) -> Dispatch {
        debug!("Turning off LEDs...");
        let off = vec![Pixel::OFF; self.helper.chain_count()];
        self.update_leds(&off, None)
    }

    pub fn status(&self) -> LedStatus {
        self.helper.status()
    }

    pub fn color_data(&self) -> &[Pixel] {
        self.helper.color_data()
    }

    pub fn chain_count(&self) -> usize {
        self.helper.chain_count()
    }

    pub fn stats(&self) -> Arc<DriverStats> {
        Arc::clone(&self.stats)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ChannelMapping, ColorOrder};
    use anyhow::Result;

    #[derive(Default)]
    struct RecordingBus {
        frames: Vec<(Vec<u8>, u64)>,
    }

    impl BusTransport for RecordingBus {
        fn send(&mut self, data: &[u8], minclock: u64, _reqclock: u64) -> Result<()> {
            self.frames.push((data.to_vec(), minclock));
            Ok(())
        }

        fn time_to_clock(&self, print_time: f64) -> u64 {
            (print_time * 100.0) as u64
        }
    }

    fn strip(chain_count: usize) -> StripConfig {
        StripConfig {
            chain_count,
            color_order: ColorOrder::BRG,
            channel_mapping: ChannelMapping::Legacy,
            opc_channel: 0,
            opc_offset: 0,
            initial_red: 0.0,
            initial_green: 0.0,
            initial_blue: 1.0,
            initial_white: 0.0,
        }
    }

    fn set(index: Option<usize>, transmit: bool) -> SetLed {
        SetLed {
            color: Pixel::new(1.0, 0.0, 0.0, 0.0),
            index,
            transmit,
            print_time: Some(3.0),
        }
    }

    #[test]
    fn test_connect_replays_initial_state() {
        let mut led = Lpd8806::new(&strip(2), RecordingBus::default());
        assert!(matches!(led.handle_connect(), Dispatch::Sent { chunks: 1, minclock: 0, .. }));
        // BRG: blue first
        assert_eq!(led.bus().frames[0].0, vec![0, 0xff, 0x80, 0x80, 0, 0, 0]);
        assert_eq!(led.handle_connect(), Dispatch::Unchanged);
    }

    #[test]
    fn test_set_led_without_transmit() {
        let mut led = Lpd8806::new(&strip(3), RecordingBus::default());
        assert_eq!(led.set_led(&set(Some(2), false)), Ok(None));
        assert!(led.bus().frames.is_empty());
        assert_eq!(led.status().color_data[1], Pixel::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_set_led_transmits_at_print_time() {
        let mut led = Lpd8806::new(&strip(3), RecordingBus::default());
        let dispatch = led.set_led(&set(None, true)).unwrap();
        assert!(matches!(dispatch, Some(Dispatch::Sent { minclock: 300, .. })));
        assert_eq!(led.bus().frames[0].1, 300);
        assert_eq!(led.stats().frames_sent.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_set_led_bad_index() {
        let mut led = Lpd8806::new(&strip(3), RecordingBus::default());
        assert!(led.set_led(&set(Some(9), true)).is_err());
        assert!(led.bus().frames.is_empty());
    }

    #[test]
    fn test_blank_keeps_state() {
        let mut led = Lpd8806::new(&strip(2), RecordingBus::default());
        led.handle_connect();
        led.blank();
        assert_eq!(led.bus().frames[1].0, vec![0, 0x80, 0x80, 0x80, 0, 0, 0]);
        assert_eq!(led.status().color_data[0], Pixel::new(0.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn test_show_updates_status_and_counts_unchanged() {
        let mut led = Lpd8806::new(&strip(2), RecordingBus::default());
        let pixels = [Pixel::new(0.0, 1.0, 0.0, 0.0); 2];
        led.show(&pixels, None);
        led.show(&pixels, None);
        assert_eq!(led.status().color_data, pixels.to_vec());
        let stats = led.stats();
        assert_eq!(stats.frames_sent.load(Ordering::Relaxed), 1);
        assert_eq!(stats.frames_unchanged.load(Ordering::Relaxed), 1);
    }
}
