use anyhow::{anyhow, Context, Result};
use log::{debug, error, log_enabled, trace, warn, Level};
use serialport::SerialPort;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::clock::DeviceClock;
use crate::config::BusConfig;
use crate::scheduler::BACKGROUND_PRIORITY_CLOCK;

/// Chunks that may be queued ahead of the serial worker
const QUEUE_DEPTH: usize = 64;

/// Byte transport that carries encoded frames to the strip.
pub trait BusTransport {
    /// Queue one chunk for transmission no earlier than `minclock`.
    ///
    /// `reqclock` is the latest clock the caller would like it sent by;
    /// [`BACKGROUND_PRIORITY_CLOCK`] means no deadline.
    fn send(&mut self, data: &[u8], minclock: u64, reqclock: u64) -> Result<()>;

    /// Convert a timeline position into the bus clock domain
    fn time_to_clock(&self, print_time: f64) -> u64;
}

struct Chunk {
    data: Vec<u8>,
    minclock: u64,
    reqclock: u64,
}

/// Serial port transport with a dedicated writer thread.
///
/// Chunks are written strictly in the order they were queued. A full queue
/// blocks the caller rather than dropping data, since a missing chunk
/// corrupts everything shifted in after it.
pub struct SerialBus {
    port_name: String,
    clock: DeviceClock,
    sender: Option<SyncSender<Chunk>>,
    chunks_written: Arc<AtomicU64>,
    worker_handle: Option<thread::JoinHandle<()>>,
}

impl SerialBus {
    pub fn open(config: &BusConfig) -> Result<Self> {
        let port = Self::open_port(config)?;
        let clock = DeviceClock::new(config.clock_frequency);

        let (sender, receiver) = mpsc::sync_channel::<Chunk>(QUEUE_DEPTH);
        let chunks_written = Arc::new(AtomicU64::new(0));

        let worker_name = config.port.clone();
        let worker_written = Arc::clone(&chunks_written);
        let worker_handle = thread::Builder::new()
            .name(format!("bus {}", config.port))
            .spawn(move || worker_thread(port, receiver, clock, worker_name, worker_written))
            .context("Failed to spawn serial worker")?;

        debug!(
            "✓ Opened {} @ {} baud (device clock {} Hz)",
            config.port, config.baud_rate, config.clock_frequency
        );

        Ok(SerialBus {
            port_name: config.port.clone(),
            clock,
            sender: Some(sender),
            chunks_written,
            worker_handle: Some(worker_handle),
        })
    }

    pub fn estimated_print_time(&self) -> f64 {
        self.clock.estimated_print_time()
    }

    /// Get a clone of the written chunk counter (for statistics)
    pub fn chunks_written_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.chunks_written)
    }

    /// Close the queue and wait until everything already queued is written
    pub fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }

    fn open_port(config: &BusConfig) -> Result<Box<dyn SerialPort>> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(1000))
            .open()
            .with_context(|| format!("Failed to open serial port {}", config.port))?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            warn!("Failed to set DTR on {}: {}", config.port, e);
        }

        // Allow the bridge to come up
        thread::sleep(Duration::from_millis(100));

        Ok(port)
    }
}

impl BusTransport for SerialBus {
    fn send(&mut self, data: &[u8], minclock: u64, reqclock: u64) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("bus {} is stopped", self.port_name))?;
        sender
            .send(Chunk {
                data: data.to_vec(),
                minclock,
                reqclock,
            })
            .map_err(|_| anyhow!("bus {} is disconnected", self.port_name))
    }

    fn time_to_clock(&self, print_time: f64) -> u64 {
        self.clock.time_to_clock(print_time)
    }
}

impl Drop for SerialBus {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker thread function - waits for each chunk's start clock, then writes it
fn worker_thread<W: Write>(
    mut port: W,
    receiver: Receiver<Chunk>,
    clock: DeviceClock,
    port_name: String,
    chunks_written: Arc<AtomicU64>,
) {
    // recv fails once the sender is dropped and the queue is drained
    while let Ok(chunk) = receiver.recv() {
        if chunk.minclock > 0 {
            if let Some(start) = clock.clock_to_instant(chunk.minclock) {
                let now = Instant::now();
                if start > now {
                    thread::sleep(start - now);
                }
            }
        }

        if log_enabled!(Level::Trace) {
            let hex: String = chunk
                .data
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            trace!("[{}] chunk minclock={} : {}", port_name, chunk.minclock, hex);
        }

        let written = port.write_all(&chunk.data).and_then(|_| port.flush());
        if let Err(e) = written {
            error!("✗ Serial error on {}: {}", port_name, e);
            error!("✗ Bus {} is now disconnected", port_name);
            break;
        }

        if chunk.reqclock < BACKGROUND_PRIORITY_CLOCK {
            let now = clock.now_clock();
            if now > chunk.reqclock {
                warn!("[{}] chunk written {} ticks late", port_name, now - chunk.reqclock);
            }
        }

        chunks_written.fetch_add(1, Ordering::Relaxed);
    }
}
