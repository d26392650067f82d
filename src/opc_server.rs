use anyhow::{Context, Result};
use log::{debug, error, info, log_enabled, trace, Level};
use std::io::{ErrorKind, Read};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::bus::BusTransport;
use crate::color::overlay_rgb8;
use crate::config::{OpcConfig, StripConfig};
use crate::driver::Lpd8806;

const RECV_BUFFER_SIZE: usize = 16384; // 16KB

/// OPC channel 0 addresses every strip
const BROADCAST_CHANNEL: u8 = 0;

const CMD_SET_PIXEL_COLORS: u8 = 0;

/// Extra counters sampled by the statistics thread
pub type StatsCounters = Vec<(String, Arc<AtomicU64>)>;

/// OPC server feeding pixel data into one LPD8806 chain
pub struct OpcServer<B: BusTransport> {
    opc: OpcConfig,
    strip: StripConfig,
    driver: Lpd8806<B>,
    frames_received: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl<B: BusTransport> OpcServer<B> {
    pub fn new(opc: OpcConfig, strip: StripConfig, driver: Lpd8806<B>) -> Self {
        OpcServer {
            opc,
            strip,
            driver,
            frames_received: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn driver(&self) -> &Lpd8806<B> {
        &self.driver
    }

    /// Gracefully shutdown - turn the strip off
    pub fn shutdown(&mut self) {
        self.driver.blank();
        debug!("✓ Server stopped");
    }

    /// Run the OPC server until the running flag is cleared
    pub fn run(&mut self, extra_stats: StatsCounters) -> Result<()> {
        let addr = format!("{}:{}", self.opc.host, self.opc.port);
        let listener = TcpListener::bind(&addr).with_context(|| format!("Failed to bind to {}", addr))?;

        // Set nonblocking so accept() can check running flag periodically
        listener.set_nonblocking(true)?;

        info!("✓ OPC Server listening on {}", addr);
        debug!("Waiting for OPC client connection... (Press Ctrl-C to stop)");

        if log_enabled!(Level::Debug) {
            self.spawn_stats_thread(extra_stats);
        }

        while self.running.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer_addr)) => {
                    info!("✓ Client connected from {}", peer_addr);

                    if let Err(e) = self.handle_client(stream) {
                        error!("Error handling client: {}", e);
                    }

                    info!("Client disconnected");
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    thread::sleep(Duration::from_millis(100));
                }
            }
        }

        Ok(())
    }

    /// Handle a single client connection with non-blocking reads
    fn handle_client(&mut self, mut stream: TcpStream) -> Result<()> {
        stream
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking mode")?;

        let mut buffer = Vec::new();
        let mut read_buf = vec![0u8; RECV_BUFFER_SIZE];

        while self.running.load(Ordering::Relaxed) {
            // Drain everything available
            loop {
                match stream.read(&mut read_buf) {
                    Ok(0) => return Ok(()),
                    Ok(n) => buffer.extend_from_slice(&read_buf[..n]),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            self.process_buffer(&mut buffer);

            thread::sleep(Duration::from_millis(1));
        }

        Ok(())
    }

    /// Consume every complete OPC message at the front of `buffer`
    pub fn process_buffer(&mut self, buffer: &mut Vec<u8>) {
        // OPC header: channel (1 byte), command (1 byte), length (2 bytes, big-endian)
        while buffer.len() >= 4 {
            let channel = buffer[0];
            let command = buffer[1];
            let length = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;

            let message_size = 4 + length;
            if buffer.len() < message_size {
                break;
            }

            let message_data: Vec<u8> = buffer.drain(..message_size).skip(4).collect();

            if command == CMD_SET_PIXEL_COLORS {
                if self.process_pixel_data(channel, &message_data) {
                    self.frames_received.fetch_add(1, Ordering::Relaxed);
                }
            } else {
                trace!("Ignoring OPC command {} on channel {}", command, channel);
            }
        }
    }

    /// Apply RGB pixel data addressed to our channel. Returns false if the
    /// message was for another strip.
    fn process_pixel_data(&mut self, channel: u8, pixel_data: &[u8]) -> bool {
        if channel != self.strip.opc_channel && channel != BROADCAST_CHANNEL {
            return false;
        }

        let offset_bytes = self.strip.opc_offset * 3;
        let sliced = pixel_data.get(offset_bytes..).unwrap_or(&[]);

        if log_enabled!(Level::Trace) {
            let hex: String = sliced
                .iter()
                .take(30)
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            trace!(
                "Received: channel={}, byte_count={}, sliced={} ({} pixels): {}",
                channel,
                pixel_data.len(),
                sliced.len(),
                sliced.len() / 3,
                hex
            );
        }

        let pixels = overlay_rgb8(self.driver.color_data(), sliced);
        self.driver.show(&pixels, None);
        true
    }

    /// Spawn statistics thread
    fn spawn_stats_thread(&self, extra: StatsCounters) {
        let frames_received = Arc::clone(&self.frames_received);
        let running = Arc::clone(&self.running);
        let stats = self.driver.stats();

        thread::spawn(move || {
            let mut last_received = 0u64;
            let mut last_sent = 0u64;
            let mut last_unchanged = 0u64;
            let mut last_extra = vec![0u64; extra.len()];

            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(5));

                let received = frames_received.load(Ordering::Relaxed);
                let sent = stats.frames_sent.load(Ordering::Relaxed);
                let unchanged = stats.frames_unchanged.load(Ordering::Relaxed);

                let mut line = format!(
                    "[Stats] Received: {:.1} fps, sent: {:.1} fps, unchanged: {:.1} fps",
                    (received - last_received) as f64 / 5.0,
                    (sent - last_sent) as f64 / 5.0,
                    (unchanged - last_unchanged) as f64 / 5.0,
                );
                for ((name, counter), last) in extra.iter().zip(last_extra.iter_mut()) {
                    let current = counter.load(Ordering::Relaxed);
                    line.push_str(&format!(", {}: {:.1}/s", name, (current - *last) as f64 / 5.0));
                    *last = current;
                }
                debug!("{}", line);

                last_received = received;
                last_sent = sent;
                last_unchanged = unchanged;
            }
        });
    }
}
