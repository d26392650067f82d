use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::sync::atomic::Ordering;

use lpd8806_driver::bus::SerialBus;
use lpd8806_driver::color::Pixel;
use lpd8806_driver::config::Config;
use lpd8806_driver::driver::{Lpd8806, SetLed};
use lpd8806_driver::led_helper::LedHelper;
use lpd8806_driver::opc_server::OpcServer;

#[derive(Parser)]
#[command(name = "lpd8806")]
#[command(about = "LPD8806 LED strip driver\n\nEncodes pixel data for LPD8806 strips and sends it over a serial bus.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    config: String,

    /// Enable debug output (statistics)
    #[arg(long, global = true)]
    debug: bool,

    /// Enable detailed debug (hex dumps of every chunk)
    #[arg(long, global = true)]
    ddebug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Receive OPC data over TCP and drive the strip (default)
    Serve,
    /// Set LED colors once, then exit
    Set {
        #[arg(long, default_value_t = 0.0)]
        red: f32,
        #[arg(long, default_value_t = 0.0)]
        green: f32,
        #[arg(long, default_value_t = 0.0)]
        blue: f32,
        #[arg(long, default_value_t = 0.0)]
        white: f32,
        /// 1-based LED index; all LEDs when omitted
        #[arg(long)]
        index: Option<usize>,
        /// Seconds from now before the new colors are shown
        #[arg(long)]
        delay: Option<f64>,
        /// Only update the stored state; the strip keeps its last frame
        #[arg(long)]
        no_transmit: bool,
    },
    /// Print the configured initial LED state as JSON
    Status,
}

fn init_logging(cli: &Cli) {
    // ddebug implies debug
    let level = if cli.ddebug {
        LevelFilter::Trace
    } else if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config),
        Command::Set {
            red,
            green,
            blue,
            white,
            index,
            delay,
            no_transmit,
        } => {
            let cmd = SetLed {
                color: Pixel::new(red, green, blue, white),
                index,
                transmit: !no_transmit,
                print_time: None,
            };
            set(config, cmd, delay)
        }
        Command::Status => {
            let helper = LedHelper::new(config.strip.chain_count, config.strip.initial_pixel());
            println!("{}", serde_json::to_string_pretty(&helper.status())?);
            Ok(())
        }
    }
}

fn serve(config: Config) -> Result<()> {
    let bus = SerialBus::open(&config.bus)?;
    let chunks_written = bus.chunks_written_counter();

    let mut driver = Lpd8806::new(&config.strip, bus);
    driver.handle_connect();
    info!(
        "✓ Driving {} LEDs ({}) on {}",
        config.strip.chain_count, config.strip.color_order, config.bus.port
    );

    let mut server = OpcServer::new(config.opc.clone(), config.strip.clone(), driver);

    // Set up Ctrl-C handler with graceful shutdown
    let running = server.get_running_flag();
    let result = ctrlc::set_handler(move || {
        info!("Shutting down...");
        running.store(false, Ordering::Relaxed);
    });
    if let Err(e) = result {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    // Blocks until shutdown
    server.run(vec![("chunks".to_string(), chunks_written)])?;

    // Send a black frame; dropping the server drains the bus
    server.shutdown();

    Ok(())
}

fn set(config: Config, mut cmd: SetLed, delay: Option<f64>) -> Result<()> {
    let bus = SerialBus::open(&config.bus)?;
    cmd.print_time = delay.map(|d| bus.estimated_print_time() + d);

    let mut driver = Lpd8806::new(&config.strip, bus);
    driver.handle_connect();
    driver.set_led(&cmd).context("SET_LED failed")?;

    println!("{}", serde_json::to_string_pretty(&driver.status())?);

    // Wait for the queued chunks to hit the wire
    driver.bus_mut().stop();
    Ok(())
}
