//! # GIAnT command line
//!
//! Drives the GIAnT fault-injection FPGA from the command line: glitch pulses, the
//! software UART and status readout.
//!
//! ## Backends
//!
//! Registers are either accessed through a memory mapped UIO device (`--uio <path>`, or
//! `--uio auto` to look the device up by name) or, by default, through the trace backend.
//! The trace backend talks to no hardware and logs every register access at `trace`
//! level, e.g. `RUST_LOG=trace giant glitch --pulse 1000:50`.
pub mod backends;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_num::{maybe_hex, number_range};
use env_logger::Env;
use giant_host::{
    ClockConstants, Register, RegisterInterface,
    config::Builder,
    dac::FaultInjector,
    gpio::GpioMux,
    trigger::{TriggerId, UniversalTrigger},
    uart::{SerialTransceiver, UartConfig},
};
use giant_protocol::{
    frame::{FrameFormat, Parity},
    registers::GpioPin,
};

use crate::backends::{trace::TraceBackend, uio::UioBackend};

const UIO_CLASS_DIR: &str = "/sys/class/uio";
const UIO_DEVICE_NAME: &str = "giant";

#[derive(Parser)]
#[command(about = "Control of the GIAnT fault-injection FPGA", long_about = None)]
struct Cli {
    /// UIO device of the register bank, or `auto`. Without it, register traffic is only logged
    #[arg(long, global = true)]
    uio: Option<PathBuf>,

    /// Pulse generator ticks per nanosecond
    #[arg(long, global = true, default_value = "0.25")]
    ticks_per_ns: f64,

    /// Frequency of the normal-mode clock in Hz
    #[arg(long, global = true, default_value = "100e6")]
    f_clk: f64,

    /// How long to wait for a busy block, in milliseconds
    #[arg(long, global = true, default_value = "1000")]
    poll_timeout_ms: u64,

    /// Time between two status reads, in microseconds
    #[arg(long, global = true, default_value = "1000")]
    poll_interval_us: u64,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the status registers of all blocks
    Status,
    /// Program glitch pulses and arm the fault injection
    Glitch(GlitchArgs),
    /// Send characters through the software UART
    UartSend {
        #[command(flatten)]
        uart: UartArgs,
        /// Characters to send
        #[arg(required = true, value_parser = maybe_hex::<u32>)]
        values: Vec<u32>,
    },
    /// Wait for a character on the software UART
    UartReceive {
        #[command(flatten)]
        uart: UartArgs,
        /// How long to wait for the character, in milliseconds
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },
}

#[derive(Args)]
struct GlitchArgs {
    /// Pulse as `<offset_ns>:<width_ns>`. The first offset is relative to the trigger,
    /// later ones to the end of the previous pulse
    #[arg(short, long = "pulse", value_parser = parse_pulse)]
    pulses: Vec<(f64, f64)>,

    /// DAC code during a pulse
    #[arg(long, value_parser = maybe_hex::<u8>)]
    fault_code: Option<u8>,

    /// DAC code between pulses
    #[arg(long, value_parser = maybe_hex::<u8>)]
    normal_code: Option<u8>,

    /// DAC code while off
    #[arg(long, value_parser = maybe_hex::<u8>)]
    off_code: Option<u8>,

    /// Trigger on the rising instead of the falling edge of EXT1
    #[arg(long)]
    rising_edge: bool,

    /// Fire immediately instead of arming for the external trigger
    #[arg(long)]
    software_trigger: bool,
}

#[derive(Args)]
struct UartArgs {
    #[arg(long, value_parser = gpio_pin)]
    tx_pin: u8,

    #[arg(long, value_parser = gpio_pin)]
    rx_pin: Option<u8>,

    #[arg(short, long, default_value = "115200")]
    baud: u32,

    #[arg(long, default_value = "8")]
    data_bits: u8,

    #[arg(long, value_enum, default_value = "none")]
    parity: ParityArg,

    #[arg(long, default_value = "1")]
    stop_bits: u8,
}

#[derive(ValueEnum, Copy, Clone, Eq, PartialEq)]
enum ParityArg {
    None,
    Even,
    Odd,
}

impl From<ParityArg> for Parity {
    fn from(value: ParityArg) -> Self {
        match value {
            ParityArg::None => Parity::None,
            ParityArg::Even => Parity::Even,
            ParityArg::Odd => Parity::Odd,
        }
    }
}

impl UartArgs {
    fn config(&self) -> Result<UartConfig, Box<dyn Error>> {
        let format = FrameFormat::new(self.data_bits, self.parity.into(), self.stop_bits)?;
        let mut config =
            UartConfig::new(GpioPin::try_from(self.tx_pin)?, self.baud).with_format(format);
        if let Some(rx_pin) = self.rx_pin {
            config = config.with_rx_pin(GpioPin::try_from(rx_pin)?);
        }
        Ok(config)
    }
}

fn gpio_pin(s: &str) -> Result<u8, String> {
    number_range(s, 0, 7)
}

fn parse_pulse(s: &str) -> Result<(f64, f64), String> {
    let (offset, width) = s
        .split_once(':')
        .ok_or_else(|| format!("expected <offset_ns>:<width_ns>, got '{}'", s))?;
    let offset = offset
        .trim()
        .parse()
        .map_err(|e| format!("invalid offset '{}': {}", offset, e))?;
    let width = width
        .trim()
        .parse()
        .map_err(|e| format!("invalid width '{}': {}", width, e))?;
    Ok((offset, width))
}

/// Device node of the UIO whose sysfs `name` attribute is `device_name`.
///
/// `class_dir` is the UIO class directory, i.e. `/sys/class/uio`. Entries
/// without a readable name are skipped.
fn find_uio_device(class_dir: &Path, device_name: &str) -> Option<PathBuf> {
    let uio = class_dir.read_dir().ok()?.flatten().find(|entry| {
        let name = std::fs::read_to_string(entry.path().join("name")).unwrap_or_default();
        log::debug!("{} is named '{}'", entry.path().display(), name.trim());
        name.trim() == device_name
    })?;
    Some(Path::new("/dev").join(uio.file_name()))
}

fn open_device(
    uio: Option<PathBuf>,
    clock: ClockConstants,
) -> Result<Box<dyn RegisterInterface>, Box<dyn Error>> {
    match uio {
        Some(path) => {
            let path = if path.as_os_str() == "auto" {
                let detected = find_uio_device(Path::new(UIO_CLASS_DIR), UIO_DEVICE_NAME)
                    .ok_or_else(|| {
                        format!("No UIO device named '{}' could be detected", UIO_DEVICE_NAME)
                    })?;
                log::info!("Auto-detected UIO device at {}", detected.display());
                detected
            } else {
                path
            };
            log::info!("Opening UIO backend from {}", path.display());
            Ok(Box::new(UioBackend::new(path, clock)?))
        }
        None => {
            log::info!("No device given, using the trace backend");
            Ok(Box::new(TraceBackend::new(clock)))
        }
    }
}

fn print_status(dev: &mut dyn RegisterInterface) {
    let fi = FaultInjector::new().status(dev);
    println!(
        "fault injection: ready={} armed={} (0x{:02x})",
        fi.is_ready(),
        fi.is_armed(),
        fi.raw()
    );
    // Constructing UTX/URX would clear them, so their registers are read directly
    let utx = dev.read_register(Register::UtxStatus);
    let utx_packets = dev.read_register(Register::UtxPacketCount);
    println!("utx: status=0x{:02x} packets={}", utx, utx_packets);
    let urx = dev.read_register(Register::UrxStatus);
    let urx_packets = dev.read_register(Register::UrxPacketCount);
    println!("urx: status=0x{:02x} packets={}", urx, urx_packets);
    for id in [TriggerId::Trigger1, TriggerId::Trigger2] {
        let trigger = UniversalTrigger::new(id);
        println!(
            "{:?}: armed={} triggered={}",
            id,
            trigger.is_armed(dev),
            trigger.has_triggered(dev)
        );
    }
}

fn glitch(dev: &mut dyn RegisterInterface, args: GlitchArgs) -> Result<(), Box<dyn Error>> {
    let mut fi = FaultInjector::new();
    fi.init(dev, !args.rising_edge);

    if let Some(code) = args.fault_code {
        fi.set_fault_voltage(dev, code);
    }
    if let Some(code) = args.normal_code {
        fi.set_normal_voltage(dev, code);
    }
    if let Some(code) = args.off_code {
        fi.set_off_voltage(dev, code);
    }

    for (offset, width) in args.pulses {
        let pulse = fi.add_pulse(dev, offset, width, false)?;
        log::info!(
            "Pulse {}: offset {} ticks, width {} ticks",
            fi.pulses().len(),
            pulse.offset_ticks(),
            pulse.width_ticks()
        );
    }

    if args.software_trigger {
        fi.software_trigger(dev);
        println!("Triggered {} pulses", fi.pulses().len());
    } else {
        fi.arm(dev);
        println!("Armed with {} pulses", fi.pulses().len());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let clock = ClockConstants::new(cli.ticks_per_ns, cli.f_clk);
    let poll = Builder::new()
        .poll_interval(Duration::from_micros(cli.poll_interval_us))
        .poll_timeout(Duration::from_millis(cli.poll_timeout_ms))
        .build();
    log::debug!("Clock: {:?}, polling: {:?}", clock, poll);

    let mut device = open_device(cli.uio, clock)?;
    let dev = device.as_mut();

    match cli.command {
        Command::Status => print_status(dev),
        Command::Glitch(args) => glitch(dev, args)?,
        Command::UartSend { uart, values } => {
            let mut mux = GpioMux::new(dev);
            let mut serial = SerialTransceiver::configure(dev, &mut mux, uart.config()?, poll)?;
            serial.send_buffer(dev, &values)?;
            println!("Sent {} characters", values.len());
        }
        Command::UartReceive { uart, timeout_ms } => {
            let mut mux = GpioMux::new(dev);
            let serial = SerialTransceiver::configure(dev, &mut mux, uart.config()?, poll)?;
            let packet = serial.wait_for_byte(dev, Duration::from_millis(timeout_ms))?;
            println!("Received {:02x?}", packet);
        }
    }
    Ok(())
}
