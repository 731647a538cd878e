use std::{
    fmt::Debug,
    fs::File,
    io::{self, Read},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use fpu68k::{
    cpu::{Cpu, Exception},
    sys::System,
};
use gdb::SystemTarget;
use gdbstub::{
    common::Signal,
    conn::{Connection, ConnectionExt},
    stub::{
        run_blocking::{BlockingEventLoop, Event, WaitForStopReasonError},
        DisconnectReason, GdbStub, SingleThreadStopReason,
    },
    target::Target,
};
use tracing_subscriber::EnvFilter;

mod gdb;

fn wait_for_gdb_connection<S: ToSocketAddrs + Debug>(sockaddr: S) -> io::Result<TcpStream> {
    tracing::info!("Waiting for a GDB connection on {:?}...", sockaddr);
    let sock = TcpListener::bind(sockaddr)?;
    let (stream, addr) = sock.accept()?;

    // Blocks until a GDB client connects via TCP.
    // i.e: Running `target remote localhost:<port>` from the GDB prompt.
    tracing::info!("Debugger connected from {}", addr);
    Ok(stream)
}

struct GdbEventLoop;

impl BlockingEventLoop for GdbEventLoop {
    type Target = SystemTarget;
    type Connection = TcpStream;
    type StopReason = SingleThreadStopReason<u32>;

    fn wait_for_stop_reason(
        target: &mut Self::Target,
        conn: &mut Self::Connection,
    ) -> Result<
        Event<Self::StopReason>,
        WaitForStopReasonError<
            <Self::Target as Target>::Error,
            <Self::Connection as Connection>::Error,
        >,
    > {
        let mut tick = 0;
        while !target.cpu().is_stopped() {
            // Poll TCP conn every 1024 ticks for new data
            if (tick % 1024) == 0 && conn.peek().map(|b| b.is_some()).unwrap_or(true) {
                let byte = (conn as &mut dyn ConnectionExt<Error = io::Error>)
                    .read()
                    .map_err(WaitForStopReasonError::Connection)?;
                return Ok(Event::IncomingData(byte));
            }
            if target.step() {
                return Ok(Event::TargetStopped(SingleThreadStopReason::SwBreak(())));
            }
            tick += 1;
        }

        Ok(Event::TargetStopped(SingleThreadStopReason::Terminated(
            Signal::SIGSTOP,
        )))
    }

    fn on_interrupt(
        _target: &mut Self::Target,
    ) -> Result<Option<Self::StopReason>, <Self::Target as Target>::Error> {
        Ok(Some(SingleThreadStopReason::Signal(Signal::SIGINT)))
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to ROM file to load
    #[arg(value_name = "ROM")]
    file: PathBuf,

    /// Enable GDB remote debugging on address (e.g. localhost:5050)
    #[arg(short, long, value_name = "ADDRESS")]
    debug: Option<String>,

    /// Stop after executing this many instructions
    #[arg(short, long, value_name = "COUNT")]
    steps: Option<u64>,

    /// Log filter (e.g. `debug` or `fpu68k=trace`), takes precedence over RUST_LOG
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// Print the FPU registers once execution stops
    #[arg(long)]
    dump: bool,
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn dump(cpu: &Cpu) {
    for register in 0..8 {
        let value = cpu.fp(register);
        println!(
            "fp{register}  {:016X}  {}",
            value.as_bits(),
            value.as_f64()
        );
    }
    println!("fpcr {:08X}", cpu.fpcr());
    println!("fpsr {:08X}", cpu.fpsr());
    println!("fpiar {:08X}", cpu.fpiar());
}

fn main() -> io::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.log.as_deref());

    let mut rom = Vec::new();
    File::open(&args.file)?.read_to_end(&mut rom)?;

    let mut sys = System::new(rom);
    if let Err(err) = sys.reset() {
        tracing::error!("reset failed: {err}");
        return Ok(ExitCode::FAILURE);
    }

    let mut sys = SystemTarget::new(sys);

    if let Some(sockaddr) = args.debug {
        let conn = wait_for_gdb_connection(sockaddr)?;
        let debugger = GdbStub::new(conn);
        match debugger.run_blocking::<GdbEventLoop>(&mut sys) {
            Ok(reason) => match reason {
                DisconnectReason::Disconnect => tracing::info!("Debugger disconnected"),

                DisconnectReason::TargetExited(code) => {
                    tracing::info!(code, "Target exited");
                }

                DisconnectReason::TargetTerminated(signal) => {
                    tracing::info!(?signal, "Target terminated");
                }

                DisconnectReason::Kill => {
                    tracing::info!("Killed by debugger");
                    return Ok(ExitCode::SUCCESS);
                }
            },

            Err(e) => {
                tracing::error!("{e:?}");
            }
        };
    }

    let mut steps = 0u64;
    let mut failure = None;
    while !sys.cpu().is_stopped() && args.steps.map_or(true, |limit| steps < limit) {
        if let Err(err) = sys.system_mut().step() {
            failure = Some(err);
        }
        steps += 1;
    }

    tracing::info!(
        steps,
        cycles = sys.cpu().cycles(),
        branches = sys.system().memory().branches(),
        "Stopped"
    );
    if args.dump {
        dump(sys.cpu());
    }

    match failure {
        // a non-FPU opcode ends the program
        None | Some(Exception::IllegalInstruction(_)) => Ok(ExitCode::SUCCESS),
        Some(err) => {
            tracing::error!("{err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
