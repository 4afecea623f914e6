//! Command-line driver for the tiled-gemm kernels.
//!
//! # Usage
//!
//! ```bash
//! # Tiled N x N product with B x B work-groups, verified against the serial
//! # reference
//! tiled-gemm gemm --size 1024 --tile 4
//!
//! # Same product in double precision with local memory hazard tracking
//! tiled-gemm --check-hazards gemm --size 256 --tile 8 --dtype f64
//!
//! # Local memory round trip: store global id, barrier, read back
//! tiled-gemm local-check --global 256 --local 64
//!
//! # Write every global id of a 1-D launch into a write-once buffer
//! tiled-gemm iota --global 16 --local 4
//! ```

use std::sync::Mutex;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::distributions::uniform::SampleUniform;
use tracing::{debug, info};

use tg_gemm::{GemmBackend, Matrix, SerialBackend, TiledGemm, Verifier};
use tg_grid::{DeviceConfig, Element, NdRange, Queue, Range2, WriteOnceBuffer};

/// Tiled matrix multiplication on a simulated work-group device
#[derive(Parser, Debug)]
#[command(name = "tiled-gemm")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    device: DeviceArgs,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// Work-groups executing concurrently (defaults to available CPUs)
    #[arg(long, global = true)]
    compute_units: Option<usize>,

    /// Largest accepted work-group, in work-items
    #[arg(long, global = true, default_value_t = 1024)]
    max_work_group_size: usize,

    /// Local memory per work-group, in bytes
    #[arg(long, global = true, default_value_t = 64 * 1024)]
    local_mem_bytes: usize,

    /// Stack reserved for each work-item thread, in KiB
    #[arg(long, global = true, default_value_t = 256)]
    work_item_stack_kib: usize,

    /// Fail the launch on unsynchronized local memory access
    #[arg(long, global = true)]
    check_hazards: bool,
}

impl DeviceArgs {
    fn config(&self) -> DeviceConfig {
        let mut cfg = DeviceConfig::default()
            .with_max_work_group_size(self.max_work_group_size)
            .with_local_mem_bytes(self.local_mem_bytes)
            .with_work_item_stack_bytes(self.work_item_stack_kib * 1024)
            .with_hazard_checks(self.check_hazards);
        if let Some(units) = self.compute_units {
            cfg = cfg.with_compute_units(units);
        }
        cfg
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tiled N x N matrix multiplication with verification
    Gemm(GemmArgs),
    /// Store each global id in local memory, barrier, and read it back
    LocalCheck(LinearArgs),
    /// Write each global id of a 1-D launch and print the buffer
    Iota(LinearArgs),
}

#[derive(Args, Debug)]
struct GemmArgs {
    /// Matrix dimension N
    #[arg(short = 'n', long, default_value_t = 1024)]
    size: usize,

    /// Tile and work-group dimension B; must divide N
    #[arg(short = 'b', long, default_value_t = 4)]
    tile: usize,

    /// Seed for the input matrices
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Element type
    #[arg(long, value_enum, default_value_t = DTypeArg::F32)]
    dtype: DTypeArg,

    /// Implementation that computes C
    #[arg(long, value_enum, default_value_t = BackendArg::Tiled)]
    backend: BackendArg,
}

#[derive(Args, Debug)]
struct LinearArgs {
    /// Global range
    #[arg(short, long, default_value_t = 256)]
    global: usize,

    /// Local range (work-group size)
    #[arg(short, long, default_value_t = 64)]
    local: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DTypeArg {
    F32,
    F64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Tiled,
    Serial,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let device = cli.device.config();
    info!(
        device = %device.name,
        compute_units = device.compute_units,
        max_work_group_size = device.max_work_group_size,
        local_mem_bytes = device.local_mem_bytes,
        "device ready"
    );
    println!("Running on {}", device.name);
    let queue = Queue::new(device);

    match cli.command {
        Command::Gemm(args) => match args.dtype {
            DTypeArg::F32 => run_gemm::<f32>(&queue, &args),
            DTypeArg::F64 => run_gemm::<f64>(&queue, &args),
        },
        Command::LocalCheck(args) => run_local_check(&queue, &args),
        Command::Iota(args) => run_iota(&queue, &args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_gemm<T: Element + SampleUniform>(queue: &Queue, args: &GemmArgs) -> Result<()> {
    let n = args.size;
    let a = Matrix::<T>::random(n, args.seed);
    let b = Matrix::<T>::random(n, args.seed.wrapping_add(1));
    println!("Problem size: c({n},{n}) = a({n},{n}) * b({n},{n}), {}", T::DTYPE);

    let backend: Box<dyn GemmBackend<T>> = match args.backend {
        BackendArg::Tiled => Box::new(TiledGemm::new(queue.clone(), args.tile)),
        BackendArg::Serial => Box::new(SerialBackend::new()),
    };

    let start = Instant::now();
    let c = backend
        .gemm(&a, &b)
        .with_context(|| format!("{} gemm with N={} B={}", backend.name(), n, args.tile))?;
    let elapsed = start.elapsed();
    println!(
        "{} backend: {:.3} ms",
        backend.name(),
        elapsed.as_secs_f64() * 1e3
    );

    let report = Verifier::default()
        .verify(&a, &b, &c)
        .context("verification")?;
    println!("{report}");
    if !report.passed() {
        bail!(
            "{} of {} elements outside tolerance",
            report.mismatches.len(),
            report.checked
        );
    }
    Ok(())
}

fn run_local_check(queue: &Queue, args: &LinearArgs) -> Result<()> {
    let nd = NdRange::linear(args.global, args.local).context("invalid launch range")?;
    let unexpected = Mutex::new(Vec::new());

    queue
        .launch::<f64, _>(nd, &[Range2::new(1, args.local)], |item| {
            let x = item.global_linear_id();
            let y = item.local_linear_id();
            let slm = item.tile(0)?;
            slm.store(0, y, x as f64)?;
            item.barrier()?;
            let got = slm.load(0, y)?;
            if got != x as f64 {
                unexpected
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push((got, x));
            }
            Ok(())
        })
        .context("local memory check launch")?;

    let unexpected = unexpected.into_inner().unwrap_or_else(|p| p.into_inner());
    for (got, expected) in &unexpected {
        println!("unexpected value: {got} {expected}");
    }
    debug!(checked = args.global, "local memory check complete");
    if !unexpected.is_empty() {
        bail!("{} work-items read back a foreign value", unexpected.len());
    }
    println!("SUCCESS - {} work-items read back their own id", args.global);
    Ok(())
}

fn run_iota(queue: &Queue, args: &LinearArgs) -> Result<()> {
    let nd = NdRange::linear(args.global, args.local).context("invalid launch range")?;
    let out = WriteOnceBuffer::<f64>::new(nd.global());

    queue
        .launch::<f64, _>(nd, &[], |item| {
            out.write(item.global_id(), item.global_linear_id() as f64)
        })
        .context("iota launch")?;

    for (i, v) in out.into_vec().iter().enumerate() {
        println!("A[ {i} ] = {v}");
    }
    Ok(())
}
