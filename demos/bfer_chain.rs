//! Example: bit/frame error rate over a polar-coded chain
//!
//! Wires a full chain through the module/task/socket framework:
//! random source -> polar encoder -> bit-flip channel -> SC decoder,
//! then reports BER/FER and per-task timing statistics.
//!
//! Usage:
//!   cargo run --release --example bfer_chain -- --n-stages 3 --k 4 --flips 1
//!
//! With --flips 0 the chain is noiseless and must decode error-free.

use clap::Parser;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use fecsim::code::kernel_arikan;
use fecsim::{Bit, Llr, PolarCode, PolarDecoder, PolarEncoder, SocketBuffer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of polar composition stages (N = 2^n_stages)
    #[arg(long, default_value = "4")]
    n_stages: u32,

    /// Information bits per frame (defaults to N/2)
    #[arg(short, long)]
    k: Option<usize>,

    /// Frames per task call
    #[arg(long, default_value = "4")]
    frames: usize,

    /// Number of task calls
    #[arg(long, default_value = "250")]
    calls: usize,

    /// Codeword bits flipped by the channel, per frame
    #[arg(long, default_value = "1")]
    flips: usize,

    /// RNG seed
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let n = 2usize.pow(args.n_stages);
    let k = args.k.unwrap_or(n / 2);
    let frames = args.frames;
    if k == 0 || k > n {
        return Err(format!("K has to be in 1..={n} (got {k})").into());
    }

    let code = PolarCode::mono(kernel_arikan(), args.n_stages as usize)?;
    // demo mask: freeze the low lanes, information on the high lanes
    let frozen: Vec<bool> = (0..n).map(|lane| lane < n - k).collect();

    let mut encoder = PolarEncoder::new(k, n, &code, &frozen, frames)?;
    let mut decoder = PolarDecoder::new(k, n, &code, &frozen, frames, 1)?;

    // external buffers feed the chain's open inputs
    let u_buf = SocketBuffer::zeroed(fecsim::ElementKind::U8, k * frames).into_handle();
    let y_buf = SocketBuffer::zeroed(fecsim::ElementKind::F32, n * frames).into_handle();
    encoder
        .module_mut()
        .task_mut("encode")?
        .socket_mut("U_K")?
        .attach(u_buf)?;
    decoder
        .module_mut()
        .task_mut("decode_siho")?
        .socket_mut("Y_N")?
        .attach(y_buf)?;

    info!(n, k, frames, calls = args.calls, flips = args.flips, "chain ready");

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut bit_errors = 0usize;
    let mut frame_errors = 0usize;

    for _ in 0..args.calls {
        // source
        let u_all: Vec<Bit> = (0..k * frames).map(|_| rng.gen_range(0..2)).collect();
        encoder
            .module()
            .task("encode")?
            .socket("U_K")?
            .data_mut::<Bit>()?
            .copy_from_slice(&u_all);
        encoder.module_mut().task_mut("encode")?.exec()?;

        // bit-flip channel + BPSK-style LLR mapping
        {
            let x_all = encoder.module().task("encode")?.socket("X_N")?.data::<Bit>()?;
            let mut y_all = decoder
                .module()
                .task("decode_siho")?
                .socket("Y_N")?
                .data_mut::<Llr>()?;
            for f in 0..frames {
                let mut x_f: Vec<Bit> = x_all[f * n..(f + 1) * n].to_vec();
                let mut lanes: Vec<usize> = (0..n).collect();
                lanes.shuffle(&mut rng);
                for &lane in lanes.iter().take(args.flips) {
                    x_f[lane] ^= 1;
                }
                for (y, &x) in y_all[f * n..(f + 1) * n].iter_mut().zip(&x_f) {
                    *y = if x == 0 { 8.0 } else { -8.0 };
                }
            }
        }

        decoder.module_mut().task_mut("decode_siho")?.exec()?;

        let v_all = decoder
            .module()
            .task("decode_siho")?
            .socket("V_K")?
            .data::<Bit>()?;
        for f in 0..frames {
            let errs = u_all[f * k..(f + 1) * k]
                .iter()
                .zip(&v_all[f * k..(f + 1) * k])
                .filter(|(u, v)| u != v)
                .count();
            bit_errors += errs;
            frame_errors += usize::from(errs > 0);
        }
    }

    let total_bits = k * frames * args.calls;
    let total_frames = frames * args.calls;
    println!();
    println!("chain: N = {n}, K = {k}, {total_frames} frames, {} flipped bits/frame", args.flips);
    println!(
        "BER = {:.3e}   FER = {:.3e}",
        bit_errors as f64 / total_bits as f64,
        frame_errors as f64 / total_frames as f64
    );

    println!();
    println!("task statistics:");
    for module in [encoder.module(), decoder.module()] {
        for task in module.tasks() {
            if task.n_calls() == 0 {
                continue;
            }
            println!(
                "  {}::{:<14} calls = {:<6} avg = {:>9.2?} min = {:>9.2?} max = {:>9.2?}",
                module.name(),
                task.name(),
                task.n_calls(),
                task.stats().avg(),
                task.stats().min(),
                task.stats().max(),
            );
            for (key, phase) in task.phases().iter() {
                if phase.n_calls() == 0 {
                    continue;
                }
                println!(
                    "    - {:<12} calls = {:<6} avg = {:>9.2?} total = {:>9.2?}",
                    key,
                    phase.n_calls(),
                    phase.avg(),
                    phase.total(),
                );
            }
        }
    }

    Ok(())
}
