use cinnamon_pack::math::primes::PrimeChain;
use cinnamon_pack::pack::program::{mnist_program_io, STAGES};
use cinnamon_pack::params::{load_image, ModelParams};
use cinnamon_pack::PackError;
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser, Debug)]
struct Args {
    /// Model parameter bundle (JSON)
    #[arg(long)]
    params: PathBuf,
    /// Input image tensor (JSON)
    #[arg(long)]
    image: PathBuf,
    /// Level of the encrypted image
    #[arg(long, default_value_t = 16)]
    level: usize,
    /// Where to write the packed operands
    #[arg(long)]
    output: Option<PathBuf>,
}

fn run(args: &Args) -> Result<(), PackError> {
    let start = Instant::now();
    let model = ModelParams::load(&args.params)?;
    let image = load_image(&args.image)?;
    let loaded = Instant::now();
    info!("{:?} to load inputs", loaded - start);

    let io = mnist_program_io(&image, args.level, &model, PrimeChain::global())?;
    let packed = Instant::now();

    eprintln!("Packed {} operands at level {}", io.operands.len(), args.level);
    eprintln!("Output scales:");
    for stage in STAGES {
        if let Some(scale) = io.output_scales.get(stage) {
            eprintln!("    {}: {:e} ({})", stage, scale.to_f64(), scale);
        }
    }

    if let Some(path) = &args.output {
        let write_error = |reason: String| PackError::OutputWrite {
            path: path.display().to_string(),
            reason,
        };
        let file = File::create(path).map_err(|e| write_error(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &io).map_err(|e| write_error(e.to_string()))?;
        writer.flush().map_err(|e| write_error(e.to_string()))?;
        info!("{:?} to write {}", Instant::now() - packed, path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
