use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rust_vmc::config::read_run_config;
use rust_vmc::Result;

#[derive(Parser, Debug)]
#[command(version, about = "Variational Monte Carlo with noisy optimizers", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Samples for the final energy estimate, defaults to the configured n_steps
    #[arg(short = 'n', long)]
    final_steps: Option<usize>,
}

fn run(args: &Args) -> Result<()> {
    let config = read_run_config(&args.config)?;
    let mut vmc = config.build()?;

    let initial = vmc.compute_variational_energy(config.n_steps)?;
    info!("Initial energy: {:.6} ± {:.6}", initial.mean[0], initial.error[0]);

    if let Some(result) = config.optimize(&mut vmc)? {
        info!("Optimized parameters: {:?} ({:?})", result.x, result.termination);
    }

    let n_final = args.final_steps.unwrap_or(config.n_steps);
    let e = vmc.compute_variational_energy(n_final)?;
    println!("VMC Results");
    println!("-----------");
    println!("Parameters: {:?}", vmc.wave_function().vp());
    println!("Total energy:      {:.6} ± {:.6}", e.mean[0], e.error[0]);
    println!("Potential energy:  {:.6} ± {:.6}", e.mean[1], e.error[1]);
    println!("Kinetic (PB):      {:.6} ± {:.6}", e.mean[2], e.error[2]);
    println!("Kinetic (JF):      {:.6} ± {:.6}", e.mean[3], e.error[3]);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
