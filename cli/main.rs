#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use gpdeform::model::{DeformConfig, EigenBasisRecord};
use gpdeform::sampling::{GpSampler, SamplingConfig};
use gpdeform::space::TransformationSpace;
use gpdeform::types::{ParameterVector, Point1};

#[derive(Parser)]
#[command(
    name = "gpdeform",
    about = "Build and exercise Gaussian-process deformation spaces",
    long_about = "Builds low-rank deformation models from a Gaussian-process kernel using the \
                  Nystrom method, draws prior samples, and evaluates parametric deformations."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the eigenbasis described by a configuration file
    #[command(about = "Build a transformation space (outputs: basis.toml)")]
    Build(BuildArgs),

    /// Draw samples of the configured process at the domain points
    #[command(about = "Sample the Gaussian process on its domain (outputs: TSV on stdout)")]
    Sample(SampleArgs),

    /// Evaluate a stored transformation space for one parameter vector
    #[command(about = "Deform the domain of a stored basis (outputs: TSV on stdout)")]
    Evaluate(EvaluateArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Path to the TOML configuration
    config: PathBuf,

    /// Where to write the fitted eigenbasis
    #[arg(long, default_value = "basis.toml")]
    output: PathBuf,
}

#[derive(Args)]
struct SampleArgs {
    /// Path to the TOML configuration
    config: PathBuf,

    /// Number of independent draws
    #[arg(long, default_value = "1")]
    count: usize,

    /// Overrides the seed from the configuration
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Path to a basis written by `build`
    basis: PathBuf,

    /// Comma-separated parameter values, one per retained eigenpair
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    parameters: Vec<f64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Build(args)) => build(args),
        Some(Commands::Sample(args)) => sample(args),
        Some(Commands::Evaluate(args)) => evaluate(args),
        None => {
            let _ = Cli::command().print_help();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn build(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = DeformConfig::load(&args.config)?;
    let space = config.build_space()?;

    let basis = space.basis();
    println!(
        "Retained {} of {} requested eigenpairs over {} landmarks",
        basis.len(),
        basis.requested(),
        basis.landmarks().len()
    );
    for pair in space.eigen_pairs() {
        println!("  λ_{:<3} {:.6e}", pair.index(), pair.eigenvalue());
    }

    EigenBasisRecord::from_space(&space)?.save(&args.output)?;
    println!("Eigenbasis written to {}", args.output.display());
    Ok(())
}

fn sample(args: SampleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = DeformConfig::load(&args.config)?;
    let domain = config.domain()?;
    let sampling = SamplingConfig {
        seed: args.seed.or(config.sampling.seed),
        ..config.sampling
    };
    let mut sampler = GpSampler::new(config.gaussian_process()?, sampling);
    let draws = sampler.draw_many(domain.points(), args.count)?;

    let header: Vec<String> = (0..args.count).map(|i| format!("sample_{i}")).collect();
    println!("x\t{}", header.join("\t"));
    for (j, p) in domain.iter().enumerate() {
        let values: Vec<String> = draws.column(j).iter().map(|v| v.to_string()).collect();
        println!("{}\t{}", p.x(), values.join("\t"));
    }
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let space = EigenBasisRecord::load(&args.basis)?.into_space()?;
    let transformation = space.apply(ParameterVector::from(args.parameters))?;

    println!("x\tdeformed");
    let points: Vec<Point1> = space.domain().points().to_vec();
    for (p, q) in points.iter().zip(transformation.evaluate_many(&points)) {
        println!("{}\t{}", p.x(), q.x());
    }
    Ok(())
}
