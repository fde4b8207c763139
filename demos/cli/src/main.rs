use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, ensure};
use clap::Parser;
use env_logger::Env;
use log::info;
use rayon::prelude::*;

use frep::{
    compiler::{CompilerConfig, compile},
    context::{Context, Node},
    passes::merge_axes,
    tape::Tape,
};

/// The sphere `x² + y² + z² - 100`, used when no input file is given
const SPHERE: &str = "
_0 var-x
_1 mul _0 _0
_2 var-y
_3 mul _2 _2
_4 add _1 _3
_5 var-z
_6 mul _5 _5
_7 add _4 _6
_8 const 100
_9 sub _7 _8
";

/// Compiles implicit-surface expressions into tapes
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input files, in the flat text format (uses a sphere if empty)
    inputs: Vec<PathBuf>,

    /// Skip constant folding and algebraic simplification
    #[clap(long)]
    no_simplify: bool,

    /// Print every instruction and constant
    #[clap(short, long)]
    detailed: bool,

    /// Name of a `.dot` file to write with the canonicalized graph
    #[clap(long)]
    dot: Option<PathBuf>,

    /// Label graph edges with the input position
    #[clap(long, requires = "dot")]
    label_edges: bool,

    /// Name of a file to write with the serialized tape
    #[clap(short, long)]
    out: Option<PathBuf>,

    /// Evaluate the tape at a point, given as `x,y,z,t`
    #[clap(long, value_parser = parse_point)]
    eval: Option<[f32; 4]>,
}

fn parse_point(s: &str) -> Result<[f32; 4], String> {
    let v = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<f32>, _>>()?;
    v.try_into()
        .map_err(|v: Vec<f32>| format!("expected 4 values, got {}", v.len()))
}

struct Job {
    name: String,
    ctx: Context,
    root: Node,
}

struct Compiled {
    name: String,
    tape: Tape,
    dot: Option<String>,
}

fn run(mut job: Job, args: &Args, cfg: &CompilerConfig) -> Result<Compiled> {
    let dot = if args.dot.is_some() {
        let root = merge_axes(&mut job.ctx, job.root)?;
        Some(job.ctx.dot(root, args.label_edges)?)
    } else {
        None
    };

    let start = Instant::now();
    let tape = compile(&mut job.ctx, job.root, cfg)?;
    info!("Compiled {} in {:?}", job.name, start.elapsed());

    Ok(Compiled {
        name: job.name,
        tape,
        dot,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();

    let args = Args::parse();
    ensure!(
        args.inputs.len() <= 1 || (args.dot.is_none() && args.out.is_none()),
        "--dot and --out can only be used with a single input"
    );
    let cfg = CompilerConfig {
        simplify: !args.no_simplify,
        ..Default::default()
    };

    let now = Instant::now();
    let jobs = if args.inputs.is_empty() {
        let (ctx, root) = Context::from_text(SPHERE.as_bytes())?;
        vec![Job {
            name: "sphere".to_owned(),
            ctx,
            root,
        }]
    } else {
        args.inputs
            .iter()
            .map(|path| -> Result<Job> {
                let file = std::fs::File::open(path)?;
                let (ctx, root) = Context::from_text(file)?;
                Ok(Job {
                    name: path.display().to_string(),
                    ctx,
                    root,
                })
            })
            .collect::<Result<Vec<_>>>()?
    };
    info!("Loaded {} file(s) in {:?}", jobs.len(), now.elapsed());

    // Independent expressions can be compiled in parallel
    let compiled = jobs
        .into_par_iter()
        .map(|job| run(job, &args, &cfg))
        .collect::<Result<Vec<_>>>()?;

    for c in &compiled {
        if compiled.len() > 1 {
            println!("== {} ==", c.name);
        }
        print!("{}", c.tape.dump(args.detailed));
        if let Some([x, y, z, t]) = args.eval {
            let v = c.tape.eval(x, y, z, t)?;
            println!("f({x}, {y}, {z}, {t}) = {v}");
        }
        if let (Some(path), Some(dot)) = (&args.dot, &c.dot) {
            std::fs::write(path, dot)?;
            info!("Wrote graph to {}", path.display());
        }
        if let Some(path) = &args.out {
            std::fs::write(path, bincode::serialize(&c.tape)?)?;
            info!("Wrote tape to {}", path.display());
        }
    }
    Ok(())
}
