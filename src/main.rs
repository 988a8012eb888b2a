use gridmg::solver::gpu::{GpuContext, GridBuffer, MultigridEngine};
use gridmg::solver::options::MIN_GRID_DIM;
use gridmg::solver::{ManufacturedProblem, MultigridConfig};
use std::sync::Arc;
use std::time::Instant;

fn usage() -> &'static str {
    "Usage:
  gridmg <mode> [width height pre post cycles] [--omega W]

Modes:
  fmg | 0         full multigrid
  smooth | 1      relaxation only (`pre` sweeps)
  multigrid | 2   V-cycles from a zero initial guess

Defaults: 9 9 5 5 1, omega 1.
Environment: GRIDMG_MIN_COARSE_DIM, GRIDMG_MAX_LEVELS, GRIDMG_COARSE_SWEEPS."
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Fmg,
    Smooth,
    Multigrid,
}

impl Mode {
    fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "fmg" | "0" => Ok(Self::Fmg),
            "smooth" | "1" => Ok(Self::Smooth),
            "multigrid" | "2" => Ok(Self::Multigrid),
            other => Err(format!("unknown mode '{other}'")),
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Fmg => "FMG Solver",
            Self::Smooth => "Smoother Solver",
            Self::Multigrid => "Multigrid Solver",
        }
    }
}

#[derive(Debug)]
struct RunArgs {
    mode: Mode,
    width: u32,
    height: u32,
    pre: u32,
    post: u32,
    cycles: u32,
    omega: f32,
}

fn parse_args(args: &[String]) -> Result<RunArgs, String> {
    let Some(mode) = args.first() else {
        return Err("missing mode".to_string());
    };
    let mode = Mode::parse(mode)?;

    let mut numbers = [9u32, 9, 5, 5, 1];
    let mut positional = 0usize;
    let mut omega = 1.0f32;

    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "--omega" => {
                let raw = args.get(i + 1).ok_or("--omega requires a value")?;
                omega = raw
                    .parse::<f32>()
                    .map_err(|err| format!("invalid --omega value '{raw}': {err}"))?;
                i += 2;
            }
            "-h" | "--help" => return Err(String::new()),
            raw => {
                if positional >= numbers.len() {
                    return Err(format!("unexpected argument '{raw}'"));
                }
                numbers[positional] = raw
                    .parse::<u32>()
                    .map_err(|err| format!("invalid integer '{raw}': {err}"))?;
                positional += 1;
                i += 1;
            }
        }
    }

    let [width, height, pre, post, cycles] = numbers;
    if width < MIN_GRID_DIM || height < MIN_GRID_DIM {
        return Err(format!(
            "grid must be at least {MIN_GRID_DIM}x{MIN_GRID_DIM}, got {width}x{height}"
        ));
    }
    Ok(RunArgs {
        mode,
        width,
        height,
        pre,
        post,
        cycles,
        omega,
    })
}

fn run(args: RunArgs) -> Result<(), String> {
    let context = Arc::new(GpuContext::new_blocking().map_err(|err| err.to_string())?);
    log::info!(
        "adapter: {} ({:?})",
        context.adapter_info.name,
        context.adapter_info.backend
    );
    let config = MultigridConfig::from_env();
    let mut engine = MultigridEngine::new(
        Arc::clone(&context),
        gridmg::RectangularBoundary,
        config,
    )
    .map_err(|err| err.to_string())?;

    let problem = ManufacturedProblem::polynomial();
    let rhs_host = problem.rhs(args.width as usize, args.height as usize);
    let rhs = GridBuffer::from_host(&context, &rhs_host).map_err(|err| err.to_string())?;

    println!("{}", args.mode.title());
    let start = Instant::now();
    let solution = match args.mode {
        Mode::Fmg => engine.fmg(&rhs, args.omega, args.pre, args.post, args.cycles),
        Mode::Smooth => {
            let mut solution = GridBuffer::empty(&context, args.width, args.height)
                .map_err(|err| err.to_string())?;
            let mut scratch = GridBuffer::empty(&context, args.width, args.height)
                .map_err(|err| err.to_string())?;
            engine
                .smoother_iterate(&mut solution, &mut scratch, &rhs, args.omega, args.pre)
                .map(|()| solution)
        }
        Mode::Multigrid => GridBuffer::empty(&context, args.width, args.height).and_then(|initial| {
            engine.iterate(&initial, &rhs, args.omega, args.pre, args.post, args.cycles)
        }),
    }
    .map_err(|err| err.to_string())?;
    engine.wait().map_err(|err| err.to_string())?;
    println!("Total time: {:.5}", start.elapsed().as_secs_f64());

    let answer = solution.to_host(&context).map_err(|err| err.to_string())?;
    if let (Some(l2), Some(linf)) = (problem.l2_error(&answer), problem.linf_error(&answer)) {
        println!("L2 Err: {l2:.5}");
        println!("LInf Err: {linf:.5}");
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            if !err.is_empty() {
                eprintln!("{err}");
            }
            eprintln!("{}", usage());
            std::process::exit(1);
        }
    };

    if let Err(err) = run(parsed) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
