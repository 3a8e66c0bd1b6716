//! Command-line frontend: one subcommand
//! per evolutionary algorithm, each taking the CGP topology, the kernel set,
//! the dataset, and the usual population/generation/seed knobs. Mirrors the
//! original CLI's `clap::Command` builder style rather than the derive API.

use clap::{value_parser, Arg, ArgMatches, Command};

use crate::algorithms::{Es4Cgp, Gd4Cgp, MoEs4Cgp, MoMes4Cgp, Mes4Cgp};
use crate::dataset;
use crate::error::{CgpError, CgpResult};
use crate::expression::Expression;
use crate::kernel::KernelSet;
use crate::logging;
use crate::population::Population;
use crate::problem::{Problem, SymbolicRegressionProblem};
use crate::rng::RandomEngine;

use std::sync::Arc;

fn topology_args() -> Vec<Arg> {
    vec![
        Arg::new("file")
            .short('f')
            .long("file")
            .help("CSV dataset; the last column of each row is the regression target")
            .required(true)
            .value_parser(value_parser!(String)),
        Arg::new("ephemeral")
            .short('k')
            .long("ephemeral")
            .help("Number of ephemeral (trainable real) constants")
            .default_value("1")
            .value_parser(value_parser!(usize)),
        Arg::new("rows")
            .short('r')
            .long("rows")
            .help("CGP grid rows")
            .default_value("1")
            .value_parser(value_parser!(usize)),
        Arg::new("columns")
            .short('c')
            .long("columns")
            .help("CGP grid columns")
            .default_value("15")
            .value_parser(value_parser!(usize)),
        Arg::new("levels-back")
            .short('l')
            .long("levels-back")
            .help("Levels-back connectivity window")
            .default_value("16")
            .value_parser(value_parser!(usize)),
        Arg::new("arity")
            .short('a')
            .long("arity")
            .help("Maximum kernel arity")
            .default_value("2")
            .value_parser(value_parser!(usize)),
        Arg::new("kernels")
            .long("kernels")
            .help("Comma-separated kernel names, e.g. sum,diff,mul,div")
            .default_value("sum,diff,mul,div")
            .value_parser(value_parser!(String)),
        Arg::new("population")
            .short('p')
            .long("population")
            .help("Population size")
            .default_value("20")
            .value_parser(value_parser!(usize)),
        Arg::new("generations")
            .short('g')
            .long("generations")
            .help("Number of generations")
            .default_value("100")
            .value_parser(value_parser!(usize)),
        Arg::new("max-mutations")
            .long("max-mutations")
            .help("Upper bound on active genes mutated per individual per generation")
            .default_value("3")
            .value_parser(value_parser!(usize)),
        Arg::new("seed")
            .long("seed")
            .help("RNG seed; omit for OS entropy")
            .value_parser(value_parser!(u64)),
        Arg::new("verbose")
            .short('v')
            .action(clap::ArgAction::Count)
            .help("Increase log verbosity (repeatable)"),
    ]
}

pub fn build() -> Command {
    Command::new("cgp_engine")
        .version("0.1.0")
        .about(
            "Cartesian Genetic Programming engine for symbolic regression and \
             differentiable program synthesis",
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("es4cgp")
                .about("Evolutionary strategy, no local search on constants")
                .args(topology_args()),
        )
        .subcommand(
            Command::new("mes4cgp")
                .about("Memetic evolutionary strategy with a Newton step on constants")
                .args(topology_args()),
        )
        .subcommand(
            Command::new("gd4cgp")
                .about("Memetic evolutionary strategy with gradient-descent on constants")
                .args(topology_args())
                .arg(
                    Arg::new("eta")
                        .long("eta")
                        .help("Gradient-descent learning rate")
                        .default_value("0.01")
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new("moes4cgp")
                .about("Multi-objective evolutionary strategy (loss, complexity)")
                .args(topology_args()),
        )
        .subcommand(
            Command::new("momes4cgp")
                .about("Multi-objective memetic evolutionary strategy (loss, complexity)")
                .args(topology_args()),
        )
}

struct Topology {
    dataset: dataset::Dataset,
    k: usize,
    r: usize,
    c: usize,
    l: usize,
    a: usize,
    kernel_names: Vec<String>,
    pop_size: usize,
    generations: u64,
    max_mut: usize,
    seed: Option<u64>,
    verbosity: u8,
}

fn parse_topology(m: &ArgMatches) -> CgpResult<Topology> {
    let file = m.get_one::<String>("file").unwrap();
    let dataset = dataset::read_csv(file)?;
    let kernel_names: Vec<String> = m
        .get_one::<String>("kernels")
        .unwrap()
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();
    Ok(Topology {
        k: *m.get_one::<usize>("ephemeral").unwrap(),
        r: *m.get_one::<usize>("rows").unwrap(),
        c: *m.get_one::<usize>("columns").unwrap(),
        l: *m.get_one::<usize>("levels-back").unwrap(),
        a: *m.get_one::<usize>("arity").unwrap(),
        kernel_names,
        pop_size: *m.get_one::<usize>("population").unwrap(),
        generations: *m.get_one::<usize>("generations").unwrap() as u64,
        max_mut: *m.get_one::<usize>("max-mutations").unwrap(),
        seed: m.get_one::<u64>("seed").copied(),
        verbosity: m.get_count("verbose"),
        dataset,
    })
}

fn build_problem(topo: &Topology, multi_objective: bool) -> CgpResult<Arc<dyn Problem>> {
    let n_features = topo.dataset.n_features();
    let m = topo.dataset.n_outputs();
    let names: Vec<&str> = topo.kernel_names.iter().map(|s| s.as_str()).collect();
    let kernels: KernelSet<f64> = KernelSet::from_names(&names)?;
    let cgp = Expression::new(
        topo.k + n_features,
        m,
        topo.r,
        topo.c,
        topo.l,
        topo.a,
        kernels,
        topo.seed,
    )?;
    let problem = SymbolicRegressionProblem::new(
        cgp,
        topo.kernel_names.clone(),
        topo.k,
        topo.dataset.points.clone(),
        topo.dataset.labels.clone(),
        multi_objective,
        (-10.0, 10.0),
    )?;
    Ok(Arc::new(problem))
}

fn seed_population(problem: Arc<dyn Problem>, size: usize, seed: Option<u64>) -> CgpResult<Population> {
    if size < 2 {
        return Err(CgpError::InvalidArgument(
            "population size must be at least 2".into(),
        ));
    }
    let mut pop = Population::new(problem);
    let (lb, ub) = pop.get_problem().get_bounds();
    let mut rng = RandomEngine::new(seed);
    for _ in 0..size {
        let x: Vec<f64> = lb
            .iter()
            .zip(ub.iter())
            .map(|(&l, &u)| {
                if l == u {
                    l
                } else {
                    rng.gen_f64_range(l, u)
                }
            })
            .collect();
        let f = pop.get_problem().fitness(&x)?;
        pop.push_back(x, f);
    }
    Ok(pop)
}

fn report(pop: &Population) {
    if let Some(i) = pop.best_index_single_objective() {
        log::info!(
            "best loss so far: {:.6} (fevals={})",
            pop.get_f()[i][0],
            pop.get_problem().get_fevals()
        );
    }
}

pub fn run() -> CgpResult<()> {
    let matches = build().get_matches();
    let (name, sub) = matches.subcommand().expect("subcommand is required");
    let topo = parse_topology(sub)?;
    logging::init(logging::level_from_verbosity(topo.verbosity));

    match name {
        "es4cgp" => {
            let problem = build_problem(&topo, false)?;
            let mut pop = seed_population(problem, topo.pop_size, topo.seed)?;
            let mut algo = Es4Cgp::new(topo.max_mut, topo.seed)?;
            algo.set_verbosity(topo.verbosity as u32);
            algo.evolve(&mut pop, topo.generations)?;
            report(&pop);
        }
        "mes4cgp" => {
            let problem = build_problem(&topo, false)?;
            let mut pop = seed_population(problem, topo.pop_size, topo.seed)?;
            let mut algo = Mes4Cgp::new(topo.max_mut, topo.seed)?;
            algo.set_verbosity(topo.verbosity as u32);
            algo.evolve(&mut pop, topo.generations)?;
            report(&pop);
        }
        "gd4cgp" => {
            let eta = *sub.get_one::<f64>("eta").unwrap();
            let problem = build_problem(&topo, false)?;
            let mut pop = seed_population(problem, topo.pop_size, topo.seed)?;
            let mut algo = Gd4Cgp::new(topo.max_mut, eta, topo.seed)?;
            algo.set_verbosity(topo.verbosity as u32);
            algo.evolve(&mut pop, topo.generations)?;
            report(&pop);
        }
        "moes4cgp" => {
            let problem = build_problem(&topo, true)?;
            let mut pop = seed_population(problem, topo.pop_size, topo.seed)?;
            let mut algo = MoEs4Cgp::new(topo.max_mut, topo.seed)?;
            algo.set_verbosity(topo.verbosity as u32);
            algo.evolve(&mut pop, topo.generations)?;
            report(&pop);
        }
        "momes4cgp" => {
            let problem = build_problem(&topo, true)?;
            let mut pop = seed_population(problem, topo.pop_size, topo.seed)?;
            let mut algo = MoMes4Cgp::new(topo.max_mut, topo.seed)?;
            algo.set_verbosity(topo.verbosity as u32);
            algo.evolve(&mut pop, topo.generations)?;
            report(&pop);
        }
        other => {
            return Err(CgpError::InvalidArgument(format!(
                "unknown subcommand: {other}"
            )))
        }
    }
    Ok(())
}
