//! Command-line front end: parse an input file, run the requested
//! prover, and report answers and statistics.
#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use glossa::{
    BackwardConfig, BackwardProver, ForwardOutcome, InputFile, Lexicon, Parser,
    ReteNetwork, SearchParams,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_banner() {
    println!("glossa {VERSION}");
    println!("Symbolic rule learning for quasi-natural-language inference");
    println!();
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} [options] [input-file]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -h, --help       Show this help message");
    eprintln!("  -v, --version    Show version information");
    eprintln!();
    eprintln!("If no input file is provided, reads from stdin.");
    eprintln!();
    eprintln!("Input files contain `set(...)`/`assign(...)` commands and");
    eprintln!("`list(rules)`, `list(assumptions)`, `list(goals)` sections;");
    eprintln!("`set(forward).` selects the forward prover.");
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let mut input_path: Option<&str> = None;
    for arg in &args[1..] {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&args[0]);
                return;
            }
            "-v" | "--version" => {
                println!("glossa {VERSION}");
                return;
            }
            path if !path.starts_with('-') => input_path = Some(path),
            unknown => {
                eprintln!("Unknown option: {unknown}");
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    print_banner();

    let source = match input_path {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|err| {
            eprintln!("Failed to read {path}: {err}");
            process::exit(1);
        }),
        None => {
            let mut buffer = String::new();
            if let Err(err) = io::stdin().read_to_string(&mut buffer) {
                eprintln!("Failed to read stdin: {err}");
                process::exit(1);
            }
            buffer
        }
    };

    if let Err(err) = run(&source) {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn run(source: &str) -> Result<(), String> {
    let file = Parser::new()
        .parse_str(source)
        .map_err(|err| err.to_string())?;
    let lexicon = Lexicon::new();

    let rules = match file.list("rules") {
        Some(section) => section
            .weighted_rules(&lexicon)
            .map_err(|err| err.to_string())?,
        None => Vec::new(),
    };
    let assumptions = match file.list("assumptions") {
        Some(section) => section.sentences(&lexicon).map_err(|err| err.to_string())?,
        None => Vec::new(),
    };
    let goals = match file.list("goals") {
        Some(section) => section.sentences(&lexicon).map_err(|err| err.to_string())?,
        None => Vec::new(),
    };

    println!(
        "Parsed {} rules, {} assumptions, {} goals",
        rules.len(),
        assumptions.len(),
        goals.len()
    );
    println!();

    let params = params_from(&file);
    if file.flag("forward") {
        run_forward(rules, &assumptions, &goals, &lexicon)
    } else {
        run_backward(rules, assumptions, &goals, &lexicon, &params, &file)
    }
}

fn params_from(file: &InputFile) -> SearchParams {
    let mut params = SearchParams::default();
    if let Some(value) = file.param("weight_limit").and_then(|v| v.parse().ok()) {
        params.weight_limit = value;
    }
    if let Some(value) = file.param("unify_depth").and_then(|v| v.parse().ok()) {
        params.unify_depth_limit = value;
    }
    if let Some(value) = file.param("max_depth").and_then(|v| v.parse().ok()) {
        params.max_proof_depth = value;
    }
    params
}

fn run_forward(
    rules: Vec<(glossa::Rule, f64)>,
    assumptions: &[glossa::Sentence],
    goals: &[glossa::Sentence],
    lexicon: &Lexicon,
) -> Result<(), String> {
    let mut network = ReteNetwork::new(rules);
    let mut derived = 0usize;
    let mut reached_goal = false;
    let outcome = network.run(assumptions, |fact, rule| {
        match rule {
            Some(_) => {
                derived += 1;
                println!("derived: {}", fact.render(lexicon));
            }
            None => println!("assume:  {}", fact.render(lexicon)),
        }
        if goals.iter().any(|goal| goal == fact) {
            println!("goal reached: {}", fact.render(lexicon));
            reached_goal = true;
            return false;
        }
        true
    });

    println!();
    match outcome {
        ForwardOutcome::Saturated { facts } => {
            println!("Saturated with {facts} facts ({derived} derived)");
            if !goals.is_empty() && !reached_goal {
                println!("No goal was reached");
            }
        }
        ForwardOutcome::Cancelled { facts } => {
            println!("Stopped after {facts} facts ({derived} derived)");
        }
    }
    print_stats(network.stats());
    Ok(())
}

fn run_backward(
    rules: Vec<(glossa::Rule, f64)>,
    assumptions: Vec<glossa::Sentence>,
    goals: &[glossa::Sentence],
    lexicon: &Lexicon,
    params: &SearchParams,
    file: &InputFile,
) -> Result<(), String> {
    let config = BackwardConfig {
        weight_limit: params.weight_limit,
        unify_depth: params.unify_depth_limit,
        max_depth: params.max_proof_depth,
        on_the_fly_proposal: file.flag("on_the_fly_proposal"),
    };
    let mut prover = BackwardProver::with_config(config);
    for (rule, weight) in rules {
        prover.add_rule(rule, weight);
    }
    for assumption in assumptions {
        prover.add_assumption(assumption);
    }

    for goal in goals {
        println!("goal: {}", goal.render(lexicon));
        let answers = prover.prove(goal, lexicon);
        if answers.is_empty() {
            println!("  no proof within the weight budget");
        }
        for (subst, derivation) in &answers {
            println!(
                "  {} (depth {}, {} path{})",
                subst.render(lexicon),
                derivation.depth,
                derivation.paths.len(),
                if derivation.paths.len() == 1 { "" } else { "s" }
            );
        }
        println!();
    }
    print_stats(prover.stats());
    Ok(())
}

fn print_stats(stats: &glossa::Statistics) {
    let entries = stats.sorted();
    if entries.is_empty() {
        return;
    }
    println!("Statistics:");
    for (name, value) in entries {
        println!("  {name:<20} {value:>8}");
    }
}
