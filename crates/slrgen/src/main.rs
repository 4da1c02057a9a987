use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use slrgen::{grammar::Grammar, syntax, Analysis};
use std::{
    io::{self, BufRead as _},
    path::PathBuf,
    time::Instant,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The path of grammar definition file. The textbook expression grammar
    /// is used if omitted.
    grammar: Option<PathBuf>,

    /// An input string to check. Read line by line from stdin if omitted.
    #[arg(short, long = "input")]
    inputs: Vec<String>,

    /// The analysis results to print.
    #[arg(long, value_enum, value_delimiter = ',')]
    show: Vec<Show>,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum)]
enum Show {
    Grammar,
    First,
    Follow,
    Collection,
    Table,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    tracing::trace!("CLI args = {:?}", args);

    let grammar = match &args.grammar {
        Some(path) => syntax::parse_file(path)?,
        None => Grammar::textbook(),
    };

    let s = Instant::now();
    let analysis = slrgen::analyze(&grammar).context("failed to build the parse table")?;
    tracing::info!("analyze: {:?} elapsed", s.elapsed());

    report(&args, &grammar, &analysis);

    if args.inputs.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line.context("failed to read from stdin")?;
            if line.trim().is_empty() {
                continue;
            }
            check(&grammar, &analysis, &line);
        }
    } else {
        for input in &args.inputs {
            check(&grammar, &analysis, input);
        }
    }

    Ok(())
}

fn report(args: &Args, g: &Grammar, analysis: &Analysis) {
    let shown = |show: Show| args.show.is_empty() || args.show.contains(&show);

    if shown(Show::Grammar) {
        println!("{}", g);
    }
    if shown(Show::First) {
        println!("## first sets:\n{}", analysis.first_sets.display(g));
    }
    if shown(Show::Follow) {
        println!("## follow sets:\n{}", analysis.follow_sets.display(g));
    }
    if shown(Show::Collection) {
        println!("## LR(0) collection:\n{}", analysis.collection.display(g));
    }
    if shown(Show::Table) {
        println!("## action table:\n{}", analysis.actions.display(g));
        println!("## goto table:\n{}", analysis.gotos.display(g));
    }
}

fn check(g: &Grammar, analysis: &Analysis, input: &str) {
    let tokens = match syntax::scan_input(g, input) {
        Ok(tokens) => tokens,
        Err(err) => {
            println!("ERROR {:?}: {}", input, err.message);
            return;
        }
    };
    match analysis.parse(g, &tokens) {
        Ok(accepted) => {
            println!("ACCEPT {:?}", input);
            tracing::debug!(
                "derivation:\n{}",
                slrgen::display_reductions(g, &accepted.reductions)
            );
        }
        Err(err) => println!("ERROR {:?}: {}", input, err.display(g)),
    }
}
