#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rotaplan::{
    io, solve_roster,
    solver::SolveOptions,
    storage::{JsonStorage, Storage},
    Horizon, StagedSolver,
};
use std::time::Duration;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de planification de gardes (sans base de données)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Répertoire de sortie des artefacts de résolution
    #[arg(long, global = true, default_value = "out")]
    out_dir: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Résoudre avec le solveur global en deux passes
    Solve {
        /// Fichier JSON du problème
        #[arg(long)]
        input: String,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Budget de la passe nuits seules, en secondes
        #[arg(long, default_value_t = 60)]
        nights_timeout: u64,
        /// Budget de la passe complète, en secondes
        #[arg(long, default_value_t = 120)]
        full_timeout: u64,
    },

    /// Résoudre étape par étape, chaque étape engagée dans l'ordre
    SolveStaged {
        #[arg(long)]
        input: String,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Budget par étape, en secondes
        #[arg(long, default_value_t = 120)]
        stage_timeout: u64,
        /// S'arrêter après cette étape au lieu de dérouler les six
        #[arg(long)]
        stop_after: Option<String>,
    },

    /// Auditer les préaffectations d'un problème et signaler les
    /// violations dures
    Check {
        #[arg(long)]
        input: String,
    },

    /// Convertir un CSV de personnes en JSON prêt pour le problème
    ImportPeople {
        #[arg(long)]
        csv: String,
        #[arg(long)]
        out: String,
    },

    /// Écrire un problème de démonstration pour essayer les solveurs
    Sample {
        /// Premier jour (avancé au lundi suivant), YYYY-MM-DD
        #[arg(long)]
        start: String,
        #[arg(long, default_value_t = 26)]
        weeks: u32,
        #[arg(long)]
        out: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let code = match cli.cmd {
        Commands::Solve {
            input,
            seed,
            nights_timeout,
            full_timeout,
        } => {
            let problem = io::load_problem_json(&input)?;
            let options = SolveOptions {
                seed,
                nights_timeout: Duration::from_secs(nights_timeout),
                full_timeout: Duration::from_secs(full_timeout),
                ..SolveOptions::default()
            };
            let outcome = solve_roster(&problem, &options)?;
            let horizon = Horizon::build(&problem);

            let storage = JsonStorage::open(&cli.out_dir)?;
            storage.save(
                "roster",
                &rotaplan::report::roster_map(&problem, &horizon, &outcome.roster),
            )?;
            storage.save(
                "locums",
                &rotaplan::report::locum_map(&horizon, &outcome.roster),
            )?;
            storage.save("breaches", &outcome.breaches)?;
            storage.save("summary", &outcome.summary)?;
            io::export_roster_csv(
                std::path::Path::new(&cli.out_dir).join("roster.csv"),
                &problem,
                &horizon,
                &outcome.roster,
            )?;

            println!("{}", outcome.message);
            if !outcome.success {
                1
            } else if outcome.summary.total_locum_slots > 0 {
                // Code 2 = solved with locum cover outstanding
                2
            } else {
                0
            }
        }
        Commands::SolveStaged {
            input,
            seed,
            stage_timeout,
            stop_after,
        } => {
            let problem = io::load_problem_json(&input)?;
            let options = SolveOptions {
                seed,
                stage_timeout: Duration::from_secs(stage_timeout),
                ..SolveOptions::default()
            };
            let horizon = Horizon::build(&problem);
            let mut solver = StagedSolver::with_options(problem.clone(), options)?;
            let timeout = Duration::from_secs(stage_timeout);

            let result = match stop_after {
                Some(stage_name) => {
                    rotaplan::Stage::from_name(&stage_name)
                        .with_context(|| format!("unknown stage: {stage_name}"))?;
                    let mut last = None;
                    for stage in rotaplan::Stage::ALL {
                        let result = solver.solve_stage(stage.name(), timeout)?;
                        let failed = !result.success;
                        let done = stage.name() == stage_name;
                        last = Some(result);
                        if failed || done {
                            break;
                        }
                    }
                    last.context("no stages ran")?
                }
                None => solver.solve_with_checkpoints(timeout, true),
            };

            let roster = solver.get_current_roster();
            let storage = JsonStorage::open(&cli.out_dir)?;
            storage.save(
                "roster",
                &rotaplan::report::roster_map(&problem, &horizon, &roster),
            )?;
            storage.save("locums", &rotaplan::report::locum_map(&horizon, &roster))?;
            storage.save(
                "breaches",
                &rotaplan::report::breaches(&problem, &horizon, &roster),
            )?;
            storage.save("violations", &solver.check_hard_constraints())?;
            io::export_roster_csv(
                std::path::Path::new(&cli.out_dir).join("roster.csv"),
                &problem,
                &horizon,
                &roster,
            )?;

            println!("[{}] {}", result.stage, result.message);
            if let Some(next) = &result.next_stage {
                println!("next stage: {next}");
            }
            if result.success {
                0
            } else {
                2
            }
        }
        Commands::Check { input } => {
            let problem = io::load_problem_json(&input)?;
            let solver = StagedSolver::new(problem)?;
            let report = solver.check_hard_constraints();
            // Avant résolution seules les violations critiques
            // comptent ; les totaux souples n'ont pas de sens sur une
            // grille vide.
            if report.critical == 0 {
                println!("OK: no critical violations in the preassigned state");
                0
            } else {
                eprintln!(
                    "Found {} violation(s): {} critical, {} high, {} medium",
                    report.violations.len(),
                    report.critical,
                    report.high,
                    report.medium
                );
                for v in report.violations.iter().take(10) {
                    eprintln!("  [{k:?}] {d}", k = v.kind, d = v.description);
                }
                2
            }
        }
        Commands::ImportPeople { csv, out } => {
            let people = io::import_people_csv(&csv)?;
            io::export_json(&out, &people)?;
            println!("Imported {} people into {}", people.len(), out);
            0
        }
        Commands::Sample { start, weeks, out } => {
            let start = chrono::NaiveDate::parse_from_str(&start, "%Y-%m-%d")
                .with_context(|| format!("invalid date (expected YYYY-MM-DD): {start}"))?;
            let problem = rotaplan::sample::sample_problem(start, weeks);
            io::export_json(&out, &problem)?;
            println!(
                "Sample problem ({} people, {} to {}) written to {}",
                problem.people.len(),
                problem.config.start_date,
                problem.config.end_date,
                out
            );
            0
        }
    };

    std::process::exit(code);
}
