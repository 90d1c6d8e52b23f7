//! Solveur global : une passe de chauffe nuits seules dont le résultat
//! est gelé, puis une passe complète sur tous les rôles restants sous
//! l'objectif entier. Préféré à la décomposition par étapes dès qu'il
//! finit dans les délais, la recherche jointe respectant toutes les
//! interactions.

use crate::constraints::{placement_allowed, recompute_locums, violations};
use crate::horizon::Horizon;
use crate::model::{ProblemInput, Roster};
use crate::objective;
use crate::report;
use crate::solver::{comet, nights, search, Deadline, SolveOptions, SolveOutcome};
use crate::validate::{validate, RosterError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

pub fn solve(problem: &ProblemInput, options: &SolveOptions) -> Result<SolveOutcome, RosterError> {
    let horizon = Horizon::build(problem);
    let fixed = validate(problem, &horizon)?;
    let n_people = problem.people.len();
    let n_days = horizon.n_days();
    let mut roster = Roster::new(n_days, n_people);
    let mut locked = vec![false; n_days * n_people];

    for f in &fixed {
        if f.hard {
            roster.set(f.day, f.person, f.code);
            locked[f.day * n_people + f.person] = true;
        }
    }

    // Des préaffectations fermes contredisant les règles de repos
    // rendent le modèle infaisable sans slack : on émet le roster
    // diagnostic tout-locum plutôt qu'un partiel.
    recompute_locums(problem, &horizon, &mut roster);
    let preflight = violations::audit(problem, &horizon, &roster);
    if preflight.critical > 0 {
        let reason = preflight
            .violations
            .iter()
            .find(|v| v.severity == violations::Severity::Critical)
            .map(|v| v.description.clone())
            .unwrap_or_else(|| "hard preassignments are contradictory".to_string());
        warn!(%reason, "emitting locum-only roster");
        let breakdown = objective::breakdown(problem, &horizon, &roster, &fixed);
        let breaches = report::breaches(problem, &horizon, &roster);
        let summary = report::summary(problem, &horizon, &roster, breakdown.clone());
        return Ok(SolveOutcome {
            success: false,
            timed_out: false,
            message: format!("Not solved: {reason}"),
            roster,
            breaches,
            summary,
            objective: breakdown,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);

    // Passe 1 : nuits seules. Blocs CoMET d'abord, puis nuits d'unité
    // pour les deux grades, améliorées sous l'objectif de forme des
    // nuits.
    let deadline = Deadline::after(options.nights_timeout);
    let historical = vec![0u32; n_people];
    let packer = comet::CometNightPacker::new(problem, &horizon, &historical);
    if packer.has_eligible() {
        packer.run(&mut roster, deadline);
    }
    let reg_nights = nights::NightSubSolve::for_registrars(problem, &horizon);
    if reg_nights.has_eligible() {
        reg_nights.run(
            &mut roster,
            &locked,
            &mut rng,
            deadline,
            options.improve_iterations,
        );
    }
    let sho_nights = nights::NightSubSolve::for_shos(problem, &horizon);
    if sho_nights.has_eligible() {
        sho_nights.run(
            &mut roster,
            &locked,
            &mut rng,
            deadline,
            options.improve_iterations,
        );
    }
    let pass1_timed_out = deadline.expired();

    // Gèle les nuits de la passe 1 ; la passe 2 cherche autour de
    // cette forme.
    let mut frozen_nights = 0u32;
    for day in 0..n_days {
        for person in 0..n_people {
            if roster.get(day, person).is_night() {
                locked[day * n_people + person] = true;
                frozen_nights += 1;
            }
        }
    }
    info!(frozen_nights, "nights pass frozen");

    // Passe 2 : modèle complet. Les souhaits souples sont pris là où
    // le filtre l'autorise, la couverture restante et les SD sont
    // pourvus, formation et compléments d'heures posés, puis le tout
    // est amélioré sous l'objectif complet.
    let deadline = Deadline::after(options.full_timeout);
    for f in &fixed {
        if !f.hard
            && roster.is_off(f.day, f.person)
            && placement_allowed(problem, &horizon, &roster, f.person, f.day, f.code)
        {
            roster.set(f.day, f.person, f.code);
        }
    }
    search::fill_missing_cover(problem, &horizon, &mut roster);
    search::fill_training(problem, &horizon, &mut roster);
    search::fill_short_days(problem, &horizon, &mut roster);
    search::top_up_hours(problem, &horizon, &mut roster);
    search::improve(
        problem,
        &horizon,
        &mut roster,
        &fixed,
        &locked,
        &mut rng,
        deadline,
        options.improve_iterations,
    );
    let timed_out = pass1_timed_out || deadline.expired();

    recompute_locums(problem, &horizon, &mut roster);
    let breakdown = objective::breakdown(problem, &horizon, &roster, &fixed);
    let breaches = report::breaches(problem, &horizon, &roster);
    let summary = report::summary(problem, &horizon, &roster, breakdown.clone());
    let message = if timed_out {
        format!(
            "Solved, best found before the deadline ({} locum slots)",
            summary.total_locum_slots
        )
    } else {
        format!("Solved ({} locum slots)", summary.total_locum_slots)
    };
    info!(%message, objective = breakdown.total, "global solve finished");

    Ok(SolveOutcome {
        success: true,
        timed_out,
        message,
        roster,
        breaches,
        summary,
        objective: breakdown,
    })
}
