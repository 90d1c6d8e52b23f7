//! Mécanique de recherche commune : balayage des candidats,
//! remplissages gloutons déterministes et montée de colline
//! ensemencée sur l'objectif complet.

use crate::catalogue::{CoverRole, ShiftCode, ALL_ROLES};
use crate::constraints::{placement_allowed, recompute_locums, role_applicable};
use crate::horizon::Horizon;
use crate::model::{FixedCell, Grade, ProblemInput, Roster};
use crate::objective;
use crate::solver::Deadline;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Personnes autorisées à prendre `code` le jour `day`, dans l'ordre
/// des indices.
pub fn candidates(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    day: usize,
    code: ShiftCode,
) -> Vec<usize> {
    (0..roster.n_people())
        .filter(|&p| placement_allowed(problem, horizon, roster, p, day, code))
        .collect()
}

/// Dans `pool`, la personne au compte ajusté WTE le plus bas sur
/// `codes` ; les égalités se départagent par indice pour rester
/// reproductible.
pub fn pick_fewest(
    problem: &ProblemInput,
    roster: &Roster,
    pool: &[usize],
    codes: &[ShiftCode],
) -> Option<usize> {
    pool.iter()
        .copied()
        .min_by_key(|&p| {
            let count: i64 = codes
                .iter()
                .map(|c| roster.count_for_person(p, *c) as i64)
                .sum();
            let wte = problem.people[p].wte_millis().max(1);
            (count * 1_000_000 / wte, p)
        })
}

/// Pourvoit chaque rôle-jour obligatoire découvert dans l'ordre de
/// l'échelle des locums. Les rôles restés vides deviennent des locums.
pub fn fill_missing_cover(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) {
    const ORDER: [CoverRole; 6] = [
        CoverRole::CometNight,
        CoverRole::NReg,
        CoverRole::NSho,
        CoverRole::CometDay,
        CoverRole::LdReg,
        CoverRole::LdSho,
    ];
    for day in 0..roster.n_days() {
        for role in ORDER {
            if !role_applicable(horizon, day, role) {
                continue;
            }
            let code = role.code();
            if roster.assignee(day, code).is_some() {
                continue;
            }
            let pool = candidates(problem, horizon, roster, day, code);
            let class = match role {
                CoverRole::CometNight | CoverRole::NReg => &[ShiftCode::Nr, ShiftCode::Cmn][..],
                CoverRole::NSho => &[ShiftCode::Ns][..],
                CoverRole::CometDay | CoverRole::LdReg => &[ShiftCode::Ldr, ShiftCode::Cmd][..],
                CoverRole::LdSho => &[ShiftCode::Lds][..],
                CoverRole::ShortDay => &[ShiftCode::Sd][..],
            };
            if let Some(p) = pick_fewest(problem, roster, &pool, class) {
                roster.set(day, p, code);
            }
        }
    }
}

/// Complète chaque jour ouvré éligible jusqu'à la cible de SD.
pub fn fill_short_days(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) {
    let target = usize::from(problem.config.sd_weekday_target);
    let max = usize::from(problem.config.sd_weekday_max);
    for day in 0..roster.n_days() {
        if !horizon.is_sd_day(day) {
            continue;
        }
        while roster.count_on_day(day, ShiftCode::Sd) < target.min(max) {
            let pool = candidates(problem, horizon, roster, day, ShiftCode::Sd);
            let Some(p) = pick_fewest(problem, roster, &pool, &[ShiftCode::Sd]) else {
                break;
            };
            roster.set(day, p, ShiftCode::Sd);
        }
    }
}

/// Pose les codes de formation à leurs jours configurés pour quiconque
/// est libre ; les cliniciens tenus en couverture ce jour-là sont les
/// cas pénalisés de formation manquée.
pub fn fill_training(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) {
    for day in 0..roster.n_days() {
        for person in 0..roster.n_people() {
            if !roster.is_off(day, person) {
                continue;
            }
            let grade = problem.people[person].grade;
            let code = if horizon.is_registrar_teaching[day] && grade == Grade::Registrar {
                ShiftCode::Treg
            } else if horizon.is_sho_teaching[day] && grade == Grade::Sho {
                ShiftCode::Tsho
            } else if horizon.is_pccu_teaching[day] {
                ShiftCode::Tpccu
            } else if horizon.is_induction[day] {
                ShiftCode::Ind
            } else {
                continue;
            };
            if placement_allowed(problem, horizon, roster, person, day, code) {
                roster.set(day, person, code);
            }
        }
    }
}

/// Comble les déficits d'heures hebdomadaires avec des SD, puis du
/// CPD, jusqu'au bas de la bande préférée.
pub fn top_up_hours(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) {
    let weeks = horizon.weeks();
    let max_sd = usize::from(problem.config.sd_weekday_max);
    for person in 0..roster.n_people() {
        let p = &problem.people[person];
        let lo = (45.0 * p.wte * weeks).floor() as i64;
        let cpd_cap = p.cpd_entitlement.map(usize::from).unwrap_or(usize::MAX);
        for day in 0..roster.n_days() {
            if i64::from(roster.total_hours(person)) >= lo {
                break;
            }
            if !roster.is_off(day, person) {
                continue;
            }
            if horizon.is_sd_day(day)
                && roster.count_on_day(day, ShiftCode::Sd) < max_sd
                && placement_allowed(problem, horizon, roster, person, day, ShiftCode::Sd)
            {
                roster.set(day, person, ShiftCode::Sd);
            } else if roster.count_for_person(person, ShiftCode::Cpd) < cpd_cap
                && placement_allowed(problem, horizon, roster, person, day, ShiftCode::Cpd)
            {
                roster.set(day, person, ShiftCode::Cpd);
            }
        }
    }
}

/// Montée de colline ensemencée sur l'objectif complet. Seules les
/// cellules non verrouillées bougent ; un mouvement survit s'il passe
/// le filtre de placement et améliore strictement le score.
pub fn improve(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &mut Roster,
    fixed: &[FixedCell],
    locked: &[bool],
    rng: &mut ChaCha8Rng,
    deadline: Deadline,
    iterations: u32,
) {
    let n_days = roster.n_days();
    let n_people = roster.n_people();
    if n_days == 0 || n_people == 0 {
        return;
    }
    recompute_locums(problem, horizon, roster);
    let mut best = objective::score(problem, horizon, roster, fixed);

    for _ in 0..iterations {
        if deadline.expired() {
            break;
        }
        let day = rng.gen_range(0..n_days);
        let role = ALL_ROLES[rng.gen_range(0..ALL_ROLES.len())];
        if !role_applicable(horizon, day, role) {
            continue;
        }
        let code = role.code();
        let person = rng.gen_range(0..n_people);
        let cell = |d: usize, p: usize| d * n_people + p;

        let current = roster.assignee(day, code);
        let mut touched: Vec<(usize, usize, ShiftCode)> = Vec::new();

        if current == Some(person) {
            // Tente de retirer l'affectation.
            if locked[cell(day, person)] {
                continue;
            }
            touched.push((day, person, roster.get(day, person)));
            roster.clear(day, person);
        } else {
            if let Some(holder) = current {
                if locked[cell(day, holder)] {
                    continue;
                }
                touched.push((day, holder, roster.get(day, holder)));
                roster.clear(day, holder);
            }
            if locked[cell(day, person)]
                || !placement_allowed(problem, horizon, roster, person, day, code)
            {
                for (d, p, c) in touched.iter().rev() {
                    roster.set(*d, *p, *c);
                }
                continue;
            }
            touched.push((day, person, roster.get(day, person)));
            roster.set(day, person, code);
        }

        recompute_locums(problem, horizon, roster);
        let candidate = objective::score(problem, horizon, roster, fixed);
        if candidate < best {
            best = candidate;
        } else {
            for (d, p, c) in touched.iter().rev() {
                roster.set(*d, *p, *c);
            }
            recompute_locums(problem, horizon, roster);
        }
    }
}
