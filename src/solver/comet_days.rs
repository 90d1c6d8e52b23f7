//! Étape 4 : couverture CMD restante. Des séries d'un ou deux CMD par
//! médecin, distribuées par manque ajusté WTE.

use crate::catalogue::ShiftCode;
use crate::constraints::placement_allowed;
use crate::horizon::Horizon;
use crate::model::{ProblemInput, Roster};
use tracing::debug;

pub(crate) fn run(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &mut Roster,
    historical_cmd: &[u32],
) -> (bool, String) {
    let eligible: Vec<usize> = problem
        .people
        .iter()
        .enumerate()
        .filter(|(_, p)| p.comet_eligible)
        .map(|(i, _)| i)
        .collect();
    if eligible.is_empty() {
        return (false, "No CoMET eligible registrars for day shifts".to_string());
    }

    let total_target: i64 = horizon.is_comet_week.iter().filter(|c| **c).count() as i64;
    let total_wte: i64 = eligible
        .iter()
        .map(|&p| problem.people[p].wte_millis())
        .sum();
    let mut assigned = 0u32;

    for &(lo, hi) in &horizon.comet_weeks {
        for day in lo..=hi {
            if roster.assignee(day, ShiftCode::Cmd).is_some() {
                continue;
            }
            let best = eligible
                .iter()
                .copied()
                .filter(|&p| placement_allowed(problem, horizon, roster, p, day, ShiftCode::Cmd))
                // Les séries de CMD restent à un ou deux jours.
                .filter(|&p| cmd_run_ending_at(roster, p, day) < 2)
                .max_by_key(|&p| {
                    let target = total_target * 1000 * problem.people[p].wte_millis() / total_wte;
                    let current = (roster.count_for_person(p, ShiftCode::Cmd) as i64
                        + i64::from(historical_cmd[p]))
                        * 1000;
                    (target - current, usize::MAX - p)
                });
            if let Some(p) = best {
                roster.set(day, p, ShiftCode::Cmd);
                assigned += 1;
                debug!(day, person = p, "CoMET day");
            }
        }
    }

    (
        true,
        format!("CoMET days: {assigned} CMD shifts assigned across {} weeks", horizon.comet_weeks.len()),
    )
}

/// Longueur de la série de CMD qui finirait à `day` si la personne le
/// prenait, en ne regardant qu'en arrière.
fn cmd_run_ending_at(roster: &Roster, person: usize, day: usize) -> usize {
    let mut run = 0;
    let mut d = day;
    while d > 0 {
        d -= 1;
        if roster.get(d, person) == ShiftCode::Cmd {
            run += 1;
        } else {
            break;
        }
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Grade, Person, ProblemInput, Weights};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn covers_comet_week_days_in_short_runs() {
        let mut config = Config::new(date(2025, 2, 3), date(2025, 2, 16));
        config.comet_mondays = vec![date(2025, 2, 3)];
        let pb = ProblemInput {
            people: vec![
                Person::new("r1", "Reg One", Grade::Registrar).with_comet(),
                Person::new("r2", "Reg Two", Grade::Registrar).with_comet(),
                Person::new("r3", "Reg Three", Grade::Registrar).with_comet(),
                Person::new("r4", "Reg Four", Grade::Registrar).with_comet(),
            ],
            config,
            preassignments: Vec::new(),
            weights: Weights::default(),
        };
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 4);
        let historical = vec![0; 4];
        let (ok, _) = run(&pb, &hz, &mut r, &historical);
        assert!(ok);
        for day in 0..7 {
            assert_eq!(r.count_on_day(day, ShiftCode::Cmd), 1, "day {day}");
        }
        // Nobody holds three CMDs in a row.
        for p in 0..4 {
            let mut run_len = 0;
            for d in 0..r.n_days() {
                if r.get(d, p) == ShiftCode::Cmd {
                    run_len += 1;
                    assert!(run_len <= 2);
                } else {
                    run_len = 0;
                }
            }
        }
    }

    #[test]
    fn fails_without_eligible_registrars() {
        let config = Config::new(date(2025, 2, 3), date(2025, 2, 9));
        let pb = ProblemInput {
            people: vec![Person::new("r1", "Reg One", Grade::Registrar)],
            config,
            preassignments: Vec::new(),
            weights: Weights::default(),
        };
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 1);
        let historical = vec![0; 1];
        let (ok, _) = run(&pb, &hz, &mut r, &historical);
        assert!(!ok);
    }
}
