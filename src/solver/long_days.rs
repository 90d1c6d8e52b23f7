//! Étape 5 : un LD registrar par jour ouvré ordinaire, respectueux du
//! repos de tous les engagements antérieurs, avec une bande WTE
//! intra-étape tenue en ratios entiers.

use crate::catalogue::ShiftCode;
use crate::constraints::placement_allowed;
use crate::horizon::Horizon;
use crate::model::{Grade, ProblemInput, Roster};
use tracing::debug;

/// Borne haute de la bande intra-étape, en pour mille de la part WTE
/// attendue.
const BAND_HI_PERMILLE: i64 = 1200;

pub(crate) fn run(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) -> (u32, String) {
    let registrars: Vec<usize> = problem
        .people
        .iter()
        .enumerate()
        .filter(|(_, p)| p.grade == Grade::Registrar)
        .map(|(i, _)| i)
        .collect();
    let total_wte: i64 = registrars
        .iter()
        .map(|&p| problem.people[p].wte_millis())
        .sum();

    let weekdays: Vec<usize> = (0..horizon.n_days())
        .filter(|&d| !horizon.is_weekend[d] && !horizon.is_bank_holiday[d])
        .collect();

    let mut stage_counts = vec![0i64; problem.people.len()];
    let mut stage_total = 0i64;
    let mut assigned = 0u32;
    let mut uncovered = 0u32;

    for &day in &weekdays {
        if roster.assignee(day, ShiftCode::Ldr).is_some() {
            continue;
        }
        let feasible: Vec<usize> = registrars
            .iter()
            .copied()
            .filter(|&p| placement_allowed(problem, horizon, roster, p, day, ShiftCode::Ldr))
            .collect();
        if feasible.is_empty() {
            uncovered += 1;
            continue;
        }
        // Les candidats encore dans la bande ont la priorité :
        // (count + 1) * total_wte <= 1,2 * wte * (stage_total + 1).
        let in_band: Vec<usize> = feasible
            .iter()
            .copied()
            .filter(|&p| {
                (stage_counts[p] + 1) * total_wte * 1000
                    <= BAND_HI_PERMILLE * problem.people[p].wte_millis() * (stage_total + 1)
            })
            .collect();
        let pool = if in_band.is_empty() { &feasible } else { &in_band };
        let Some(p) = pool.iter().copied().min_by_key(|&p| {
            let wte = problem.people[p].wte_millis().max(1);
            (stage_counts[p] * 1_000_000 / wte, p)
        }) else {
            uncovered += 1;
            continue;
        };
        roster.set(day, p, ShiftCode::Ldr);
        stage_counts[p] += 1;
        stage_total += 1;
        assigned += 1;
        debug!(day, person = p, "weekday LDR");
    }

    (
        assigned,
        format!(
            "Weekday long days: {assigned} LDR assigned, {uncovered} left to locum cover"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Person, ProblemInput, Weights};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn every_ordinary_weekday_gets_one_ldr() {
        let pb = ProblemInput {
            people: vec![
                Person::new("r1", "Reg One", Grade::Registrar),
                Person::new("r2", "Reg Two", Grade::Registrar),
                Person::new("r3", "Reg Three", Grade::Registrar),
            ],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 16)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        };
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 3);
        let (assigned, _) = run(&pb, &hz, &mut r);
        assert_eq!(assigned, 10);
        for day in 0..hz.n_days() {
            let expect = usize::from(!hz.is_weekend[day]);
            assert_eq!(r.count_on_day(day, ShiftCode::Ldr), expect, "day {day}");
        }
    }

    #[test]
    fn respects_committed_night_rest() {
        let pb = ProblemInput {
            people: vec![
                Person::new("r1", "Reg One", Grade::Registrar),
                Person::new("r2", "Reg Two", Grade::Registrar),
            ],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 9)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        };
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 2);
        // r1 finishes a night block on Tuesday.
        r.set(0, 0, ShiftCode::Nr);
        r.set(1, 0, ShiftCode::Nr);
        let (_, _) = run(&pb, &hz, &mut r);
        // Wednesday and Thursday stay clear for r1.
        assert!(!r.working_at(2, 0) || r.get(2, 0) == ShiftCode::Nr);
        assert_eq!(r.assignee(2, ShiftCode::Ldr), Some(1));
        assert_eq!(r.assignee(3, ShiftCode::Ldr), Some(1));
    }
}
