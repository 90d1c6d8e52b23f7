//! Étape 3 : travail des jours fériés. Les jours CoMET sont pourvus
//! d'abord là où le calendrier le permet, puis le rôle LD de jour, les
//! deux répartis pour niveler les comptes de fériés travaillés.

use crate::catalogue::ShiftCode;
use crate::constraints::placement_allowed;
use crate::horizon::Horizon;
use crate::model::{ProblemInput, Roster};
use tracing::debug;

pub(crate) fn run(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) -> (u32, String) {
    let holidays: Vec<usize> = (0..horizon.n_days())
        .filter(|&d| horizon.is_bank_holiday[d])
        .collect();
    if holidays.is_empty() {
        return (0, "No bank holidays in the horizon".to_string());
    }

    let mut cmd_assigned = 0u32;
    let mut ldr_assigned = 0u32;

    // Phase 1 : couverture CMD quand le férié tombe en semaine CoMET.
    for &day in &holidays {
        if !horizon.is_comet_week[day] || roster.assignee(day, ShiftCode::Cmd).is_some() {
            continue;
        }
        if let Some(p) = pick_levelled(problem, horizon, roster, day, ShiftCode::Cmd, &holidays) {
            roster.set(day, p, ShiftCode::Cmd);
            cmd_assigned += 1;
            debug!(day, person = p, "bank-holiday CMD");
        }
    }

    // Phase 2 : le LD d'unité sur les fériés encore sans couverture de
    // jour.
    for &day in &holidays {
        if roster.assignee(day, ShiftCode::Ldr).is_some() {
            continue;
        }
        if let Some(p) = pick_levelled(problem, horizon, roster, day, ShiftCode::Ldr, &holidays) {
            roster.set(day, p, ShiftCode::Ldr);
            ldr_assigned += 1;
            debug!(day, person = p, "bank-holiday LDR");
        }
    }

    let spread = holiday_work_spread(problem, roster, &holidays);
    (
        cmd_assigned + ldr_assigned,
        format!(
            "Holidays: {cmd_assigned} CMD and {ldr_assigned} LDR assigned over {} bank holidays (work spread {}-{})",
            holidays.len(),
            spread.0,
            spread.1
        ),
    )
}

/// Personne faisable ayant travaillé le moins de fériés jusqu'ici,
/// égalités départagées par compte de classe ajusté WTE puis indice.
/// Niveler le max-min des fériés est tout l'objet de l'étape.
fn pick_levelled(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    day: usize,
    code: ShiftCode,
    holidays: &[usize],
) -> Option<usize> {
    (0..roster.n_people())
        .filter(|&p| placement_allowed(problem, horizon, roster, p, day, code))
        .min_by_key(|&p| {
            let holiday_work = holidays
                .iter()
                .filter(|&&d| roster.working_at(d, p))
                .count() as i64;
            let class_count = (roster.count_for_person(p, ShiftCode::Ldr)
                + roster.count_for_person(p, ShiftCode::Cmd)) as i64;
            let wte = problem.people[p].wte_millis().max(1);
            (holiday_work, class_count * 1_000_000 / wte, p)
        })
}

fn holiday_work_spread(problem: &ProblemInput, roster: &Roster, holidays: &[usize]) -> (u32, u32) {
    let counts: Vec<u32> = (0..problem.people.len())
        .map(|p| holidays.iter().filter(|&&d| roster.working_at(d, p)).count() as u32)
        .collect();
    let min = counts.iter().copied().min().unwrap_or(0);
    let max = counts.iter().copied().max().unwrap_or(0);
    (min, max)
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
    fn holidays_get_day_cover() {
        let mut config = Config::new(date(2025, 4, 14), date(2025, 4, 27));
        config.bank_holidays = vec![date(2025, 4, 18), date(2025, 4, 21)];
        let pb = ProblemInput {
            people: vec![
                Person::new("r1", "Reg One", Grade::Registrar),
                Person::new("r2", "Reg Two", Grade::Registrar),
            ],
            config,
            preassignments: Vec::new(),
            weights: Weights::default(),
        };
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 2);
        let (assigned, _) = run(&pb, &hz, &mut r);
        assert_eq!(assigned, 2);
        let good_friday = hz.index_of(date(2025, 4, 18)).unwrap();
        let easter_monday = hz.index_of(date(2025, 4, 21)).unwrap();
        assert!(r.assignee(good_friday, ShiftCode::Ldr).is_some());
        assert!(r.assignee(easter_monday, ShiftCode::Ldr).is_some());
        // Spread across both registrars rather than stacked on one.
        assert_ne!(
            r.assignee(good_friday, ShiftCode::Ldr),
            r.assignee(easter_monday, ShiftCode::Ldr)
        );
    }
}
