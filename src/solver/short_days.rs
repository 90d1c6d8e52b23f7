//! Étape 6 : le balayage final des jours ouvrés. Formation et
//! induction se posent d'abord à leurs jours configurés, puis les SD
//! complètent l'effectif de jour vers trois personnes-jours.

use crate::catalogue::ShiftCode;
use crate::constraints::placement_allowed;
use crate::horizon::Horizon;
use crate::model::{ProblemInput, Roster};
use crate::solver::search;
use tracing::debug;

pub(crate) fn run(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) -> (u32, String) {
    let target = i64::from(problem.config.sd_weekday_target);
    let max = i64::from(problem.config.sd_weekday_max);
    let mut short_days = 0u32;

    // Formation et induction d'abord : quiconque n'est pas tenu en
    // couverture y assiste, et le balayage SD s'organise autour.
    let before = roster.total_assigned();
    search::fill_training(problem, horizon, roster);
    let training_placed = roster.total_assigned() - before;

    let mut stage_counts = vec![0i64; problem.people.len()];

    for day in 0..horizon.n_days() {
        if !horizon.is_sd_day(day) {
            continue;
        }
        let already_working = (0..roster.n_people())
            .filter(|&p| {
                let code = roster.get(day, p);
                code.is_duty() && !code.is_night()
            })
            .count() as i64;
        // Viser trois personnes-jours de couverture de jour, jamais
        // moins d'un SD ni plus que le plafond configuré.
        let wanted = (target - already_working).clamp(1, max);
        let mut placed = 0i64;
        while placed < wanted {
            let current = roster.count_on_day(day, ShiftCode::Sd) as i64;
            if current >= max {
                break;
            }
            let best = (0..roster.n_people())
                .filter(|&p| placement_allowed(problem, horizon, roster, p, day, ShiftCode::Sd))
                .min_by_key(|&p| {
                    let wte = problem.people[p].wte_millis().max(1);
                    (stage_counts[p] * 1_000_000 / wte, p)
                });
            let Some(p) = best else { break };
            roster.set(day, p, ShiftCode::Sd);
            stage_counts[p] += 1;
            placed += 1;
            short_days += 1;
            debug!(day, person = p, "short day");
        }
    }

    (
        short_days + training_placed,
        format!("Short days: {short_days} SD plus {training_placed} training/induction placements"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Grade, Person, ProblemInput, Weights};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn problem() -> ProblemInput {
        ProblemInput {
            people: vec![
                Person::new("r1", "Reg One", Grade::Registrar),
                Person::new("r2", "Reg Two", Grade::Registrar),
                Person::new("s1", "Sho One", Grade::Sho),
                Person::new("s2", "Sho Two", Grade::Sho),
                Person::new("x1", "Super One", Grade::Supernumerary),
            ],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 9)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn weekdays_reach_the_sd_band() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 5);
        run(&pb, &hz, &mut r);
        for day in 0..hz.n_days() {
            let count = r.count_on_day(day, ShiftCode::Sd);
            if hz.is_sd_day(day) {
                assert!((1..=3).contains(&count), "day {day} has {count} SDs");
            } else {
                assert_eq!(count, 0);
            }
        }
    }

    #[test]
    fn counts_existing_day_cover_towards_the_target() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 5);
        r.set(0, 0, ShiftCode::Ldr);
        r.set(0, 2, ShiftCode::Lds);
        run(&pb, &hz, &mut r);
        // Two on long days already: one SD tops Monday up to three.
        assert_eq!(r.count_on_day(0, ShiftCode::Sd), 1);
    }

    #[test]
    fn training_days_pull_in_free_clinicians() {
        let mut pb = problem();
        pb.config.registrar_teaching_days = vec![date(2025, 2, 6)];
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 5);
        run(&pb, &hz, &mut r);
        let thursday = hz.index_of(date(2025, 2, 6)).unwrap();
        assert!(r.count_on_day(thursday, ShiftCode::Treg) >= 1);
    }
}
