//! Objectif souple pondéré sur un roster candidat. Plus bas est
//! meilleur. L'ordre des paliers est porteur : les locums dominent
//! tout, puis chaque palier décroît d'environ un ordre de grandeur.

use crate::catalogue::{CoverRole, ShiftCode};
use crate::constraints::{fairness, sequence};
use crate::horizon::Horizon;
use crate::model::{FixedCell, Grade, ProblemInput, Roster};
use serde::Serialize;

/// Totaux par palier, sérialisés dans le résumé pour inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectiveBreakdown {
    pub locums: i64,
    pub preassignments: i64,
    pub firm_weekend: i64,
    pub training_gaps: i64,
    pub sd_deviation: i64,
    pub weekend_split: i64,
    pub weekly_hours: i64,
    pub night_shape: i64,
    pub fairness_variance: i64,
    pub fairness_band: i64,
    pub training_band: i64,
    pub continuity: i64,
    pub total: i64,
}

pub fn score(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    fixed: &[FixedCell],
) -> i64 {
    breakdown(problem, horizon, roster, fixed).total
}

pub fn breakdown(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    fixed: &[FixedCell],
) -> ObjectiveBreakdown {
    let w = &problem.weights;
    let mut b = ObjectiveBreakdown::default();

    // 1. Locums de couverture, échelle par rôle.
    for day in 0..roster.n_days() {
        let loc = roster.locums(day);
        let holiday = horizon.is_bank_holiday[day];
        let weekend = horizon.is_weekend[day];
        let ld_weight = if holiday {
            w.locum_long_day_holiday
        } else if weekend {
            w.locum_long_day_weekend
        } else {
            w.locum_long_day
        };
        b.locums += i64::from(loc.get(CoverRole::CometNight)) * w.locum_comet_night
            + i64::from(loc.get(CoverRole::NReg)) * w.locum_night
            + i64::from(loc.get(CoverRole::NSho)) * w.locum_night
            + i64::from(loc.get(CoverRole::CometDay)) * w.locum_comet_day
            + i64::from(loc.get(CoverRole::LdReg)) * ld_weight
            + i64::from(loc.get(CoverRole::LdSho)) * ld_weight
            + i64::from(loc.get(CoverRole::ShortDay)) * w.locum_short_day;
    }

    // 2. Préaffectations souples non honorées.
    for f in fixed {
        if !f.hard && roster.get(f.day, f.person) != f.code {
            b.preassignments += w.preassignment;
        }
    }

    for person in 0..roster.n_people() {
        // 3. Dépassement du plafond ferme 1 week-end sur 3.
        let worked = sequence::worked_weekends(horizon, roster, person) as i64;
        let firm_cap = sequence::firm_weekend_cap(problem, horizon, person) as i64;
        if worked > firm_cap {
            b.firm_weekend += (worked - firm_cap) * w.firm_weekend;
        }

        // 4. Formation écrasée par la couverture obligatoire.
        b.training_gaps += training_gaps(problem, horizon, roster, person) * w.training_gap;

        // 6. Week-ends scindés.
        for weekend in horizon.weekends.iter().filter(|we| we.is_full()) {
            let sat = weekend
                .sat
                .map_or(false, |d| sequence::covers_on(roster, person, d));
            let sun = weekend
                .sun
                .map_or(false, |d| sequence::covers_on(roster, person, d));
            if sat != sun {
                b.weekend_split += w.weekend_split;
            }
        }

        // 7. Déficit ou excès d'heures hebdomadaires.
        let weeks = horizon.weeks();
        let wte = problem.people[person].wte;
        let total = i64::from(roster.total_hours(person));
        let lo = (45.0 * wte * weeks).floor() as i64;
        let hi = (48.0 * wte * weeks).ceil() as i64;
        if total < lo {
            b.weekly_hours += (lo - total) * w.weekly_hours;
        } else if total > hi {
            b.weekly_hours += (total - hi) * w.weekly_hours;
        }

        // 8. Forme des blocs de nuits, couche souple au-dessus des
        // bornes dures.
        b.night_shape += night_shape_units(roster, person) * w.night_shape;

        // 11. Écart à la bande de formation.
        b.training_band += training_band_units(problem, horizon, roster, person) * w.training_band;

        // 12. Bonus de continuité (négatifs).
        b.continuity -= continuity_units(horizon, roster, person) * w.continuity;
    }

    // 5. Écart des SD en semaine à la bande préférée [2, 3].
    for day in 0..roster.n_days() {
        if !horizon.is_sd_day(day) {
            continue;
        }
        let count = roster.count_on_day(day, ShiftCode::Sd) as i64;
        if count < 2 {
            b.sd_deviation += (2 - count) * w.sd_deviation;
        } else if count > 3 {
            b.sd_deviation += (count - 3) * w.sd_deviation;
        }
    }

    // 9 + 10. Variance par paires et bande +-15 %, par groupe de grade.
    for grade in [Grade::Registrar, Grade::Sho] {
        let members = fairness::grade_members(problem, grade);
        if members.len() < 2 {
            continue;
        }
        for class in fairness::SHARE_CLASSES {
            let total = fairness::group_total(problem, horizon, roster, &members, class);
            if total == 0 {
                continue;
            }
            let normalised: Vec<i64> = members
                .iter()
                .map(|&p| {
                    let actual = fairness::class_count(horizon, roster, problem, p, class);
                    let wte = fairness::effective_wte_millis(problem, p, class).max(1);
                    actual * 1_000_000 / wte
                })
                .collect();
            for i in 0..normalised.len() {
                for j in (i + 1)..normalised.len() {
                    b.fairness_variance +=
                        (normalised[i] - normalised[j]).abs() * w.fairness_variance / 1000;
                }
            }
            for &p in &members {
                let actual = fairness::class_count(horizon, roster, problem, p, class);
                let expected =
                    fairness::expected_share_millis(problem, horizon, &members, p, total, class);
                b.fairness_band += band_distance_units(actual, expected, 150) * w.fairness_band;
            }
        }
    }

    b.total = b.locums
        + b.preassignments
        + b.firm_weekend
        + b.training_gaps
        + b.sd_deviation
        + b.weekend_split
        + b.weekly_hours
        + b.night_shape
        + b.fairness_variance
        + b.fairness_band
        + b.training_band
        + b.continuity;
    b
}

/// Unités hors de la bande +- autour de la part attendue.
fn band_distance_units(actual: i64, expected_millis: i64, band_permille: i64) -> i64 {
    let mut lo = expected_millis * (1000 - band_permille) / 1000;
    let mut hi = expected_millis * (1000 + band_permille) / 1000;
    if expected_millis < 2000 {
        lo -= 1000;
        hi += 1000;
    }
    let actual_millis = actual * 1000;
    if actual_millis < lo.max(0) {
        (lo.max(0) - actual_millis) / 1000
    } else if actual_millis > hi {
        (actual_millis - hi) / 1000
    } else {
        0
    }
}

/// Jours de formation applicables où la personne était tenue en
/// couverture obligatoire.
fn training_gaps(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    person: usize,
) -> i64 {
    let grade = problem.people[person].grade;
    let mut gaps = 0;
    for day in 0..roster.n_days() {
        let grade_day = match grade {
            Grade::Registrar => horizon.is_registrar_teaching[day],
            Grade::Sho => horizon.is_sho_teaching[day],
            Grade::Supernumerary => false,
        };
        let applicable = grade_day || horizon.is_pccu_teaching[day];
        if !applicable {
            continue;
        }
        let code = roster.get(day, person);
        if code.counts_toward_cover() && code != ShiftCode::Sd {
            gaps += 1;
        }
    }
    gaps
}

/// Nuits isolées plus nuits au-delà de quatre dans une série.
fn night_shape_units(roster: &Roster, person: usize) -> i64 {
    let n = roster.n_days();
    let mut units = 0;
    let mut day = 0;
    while day < n {
        if !roster.night_at(day, person) {
            day += 1;
            continue;
        }
        let start = day;
        while day + 1 < n && roster.night_at(day + 1, person) {
            day += 1;
        }
        let len = day - start + 1;
        if len == 1 {
            units += 1;
        }
        if len > 4 {
            units += (len - 4) as i64;
        }
        day += 1;
    }
    units
}

/// Compte de formation contre la bande +-33 % pondérée WTE.
fn training_band_units(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    person: usize,
) -> i64 {
    let grade = problem.people[person].grade;
    let applicable: i64 = (0..horizon.n_days())
        .filter(|&d| {
            let grade_day = match grade {
                Grade::Registrar => horizon.is_registrar_teaching[d],
                Grade::Sho => horizon.is_sho_teaching[d],
                Grade::Supernumerary => false,
            };
            grade_day || horizon.is_pccu_teaching[d]
        })
        .count() as i64;
    if applicable == 0 {
        return 0;
    }
    let actual = [ShiftCode::Treg, ShiftCode::Tsho, ShiftCode::Tpccu]
        .iter()
        .map(|c| roster.count_for_person(person, *c) as i64)
        .sum::<i64>();
    let expected_millis = applicable * problem.people[person].wte_millis();
    band_distance_units(actual, expected_millis, 330)
}

/// Motifs de continuité valant chacun une petite récompense.
fn continuity_units(horizon: &Horizon, roster: &Roster, person: usize) -> i64 {
    let n = roster.n_days();
    let mut units = 0;

    // Le clinicien en LD du week-end travaille aussi le SD du vendredi
    // ou du lundi adjacent.
    for weekend in horizon.weekends.iter().filter(|we| we.is_full()) {
        let (Some(sat), Some(sun)) = (weekend.sat, weekend.sun) else {
            continue;
        };
        let sat_ld = roster.get(sat, person).is_long() && !roster.night_at(sat, person);
        let sun_ld = roster.get(sun, person).is_long() && !roster.night_at(sun, person);
        if sat_ld && sun_ld {
            if sat > 0 && roster.get(sat - 1, person) == ShiftCode::Sd {
                units += 1;
            }
            if sun + 1 < n && roster.get(sun + 1, person) == ShiftCode::Sd {
                units += 1;
            }
        }
    }

    // SD de transition juste avant une série de nuits ; un départ le
    // jeudi compte double.
    for day in 0..n.saturating_sub(1) {
        if roster.get(day, person) == ShiftCode::Sd && roster.night_at(day + 1, person) {
            units += 1;
            if horizon.weekday[day + 1] == 3 {
                units += 1;
            }
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::recompute_locums;
    use crate::model::{Config, Person, ProblemInput, Weights};
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
            ],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 16)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn covering_a_role_beats_a_locum() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut empty = Roster::new(hz.n_days(), 3);
        recompute_locums(&pb, &hz, &mut empty);
        let base = score(&pb, &hz, &empty, &[]);

        let mut covered = Roster::new(hz.n_days(), 3);
        covered.set(0, 0, ShiftCode::Ldr);
        recompute_locums(&pb, &hz, &mut covered);
        assert!(score(&pb, &hz, &covered, &[]) < base);
    }

    #[test]
    fn soft_preassignment_violation_is_penalised() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 3);
        recompute_locums(&pb, &hz, &mut r);
        let fixed = [FixedCell {
            person: 0,
            day: 0,
            code: ShiftCode::Ldr,
            hard: false,
        }];
        let without = score(&pb, &hz, &r, &[]);
        let with = score(&pb, &hz, &r, &fixed);
        assert_eq!(with - without, pb.weights.preassignment);
    }

    #[test]
    fn singleton_night_costs_shape_units() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 3);
        r.set(3, 0, ShiftCode::Nr);
        assert_eq!(night_shape_units(&r, 0), 1);
        r.set(4, 0, ShiftCode::Nr);
        assert_eq!(night_shape_units(&r, 0), 0);
    }

    #[test]
    fn continuity_rewards_crossover_sd() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 3);
        // Wed SD then a Thu-start night run.
        r.set(2, 0, ShiftCode::Sd);
        r.set(3, 0, ShiftCode::Nr);
        r.set(4, 0, ShiftCode::Nr);
        assert_eq!(continuity_units(&hz, &r, 0), 2);
    }
}
