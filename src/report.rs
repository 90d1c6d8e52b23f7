//! Formes de sortie : la carte dense du roster, la table des locums,
//! le rapport de manquements et le résumé par personne. Clés et noms
//! de colonnes sont ici une interface stable pour le collaborateur de
//! restitution.

use crate::catalogue::{CoverRole, ShiftCode, ALL_ROLES};
use crate::constraints::sequence;
use crate::horizon::Horizon;
use crate::model::{Grade, PersonId, ProblemInput, Roster};
use crate::objective::ObjectiveBreakdown;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

fn div_ceil_i64(lhs: i64, rhs: i64) -> i64 {
    let d = lhs / rhs;
    let r = lhs % rhs;
    if (r > 0 && rhs > 0) || (r < 0 && rhs < 0) {
        d + 1
    } else {
        d
    }
}

/// date -> id de personne -> code.
pub fn roster_map(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (day, date) in horizon.days.iter().enumerate() {
        let mut row = BTreeMap::new();
        for (person, p) in problem.people.iter().enumerate() {
            row.insert(
                p.id.as_str().to_string(),
                roster.get(day, person).to_string(),
            );
        }
        out.insert(date.to_string(), row);
    }
    out
}

/// date -> colonne locum -> compte.
pub fn locum_map(horizon: &Horizon, roster: &Roster) -> BTreeMap<String, BTreeMap<String, u8>> {
    let mut out = BTreeMap::new();
    for (day, date) in horizon.days.iter().enumerate() {
        let mut row = BTreeMap::new();
        for role in ALL_ROLES {
            row.insert(
                role.column().to_string(),
                roster.locums(day).get(role),
            );
        }
        out.insert(date.to_string(), row);
    }
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekendFrequencyBreach {
    pub person: PersonId,
    pub worked: u32,
    pub cap: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekendPairBreach {
    pub person: PersonId,
    pub weekend_start: NaiveDate,
    pub worked_days: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingBreach {
    pub person: PersonId,
    pub kind: String,
    pub actual: u32,
    pub min_expected: u32,
    pub max_expected: u32,
}

/// Listes datées de manquements sous clés stables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BreachReport {
    pub ld_reg: Vec<NaiveDate>,
    pub ld_sho: Vec<NaiveDate>,
    pub sd_weekday: Vec<NaiveDate>,
    pub n_reg: Vec<NaiveDate>,
    pub n_sho: Vec<NaiveDate>,
    pub comet_day: Vec<NaiveDate>,
    pub comet_night: Vec<NaiveDate>,
    pub firm_weekend_frequency: Vec<WeekendFrequencyBreach>,
    pub firm_weekend_pairs: Vec<WeekendPairBreach>,
    pub training_attendance: Vec<TrainingBreach>,
}

impl BreachReport {
    pub fn total_locum_days(&self) -> usize {
        self.ld_reg.len()
            + self.ld_sho.len()
            + self.sd_weekday.len()
            + self.n_reg.len()
            + self.n_sho.len()
            + self.comet_day.len()
            + self.comet_night.len()
    }
}

pub fn breaches(problem: &ProblemInput, horizon: &Horizon, roster: &Roster) -> BreachReport {
    let mut report = BreachReport::default();

    for day in 0..roster.n_days() {
        let date = horizon.days[day];
        let loc = roster.locums(day);
        for role in ALL_ROLES {
            if loc.get(role) == 0 {
                continue;
            }
            match role {
                CoverRole::LdReg => report.ld_reg.push(date),
                CoverRole::LdSho => report.ld_sho.push(date),
                CoverRole::NReg => report.n_reg.push(date),
                CoverRole::NSho => report.n_sho.push(date),
                CoverRole::CometDay => report.comet_day.push(date),
                CoverRole::CometNight => report.comet_night.push(date),
                CoverRole::ShortDay => report.sd_weekday.push(date),
            }
        }
    }

    for (person, p) in problem.people.iter().enumerate() {
        let worked = sequence::worked_weekends(horizon, roster, person) as u32;
        let firm_cap = sequence::firm_weekend_cap(problem, horizon, person) as u32;
        if worked > firm_cap {
            report.firm_weekend_frequency.push(WeekendFrequencyBreach {
                person: p.id.clone(),
                worked,
                cap: firm_cap,
            });
        }

        for weekend in horizon.weekends.iter().filter(|w| w.is_full()) {
            let (Some(sat), Some(sun)) = (weekend.sat, weekend.sun) else {
                continue;
            };
            let sat_worked = sequence::covers_on(roster, person, sat);
            let sun_worked = sequence::covers_on(roster, person, sun);
            if sat_worked != sun_worked {
                let worked_days = [sat, sun]
                    .iter()
                    .filter(|&&d| sequence::covers_on(roster, person, d))
                    .map(|&d| horizon.days[d])
                    .collect();
                report.firm_weekend_pairs.push(WeekendPairBreach {
                    person: p.id.clone(),
                    weekend_start: horizon.days[sat],
                    worked_days,
                });
            }
        }
    }

    training_breaches(problem, horizon, roster, &mut report);
    report
}

fn training_breaches(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    report: &mut BreachReport,
) {
    for (person, p) in problem.people.iter().enumerate() {
        let kinds: &[(&str, ShiftCode, &Vec<bool>)] = &[
            ("registrar_teaching", ShiftCode::Treg, &horizon.is_registrar_teaching),
            ("sho_teaching", ShiftCode::Tsho, &horizon.is_sho_teaching),
            ("pccu_teaching", ShiftCode::Tpccu, &horizon.is_pccu_teaching),
        ];
        for (kind, code, mask) in kinds {
            if code.grade_requirement().map_or(false, |g| g != p.grade) {
                continue;
            }
            let applicable = mask.iter().filter(|m| **m).count() as i64;
            if applicable == 0 {
                continue;
            }
            let expected_millis = applicable * p.wte_millis();
            let min_expected = (expected_millis * 670 / 1_000_000).max(0) as u32;
            let max_expected = (div_ceil_i64(expected_millis * 1330, 1_000_000)) as u32;
            let actual = roster.count_for_person(person, *code) as u32;
            if actual < min_expected || actual > max_expected {
                report.training_attendance.push(TrainingBreach {
                    person: p.id.clone(),
                    kind: kind.to_string(),
                    actual,
                    min_expected,
                    max_expected,
                });
            }
        }
    }
}

/// Statistiques par personne ; chaque valeur numérique est finie.
#[derive(Debug, Clone, Serialize)]
pub struct PersonSummary {
    pub id: PersonId,
    pub name: String,
    pub grade: &'static str,
    pub wte: f64,
    pub avg_weekly_hours: f64,
    pub long_days: u32,
    pub nights: u32,
    pub ld_equivalent: u32,
    pub n_equivalent: u32,
    pub weekends_worked: u32,
    pub registrar_teaching: u32,
    pub sho_teaching: u32,
    pub pccu_teaching: u32,
    pub induction: u32,
    pub cpd: u32,
    pub leave: u32,
    pub study_leave: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeSummary {
    pub grade: &'static str,
    pub headcount: u32,
    pub avg_weekly_hours: f64,
    pub ld_equivalent: u32,
    pub n_equivalent: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub people: Vec<PersonSummary>,
    pub grades: Vec<GradeSummary>,
    pub total_locum_slots: u32,
    pub objective: ObjectiveBreakdown,
}

pub fn summary(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    objective: ObjectiveBreakdown,
) -> Summary {
    let weeks = horizon.weeks().max(f64::EPSILON);
    let people: Vec<PersonSummary> = problem
        .people
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let count = |c: ShiftCode| roster.count_for_person(i, c) as u32;
            let long_days = count(ShiftCode::Ldr) + count(ShiftCode::Lds);
            let nights = count(ShiftCode::Nr) + count(ShiftCode::Ns) + count(ShiftCode::Cmn);
            PersonSummary {
                id: p.id.clone(),
                name: p.name.clone(),
                grade: p.grade.as_str(),
                wte: p.wte,
                avg_weekly_hours: f64::from(roster.total_hours(i)) / weeks,
                long_days,
                nights,
                ld_equivalent: count(ShiftCode::Ldr) + count(ShiftCode::Cmd),
                n_equivalent: count(ShiftCode::Nr) + count(ShiftCode::Cmn),
                weekends_worked: sequence::worked_weekends(horizon, roster, i) as u32,
                registrar_teaching: count(ShiftCode::Treg),
                sho_teaching: count(ShiftCode::Tsho),
                pccu_teaching: count(ShiftCode::Tpccu),
                induction: count(ShiftCode::Ind),
                cpd: count(ShiftCode::Cpd),
                leave: count(ShiftCode::Lv),
                study_leave: count(ShiftCode::Slv),
            }
        })
        .collect();

    let grades = [Grade::Registrar, Grade::Sho, Grade::Supernumerary]
        .iter()
        .filter_map(|grade| {
            let members: Vec<&PersonSummary> = people
                .iter()
                .filter(|s| s.grade == grade.as_str())
                .collect();
            if members.is_empty() {
                return None;
            }
            let headcount = members.len() as u32;
            Some(GradeSummary {
                grade: grade.as_str(),
                headcount,
                avg_weekly_hours: members.iter().map(|s| s.avg_weekly_hours).sum::<f64>()
                    / f64::from(headcount),
                ld_equivalent: members.iter().map(|s| s.ld_equivalent).sum(),
                n_equivalent: members.iter().map(|s| s.n_equivalent).sum(),
            })
        })
        .collect();

    let total_locum_slots = (0..roster.n_days())
        .map(|d| roster.locums(d).total())
        .sum();

    Summary {
        people,
        grades,
        total_locum_slots,
        objective,
    }
}
