//! Audit a posteriori d'un roster (éventuellement partiel). Utilisé
//! aux checkpoints du solveur par étapes, par le chemin diagnostic du
//! solveur global et par les tests d'intégration.

use crate::catalogue::{CoverRole, ShiftCode, ALL_ROLES};
use crate::constraints::{fairness, role_applicable, sequence};
use crate::horizon::Horizon;
use crate::model::{Grade, PersonId, ProblemInput, Roster};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Max72Hours,
    WeekendFrequency,
    NightRest,
    ConsecutiveLong,
    ConsecutiveNights,
    SingletonNight,
    ConsecutiveShifts,
    WeeklyHours,
    FairnessHard,
    ShiftCoverage,
    GradeMismatch,
    CometOutsideWeek,
    PreStartAssignment,
    FixedDayOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
    pub date_range: (NaiveDate, NaiveDate),
    pub description: String,
    pub current_value: i64,
    pub limit_value: i64,
}

/// Une sortie suggérée pour une violation, avec un coût locum
/// approximatif.
#[derive(Debug, Clone, Serialize)]
pub struct Remedy {
    pub action: &'static str,
    pub description: String,
    pub estimated_cost: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ViolationReport {
    pub violations: Vec<Violation>,
    pub remedies: Vec<Remedy>,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

impl ViolationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Audit complet de la grille contre toutes les règles dures.
pub fn audit(problem: &ProblemInput, horizon: &Horizon, roster: &Roster) -> ViolationReport {
    let mut out = Vec::new();

    for person in 0..roster.n_people() {
        audit_person(problem, horizon, roster, person, &mut out);
    }
    audit_coverage(problem, horizon, roster, &mut out);
    audit_fairness(problem, horizon, roster, &mut out);

    out.sort_by_key(|v| v.severity);
    let critical = out.iter().filter(|v| v.severity == Severity::Critical).count();
    let high = out.iter().filter(|v| v.severity == Severity::High).count();
    let medium = out.iter().filter(|v| v.severity == Severity::Medium).count();
    let remedies = suggest_remedies(problem, &out);
    ViolationReport {
        violations: out,
        remedies,
        critical,
        high,
        medium,
    }
}

fn push(
    out: &mut Vec<Violation>,
    kind: ViolationKind,
    severity: Severity,
    person: Option<&PersonId>,
    horizon: &Horizon,
    lo: usize,
    hi: usize,
    description: String,
    current: i64,
    limit: i64,
) {
    out.push(Violation {
        kind,
        severity,
        person: person.cloned(),
        date_range: (horizon.days[lo], horizon.days[hi]),
        description,
        current_value: current,
        limit_value: limit,
    });
}

fn audit_person(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    person: usize,
    out: &mut Vec<Violation>,
) {
    let p = &problem.people[person];
    let n = roster.n_days();
    let id = Some(&p.id);

    // Vérifications d'éligibilité cellule par cellule.
    for day in 0..n {
        let code = roster.get(day, person);
        if code == ShiftCode::Off {
            continue;
        }
        if day < horizon.start_index[person] {
            push(
                out,
                ViolationKind::PreStartAssignment,
                Severity::Critical,
                id,
                horizon,
                day,
                day,
                format!("{} assigned {} before their start date", p.name, code),
                1,
                0,
            );
        }
        let grade_bad = code
            .grade_requirement()
            .map_or(false, |g| g != p.grade)
            || (p.grade == Grade::Supernumerary && (code.is_long() || code.is_comet()));
        if grade_bad {
            push(
                out,
                ViolationKind::GradeMismatch,
                Severity::Critical,
                id,
                horizon,
                day,
                day,
                format!("{} ({}) holds {}", p.name, p.grade.as_str(), code),
                1,
                0,
            );
        }
        if code.is_comet() && (!horizon.is_comet_week[day] || !p.comet_eligible) {
            push(
                out,
                ViolationKind::CometOutsideWeek,
                Severity::Critical,
                id,
                horizon,
                day,
                day,
                format!("{} holds {} outside a CoMET week or without eligibility", p.name, code),
                1,
                0,
            );
        }
        if let Some(off_day) = p.fixed_day_off {
            if p.wte < 1.0
                && horizon.weekday[day] == off_day
                && !matches!(code, ShiftCode::Ltft | ShiftCode::Off)
            {
                push(
                    out,
                    ViolationKind::FixedDayOff,
                    Severity::Critical,
                    id,
                    horizon,
                    day,
                    day,
                    format!("{} works {} on their fixed day off", p.name, code),
                    1,
                    0,
                );
            }
        }
    }

    // Plafond glissant de 72h.
    for start in 0..n.saturating_sub(6) {
        let hours: u32 = (start..start + 7).map(|d| roster.get(d, person).hours()).sum();
        if hours > 72 {
            push(
                out,
                ViolationKind::Max72Hours,
                Severity::Critical,
                id,
                horizon,
                start,
                start + 6,
                format!("{} works {hours}h in a 7-day window (max 72h)", p.name),
                i64::from(hours),
                72,
            );
        }
    }

    // Blocs de nuits : repos après la fin, longueur, nuits isolées.
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
        let end = day;
        let len = end - start + 1;
        if len > 4 {
            push(
                out,
                ViolationKind::ConsecutiveNights,
                Severity::Critical,
                id,
                horizon,
                start,
                end,
                format!("{} works {len} consecutive nights (max 4)", p.name),
                len as i64,
                4,
            );
        }
        if len == 1 {
            push(
                out,
                ViolationKind::SingletonNight,
                Severity::High,
                id,
                horizon,
                start,
                end,
                format!("{} works an isolated single night", p.name),
                1,
                2,
            );
        }
        for offset in 1..=2 {
            let rest = end + offset;
            if rest < n && roster.working_at(rest, person) {
                push(
                    out,
                    ViolationKind::NightRest,
                    Severity::Critical,
                    id,
                    horizon,
                    end,
                    rest,
                    format!(
                        "{} works {} within 46h of a night block ending",
                        p.name,
                        roster.get(rest, person)
                    ),
                    (offset as i64 - 1).max(0),
                    2,
                );
            }
        }
        day = end + 1;
    }

    // Séries de gardes longues et de présence.
    let mut run = 0usize;
    for d in 0..n {
        if roster.get(d, person).is_long() {
            run += 1;
            if run == 5 {
                push(
                    out,
                    ViolationKind::ConsecutiveLong,
                    Severity::Critical,
                    id,
                    horizon,
                    d + 1 - run,
                    d,
                    format!("{} works 5 consecutive long shifts (max 4)", p.name),
                    run as i64,
                    4,
                );
            }
        } else {
            run = 0;
        }
    }
    run = 0;
    for d in 0..n {
        if roster.working_at(d, person) {
            run += 1;
            if run == 8 {
                push(
                    out,
                    ViolationKind::ConsecutiveShifts,
                    Severity::Critical,
                    id,
                    horizon,
                    d + 1 - run,
                    d,
                    format!("{} works 8 consecutive days (max 7)", p.name),
                    run as i64,
                    7,
                );
            }
        } else {
            run = 0;
        }
    }

    // Plafond dur de fréquence des week-ends.
    let worked = sequence::worked_weekends(horizon, roster, person);
    let cap = sequence::weekend_cap(problem, horizon, person);
    if worked > cap {
        push(
            out,
            ViolationKind::WeekendFrequency,
            Severity::Critical,
            id,
            horizon,
            0,
            n - 1,
            format!("{} works {worked} weekends (cap {cap})", p.name),
            worked as i64,
            cap as i64,
        );
    }

    // Moyenne d'heures hebdomadaires, horizons complets seulement.
    if n >= 140 {
        let weeks = horizon.weeks();
        let total = i64::from(roster.total_hours(person));
        let lo = (42.0 * weeks * p.wte).floor() as i64;
        let hi = (47.0 * weeks * p.wte).ceil() as i64;
        if total < lo || total > hi {
            push(
                out,
                ViolationKind::WeeklyHours,
                Severity::High,
                id,
                horizon,
                0,
                n - 1,
                format!(
                    "{} totals {total}h over the horizon (band {lo}..{hi}h)",
                    p.name
                ),
                total,
                if total < lo { lo } else { hi },
            );
        }
    }
}

fn audit_coverage(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    out: &mut Vec<Violation>,
) {
    for day in 0..roster.n_days() {
        for role in ALL_ROLES {
            if !role_applicable(horizon, day, role) {
                let assigned = roster.count_on_day(day, role.code()) as i64;
                if role != CoverRole::ShortDay && assigned > 0 {
                    push(
                        out,
                        ViolationKind::ShiftCoverage,
                        Severity::Critical,
                        None,
                        horizon,
                        day,
                        day,
                        format!("{} assigned on an inapplicable day", role.code()),
                        assigned,
                        0,
                    );
                }
                continue;
            }
            let assigned = roster.count_on_day(day, role.code()) as i64;
            let slack = i64::from(roster.locums(day).get(role));
            if role == CoverRole::ShortDay {
                let max = i64::from(problem.config.sd_weekday_max);
                let min = i64::from(problem.config.sd_weekday_min);
                if assigned > max {
                    push(
                        out,
                        ViolationKind::ShiftCoverage,
                        Severity::High,
                        None,
                        horizon,
                        day,
                        day,
                        format!("{assigned} short days rostered (max {max})"),
                        assigned,
                        max,
                    );
                }
                if assigned + slack < min {
                    push(
                        out,
                        ViolationKind::ShiftCoverage,
                        Severity::Critical,
                        None,
                        horizon,
                        day,
                        day,
                        format!("short-day cover {assigned}+{slack} below minimum {min}"),
                        assigned + slack,
                        min,
                    );
                }
            } else if assigned + slack != 1 {
                push(
                    out,
                    ViolationKind::ShiftCoverage,
                    Severity::Critical,
                    None,
                    horizon,
                    day,
                    day,
                    format!(
                        "{} cover is {assigned} assigned + {slack} locum (must be 1)",
                        role.code()
                    ),
                    assigned + slack,
                    1,
                );
            }
        }
    }
}

fn audit_fairness(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    out: &mut Vec<Violation>,
) {
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
            for &p in &members {
                let actual = fairness::class_count(horizon, roster, problem, p, class);
                let expected =
                    fairness::expected_share_millis(problem, horizon, &members, p, total, class);
                if !fairness::within_band(actual, expected, 250) {
                    let person = &problem.people[p];
                    push(
                        out,
                        ViolationKind::FairnessHard,
                        Severity::High,
                        Some(&person.id),
                        horizon,
                        0,
                        roster.n_days() - 1,
                        format!(
                            "{} holds {actual} {} shifts against an expected {:.1}",
                            person.name,
                            class.as_str(),
                            expected as f64 / 1000.0
                        ),
                        actual,
                        expected / 1000,
                    );
                }
            }
        }
    }
}

fn suggest_remedies(problem: &ProblemInput, violations: &[Violation]) -> Vec<Remedy> {
    let w = &problem.weights;
    violations
        .iter()
        .filter_map(|v| match v.kind {
            ViolationKind::ShiftCoverage => Some(Remedy {
                action: "locum",
                description: format!("cover with a locum: {}", v.description),
                estimated_cost: w.locum_long_day,
            }),
            ViolationKind::NightRest | ViolationKind::ConsecutiveNights => Some(Remedy {
                action: "split_block",
                description: format!("split the night block: {}", v.description),
                estimated_cost: w.locum_night,
            }),
            ViolationKind::Max72Hours | ViolationKind::ConsecutiveShifts => Some(Remedy {
                action: "remove_shift",
                description: format!("drop a shift from the window: {}", v.description),
                estimated_cost: w.locum_short_day,
            }),
            ViolationKind::WeekendFrequency | ViolationKind::FairnessHard => Some(Remedy {
                action: "swap_doctor",
                description: format!("swap with an under-allocated colleague: {}", v.description),
                estimated_cost: 0,
            }),
            _ => None,
        })
        .collect()
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
                Person::new("s1", "Sho One", Grade::Sho),
            ],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 16)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn clean_locum_only_roster_audits_clean_on_coverage() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 2);
        recompute_locums(&pb, &hz, &mut r);
        let report = audit(&pb, &hz, &r);
        assert!(
            report
                .violations
                .iter()
                .all(|v| v.kind != ViolationKind::ShiftCoverage),
            "{:?}",
            report.violations
        );
    }

    #[test]
    fn detects_missing_rest_after_nights() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 2);
        r.set(2, 0, ShiftCode::Nr);
        r.set(3, 0, ShiftCode::Nr);
        r.set(4, 0, ShiftCode::Sd);
        recompute_locums(&pb, &hz, &mut r);
        let report = audit(&pb, &hz, &r);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::NightRest && v.severity == Severity::Critical));
    }

    #[test]
    fn detects_singleton_and_long_runs() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 2);
        r.set(5, 0, ShiftCode::Nr);
        for d in 0..5 {
            r.set(d, 1, ShiftCode::Lds);
        }
        recompute_locums(&pb, &hz, &mut r);
        let report = audit(&pb, &hz, &r);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::SingletonNight));
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::ConsecutiveLong));
        assert!(!report.remedies.is_empty());
    }

    #[test]
    fn detects_uncovered_role_without_slack() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let r = Roster::new(hz.n_days(), 2);
        // Locums never recomputed: every mandatory role-day is short.
        let report = audit(&pb, &hz, &r);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::ShiftCoverage));
    }
}
