use crate::catalogue::ShiftCode;
use crate::horizon::Horizon;
use crate::model::{FixedCell, ProblemInput};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Échecs en entrée. Le moteur ne produit jamais de roster partiel
/// pour une entrée malformée.
#[derive(Error, Debug)]
pub enum RosterError {
    #[error("invalid date range: end {end} precedes start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("duplicate person id: {0}")]
    DuplicatePerson(String),
    #[error("WTE {wte} for {person} outside 0.2..=1.0")]
    WteOutOfRange { person: String, wte: f64 },
    #[error("invalid fixed day off {day} for {person} (expected 0..=6)")]
    InvalidFixedDayOff { person: String, day: u8 },
    #[error("unknown person in preassignment: {0}")]
    UnknownPerson(String),
    #[error("unknown shift code in preassignment: {0}")]
    UnknownCode(String),
    #[error("preassignment date {0} outside the rostering horizon")]
    DateOutOfHorizon(NaiveDate),
    #[error("contradictory preassignments for {person} on {date}")]
    ContradictoryPreassignment { person: String, date: NaiveDate },
    #[error("short-day bounds {min}..{max} invalid (need 1 <= min <= max)")]
    InvalidShortDayBounds { min: u8, max: u8 },
    #[error("unknown stage: {0}")]
    UnknownStage(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Valide le problème en entrée et résout les préaffectations en
/// coordonnées de grille avec codes canoniques.
pub fn validate(problem: &ProblemInput, horizon: &Horizon) -> Result<Vec<FixedCell>, RosterError> {
    let cfg = &problem.config;
    if cfg.end_date < cfg.start_date {
        return Err(RosterError::InvalidDateRange {
            start: cfg.start_date,
            end: cfg.end_date,
        });
    }
    if cfg.sd_weekday_min == 0 || cfg.sd_weekday_min > cfg.sd_weekday_max {
        return Err(RosterError::InvalidShortDayBounds {
            min: cfg.sd_weekday_min,
            max: cfg.sd_weekday_max,
        });
    }

    let mut person_index: HashMap<&str, usize> = HashMap::new();
    for (i, person) in problem.people.iter().enumerate() {
        if person_index.insert(person.id.as_str(), i).is_some() {
            return Err(RosterError::DuplicatePerson(person.id.as_str().to_owned()));
        }
        if !(0.2..=1.0).contains(&person.wte) {
            return Err(RosterError::WteOutOfRange {
                person: person.id.as_str().to_owned(),
                wte: person.wte,
            });
        }
        if let Some(day) = person.fixed_day_off {
            if day > 6 {
                return Err(RosterError::InvalidFixedDayOff {
                    person: person.id.as_str().to_owned(),
                    day,
                });
            }
        }
    }

    let mut fixed: Vec<FixedCell> = Vec::new();
    let mut seen: HashMap<(usize, usize), ShiftCode> = HashMap::new();
    for pre in &problem.preassignments {
        let p = *person_index
            .get(pre.person.as_str())
            .ok_or_else(|| RosterError::UnknownPerson(pre.person.as_str().to_owned()))?;
        let d = horizon
            .index_of(pre.date)
            .ok_or(RosterError::DateOutOfHorizon(pre.date))?;
        let grade = problem.people[p].grade;
        let code = ShiftCode::canonicalise(&pre.code, grade)
            .ok_or_else(|| RosterError::UnknownCode(pre.code.clone()))?;
        match seen.get(&(p, d)) {
            Some(existing) if *existing != code => {
                return Err(RosterError::ContradictoryPreassignment {
                    person: pre.person.as_str().to_owned(),
                    date: pre.date,
                });
            }
            Some(_) => continue,
            None => {
                seen.insert((p, d), code);
            }
        }
        fixed.push(FixedCell {
            person: p,
            day: d,
            code,
            hard: code.is_hard_preassignment(),
        });
    }

    // Ordre d'application déterministe.
    fixed.sort_by_key(|f| (f.day, f.person));
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Grade, Person, Preassignment, ProblemInput, Weights};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn base_problem() -> ProblemInput {
        ProblemInput {
            people: vec![
                Person::new("r1", "Reg One", Grade::Registrar),
                Person::new("s1", "Sho One", Grade::Sho),
            ],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 9)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn resolves_and_canonicalises_preassignments() {
        let mut pb = base_problem();
        pb.preassignments = vec![
            Preassignment {
                person: pb.people[0].id.clone(),
                date: date(2025, 2, 4),
                code: "LD".into(),
            },
            Preassignment {
                person: pb.people[1].id.clone(),
                date: date(2025, 2, 5),
                code: "LV".into(),
            },
        ];
        let hz = Horizon::build(&pb);
        let fixed = validate(&pb, &hz).unwrap();
        assert_eq!(fixed.len(), 2);
        assert_eq!(fixed[0].code, ShiftCode::Ldr);
        assert!(!fixed[0].hard);
        assert_eq!(fixed[1].code, ShiftCode::Lv);
        assert!(fixed[1].hard);
    }

    #[test]
    fn rejects_unknown_person_and_code() {
        let mut pb = base_problem();
        pb.preassignments = vec![Preassignment {
            person: crate::model::PersonId::new("ghost"),
            date: date(2025, 2, 4),
            code: "LV".into(),
        }];
        let hz = Horizon::build(&pb);
        assert!(matches!(
            validate(&pb, &hz),
            Err(RosterError::UnknownPerson(_))
        ));

        pb.preassignments = vec![Preassignment {
            person: pb.people[0].id.clone(),
            date: date(2025, 2, 4),
            code: "XYZ".into(),
        }];
        assert!(matches!(
            validate(&pb, &hz),
            Err(RosterError::UnknownCode(_))
        ));
    }

    #[test]
    fn rejects_out_of_horizon_and_contradictions() {
        let mut pb = base_problem();
        pb.preassignments = vec![Preassignment {
            person: pb.people[0].id.clone(),
            date: date(2025, 3, 1),
            code: "LV".into(),
        }];
        let hz = Horizon::build(&pb);
        assert!(matches!(
            validate(&pb, &hz),
            Err(RosterError::DateOutOfHorizon(_))
        ));

        pb.preassignments = vec![
            Preassignment {
                person: pb.people[0].id.clone(),
                date: date(2025, 2, 4),
                code: "LV".into(),
            },
            Preassignment {
                person: pb.people[0].id.clone(),
                date: date(2025, 2, 4),
                code: "SLV".into(),
            },
        ];
        assert!(matches!(
            validate(&pb, &hz),
            Err(RosterError::ContradictoryPreassignment { .. })
        ));
    }

    #[test]
    fn rejects_inverted_sd_bounds() {
        let mut pb = base_problem();
        pb.config.sd_weekday_min = 3;
        pb.config.sd_weekday_max = 1;
        let hz = Horizon::build(&pb);
        assert!(matches!(
            validate(&pb, &hz),
            Err(RosterError::InvalidShortDayBounds { .. })
        ));
    }

    #[test]
    fn rejects_wte_out_of_range() {
        let mut pb = base_problem();
        pb.people[0].wte = 0.1;
        let hz = Horizon::build(&pb);
        assert!(matches!(
            validate(&pb, &hz),
            Err(RosterError::WteOutOfRange { .. })
        ));
    }
}
