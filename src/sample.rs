//! Un problème de démonstration prêt à l'emploi : une équipe de
//! réanimation pédiatrique plausible sur un nombre de semaines
//! configurable, avec semaines CoMET alternées et rythme
//! d'enseignement hebdomadaire. Utile pour essayer la CLI et pour les
//! benchmarks.

use crate::model::{Config, Grade, Person, ProblemInput, Weights};
use chrono::{Datelike, Duration, NaiveDate};

/// Construit un problème d'exemple démarrant le lundi égal ou suivant
/// `start`.
pub fn sample_problem(start: NaiveDate, weeks: u32) -> ProblemInput {
    let offset = (7 - start.weekday().num_days_from_monday()) % 7;
    let monday = start + Duration::days(i64::from(offset));
    let end = monday + Duration::days(i64::from(weeks * 7) - 1);

    let mut config = Config::new(monday, end);
    // CoMET tourne une semaine sur deux.
    config.comet_mondays = (0..weeks)
        .step_by(2)
        .map(|w| monday + Duration::weeks(i64::from(w)))
        .collect();
    // Enseignement registrar le mercredi des semaines sans CoMET,
    // enseignement SHO le jeudi suivant.
    config.registrar_teaching_days = (1..weeks)
        .step_by(2)
        .map(|w| monday + Duration::weeks(i64::from(w)) + Duration::days(2))
        .collect();
    config.sho_teaching_days = (1..weeks)
        .step_by(2)
        .map(|w| monday + Duration::weeks(i64::from(w)) + Duration::days(3))
        .collect();

    let mut part_time_reg = Person::new("reg-05", "Priya Nair", Grade::Registrar).with_wte(0.6);
    part_time_reg.fixed_day_off = Some(4); // vendredis

    let mut part_time_sho = Person::new("sho-03", "Tom Okafor", Grade::Sho).with_wte(0.8);
    part_time_sho.fixed_day_off = Some(0); // lundis

    let people = vec![
        Person::new("reg-01", "Amelia Hart", Grade::Registrar).with_comet(),
        Person::new("reg-02", "Daniel Kovacs", Grade::Registrar).with_comet(),
        Person::new("reg-03", "Mei-Ling Zhao", Grade::Registrar)
            .with_comet()
            .with_wte(0.8),
        Person::new("reg-04", "Hassan Malik", Grade::Registrar),
        part_time_reg,
        Person::new("sho-01", "Grace Adeyemi", Grade::Sho),
        Person::new("sho-02", "Lucas Brandt", Grade::Sho),
        part_time_sho,
        Person::new("sho-04", "Eilidh Ross", Grade::Sho),
        Person::new("sup-01", "Observer Rowan", Grade::Supernumerary).with_wte(0.5),
    ];

    ProblemInput {
        people,
        config,
        preassignments: Vec::new(),
        weights: Weights::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::horizon::Horizon;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sample_starts_on_a_monday_and_alternates_comet() {
        let pb = sample_problem(date(2025, 2, 5), 4);
        assert_eq!(pb.config.start_date, date(2025, 2, 10));
        assert_eq!(pb.config.end_date, date(2025, 3, 9));
        let hz = Horizon::build(&pb);
        assert_eq!(hz.comet_weeks.len(), 2);
        assert!(hz.is_comet_week[0]);
        assert!(!hz.is_comet_week[7]);
    }

    #[test]
    fn sample_validates_cleanly() {
        let pb = sample_problem(date(2025, 2, 3), 8);
        let hz = Horizon::build(&pb);
        assert!(crate::validate::validate(&pb, &hz).is_ok());
        assert_eq!(pb.people.len(), 10);
    }
}
