//! Arithmétique des parts proportionnelles au WTE. Tout est entier, à
//! l'échelle 1000, pour qu'une bande serrée ne devienne pas infaisable
//! d'une unité d'arrondi.

use crate::catalogue::ShiftCode;
use crate::constraints::sequence::worked_weekends;
use crate::horizon::Horizon;
use crate::model::{Grade, ProblemInput, Roster};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareClass {
    /// LDR + CMD.
    LongDayEquiv,
    /// NR + CMN.
    NightEquiv,
    Weekend,
}

pub const SHARE_CLASSES: [ShareClass; 3] = [
    ShareClass::LongDayEquiv,
    ShareClass::NightEquiv,
    ShareClass::Weekend,
];

impl ShareClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareClass::LongDayEquiv => "long_day_equivalent",
            ShareClass::NightEquiv => "night_equivalent",
            ShareClass::Weekend => "weekend",
        }
    }
}

/// Codes regroupés pour un grade dans une classe donnée.
fn pooled_codes(grade: Grade, class: ShareClass) -> &'static [ShiftCode] {
    match (grade, class) {
        (Grade::Registrar, ShareClass::LongDayEquiv) => &[ShiftCode::Ldr, ShiftCode::Cmd],
        (Grade::Registrar, ShareClass::NightEquiv) => &[ShiftCode::Nr, ShiftCode::Cmn],
        (Grade::Sho, ShareClass::LongDayEquiv) => &[ShiftCode::Lds],
        (Grade::Sho, ShareClass::NightEquiv) => &[ShiftCode::Ns],
        _ => &[],
    }
}

/// Compte réel de la personne dans la classe.
pub fn class_count(horizon: &Horizon, roster: &Roster, problem: &ProblemInput, person: usize, class: ShareClass) -> i64 {
    match class {
        ShareClass::Weekend => worked_weekends(horizon, roster, person) as i64,
        _ => pooled_codes(problem.people[person].grade, class)
            .iter()
            .map(|c| roster.count_for_person(person, *c) as i64)
            .sum(),
    }
}

/// WTE utilisé pour le calcul des parts. Les registrars éligibles
/// CoMET portent une charge CoMET en plus, donc leur poids LD/N est
/// réduit à 0,8.
pub fn effective_wte_millis(problem: &ProblemInput, person: usize, class: ShareClass) -> i64 {
    let p = &problem.people[person];
    let base = p.wte_millis();
    match class {
        ShareClass::LongDayEquiv | ShareClass::NightEquiv
            if p.grade == Grade::Registrar && p.comet_eligible =>
        {
            base * 800 / 1000
        }
        _ => base,
    }
}

/// Part attendue de la personne, en millièmes d'unité :
/// total x (wte_i x actifs_i) / somme_j (wte_j x actifs_j).
pub fn expected_share_millis(
    problem: &ProblemInput,
    horizon: &Horizon,
    members: &[usize],
    person: usize,
    total: i64,
    class: ShareClass,
) -> i64 {
    let denom: i64 = members
        .iter()
        .map(|&p| effective_wte_millis(problem, p, class) * horizon.active_days(p) as i64)
        .sum();
    if denom == 0 {
        return 0;
    }
    let numer = effective_wte_millis(problem, person, class) * horizon.active_days(person) as i64;
    total * 1000 * numer / denom
}

/// `actual` est-il dans la bande +- (pour mille) autour de la part
/// attendue ? Sous deux unités attendues, un coussin additif de +-1
/// s'applique.
pub fn within_band(actual: i64, expected_millis: i64, band_permille: i64) -> bool {
    let mut lo = expected_millis * (1000 - band_permille) / 1000;
    let mut hi = expected_millis * (1000 + band_permille) / 1000;
    if expected_millis < 2000 {
        lo -= 1000;
        hi += 1000;
    }
    let actual_millis = actual * 1000;
    actual_millis >= lo.max(0) && actual_millis <= hi
}

/// Membres du groupe de grade, dans l'ordre des indices.
pub fn grade_members(problem: &ProblemInput, grade: Grade) -> Vec<usize> {
    problem
        .people
        .iter()
        .enumerate()
        .filter(|(_, p)| p.grade == grade)
        .map(|(i, _)| i)
        .collect()
}

/// Total réalisé de la classe sur le groupe.
pub fn group_total(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    members: &[usize],
    class: ShareClass,
) -> i64 {
    members
        .iter()
        .map(|&p| class_count(horizon, roster, problem, p, class))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Person, ProblemInput, Weights};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn problem() -> ProblemInput {
        ProblemInput {
            people: vec![
                Person::new("r1", "One", Grade::Registrar).with_wte(1.0),
                Person::new("r2", "Two", Grade::Registrar).with_wte(0.5),
            ],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 16)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn expected_share_follows_wte() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let members = vec![0, 1];
        let full = expected_share_millis(&pb, &hz, &members, 0, 30, ShareClass::NightEquiv);
        let half = expected_share_millis(&pb, &hz, &members, 1, 30, ShareClass::NightEquiv);
        assert_eq!(full, 20_000);
        assert_eq!(half, 10_000);
    }

    #[test]
    fn comet_eligible_scaled_for_unit_share() {
        let mut pb = problem();
        pb.people[0].comet_eligible = true;
        assert_eq!(effective_wte_millis(&pb, 0, ShareClass::NightEquiv), 800);
        assert_eq!(effective_wte_millis(&pb, 0, ShareClass::Weekend), 1000);
    }

    #[test]
    fn band_has_cushion_below_two() {
        // Expected 1.0: the 25% band alone would forbid 0 and 2.
        assert!(within_band(0, 1000, 250));
        assert!(within_band(2, 1000, 250));
        assert!(!within_band(3, 1000, 250));
        // Expected 8: plain multiplicative band.
        assert!(within_band(6, 8000, 250));
        assert!(!within_band(5, 8000, 250));
        assert!(!within_band(11, 8000, 250));
    }
}
