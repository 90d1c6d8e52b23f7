//! Bibliothèque de contraintes : le filtre de placement dur consulté
//! par les deux solveurs, l'arithmétique d'équité et l'audit a
//! posteriori.

pub mod fairness;
pub mod sequence;
pub mod violations;

use crate::catalogue::{CoverRole, ShiftCode, ALL_ROLES};
use crate::horizon::Horizon;
use crate::model::{Grade, ProblemInput, Roster};

/// Le filtre dur unique. Chaque chemin d'affectation, glouton ou
/// recherche, le consulte avant d'écrire une cellule ; une cellule
/// refusée ici est couverte par un locum à la place.
pub fn placement_allowed(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    person: usize,
    day: usize,
    code: ShiftCode,
) -> bool {
    if code == ShiftCode::Off {
        return true;
    }
    // Exclusivité : les solveurs ne remplissent que des cellules vides.
    if !roster.is_off(day, person) {
        return false;
    }
    // Blocage avant la date d'arrivée.
    if day < horizon.start_index[person] {
        return false;
    }

    let p = &problem.people[person];

    if let Some(required) = code.grade_requirement() {
        if p.grade != required {
            return false;
        }
    }
    // Les surnuméraires ne prennent jamais LD, nuit ni CoMET.
    if p.grade == Grade::Supernumerary && (code.is_long() || code.is_comet()) {
        return false;
    }
    if code.is_comet() && (!p.comet_eligible || !horizon.is_comet_week[day]) {
        return false;
    }
    if let Some(off_day) = p.fixed_day_off {
        if p.wte < 1.0 && horizon.weekday[day] == off_day && code != ShiftCode::Ltft {
            return false;
        }
    }
    if code == ShiftCode::Ltft {
        // N'a de sens que le jour fixe non travaillé.
        match p.fixed_day_off {
            Some(off_day) if p.wte < 1.0 && horizon.weekday[day] == off_day => {}
            _ => return false,
        }
    }
    if code == ShiftCode::Sd && !horizon.is_sd_day(day) {
        return false;
    }
    match code {
        ShiftCode::Treg if !horizon.is_registrar_teaching[day] => return false,
        ShiftCode::Tsho if !horizon.is_sho_teaching[day] => return false,
        ShiftCode::Tpccu if !horizon.is_pccu_teaching[day] => return false,
        ShiftCode::Ind if !horizon.is_induction[day] => return false,
        _ => {}
    }

    if code.is_working() {
        if !sequence::backward_night_rest_ok(roster, person, day, code) {
            return false;
        }
        if !sequence::window72_ok(roster, person, day, code) {
            return false;
        }
        if !sequence::working_run_ok(roster, person, day)
            || !sequence::rest_after_working_run_ok(roster, person, day)
            || !sequence::rest_after_long_block_ok(roster, person, day)
        {
            return false;
        }
        if code.is_long() && !sequence::long_run_ok(roster, person, day) {
            return false;
        }
        if code.is_night() {
            if !sequence::forward_night_rest_ok(roster, person, day)
                || !sequence::max_consecutive_nights_ok(roster, person, day)
                || !sequence::night_spacing_ok(roster, person, day)
            {
                return false;
            }
        }
        if code.counts_toward_cover()
            && !sequence::weekend_cap_ok(problem, horizon, roster, person, day)
        {
            return false;
        }
    }

    true
}

/// Le rôle s'applique-t-il ce jour-là ?
pub fn role_applicable(horizon: &Horizon, day: usize, role: CoverRole) -> bool {
    match role {
        CoverRole::LdReg | CoverRole::LdSho | CoverRole::NReg | CoverRole::NSho => true,
        CoverRole::CometDay | CoverRole::CometNight => horizon.is_comet_week[day],
        CoverRole::ShortDay => horizon.is_sd_day(day),
    }
}

/// Dérive les locums de la grille pour que chaque rôle-jour applicable
/// somme à exactement un (SD : au moins le minimum configuré).
pub fn recompute_locums(problem: &ProblemInput, horizon: &Horizon, roster: &mut Roster) {
    for day in 0..roster.n_days() {
        for role in ALL_ROLES {
            let value = if !role_applicable(horizon, day, role) {
                0
            } else if role == CoverRole::ShortDay {
                let assigned = roster.count_on_day(day, ShiftCode::Sd);
                let min = usize::from(problem.config.sd_weekday_min);
                min.saturating_sub(assigned).min(3) as u8
            } else {
                let assigned = roster.count_on_day(day, role.code());
                u8::from(assigned == 0)
            };
            roster.locums_mut(day).set(role, value);
        }
    }
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
        let mut config = Config::new(date(2025, 2, 3), date(2025, 2, 16));
        config.comet_mondays = vec![date(2025, 2, 3)];
        ProblemInput {
            people: vec![
                Person::new("r1", "Reg One", Grade::Registrar).with_comet(),
                Person::new("r2", "Reg Two", Grade::Registrar),
                Person::new("s1", "Sho One", Grade::Sho),
                Person::new("x1", "Super One", Grade::Supernumerary),
            ],
            config,
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn grade_and_eligibility_gates() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let r = Roster::new(hz.n_days(), pb.people.len());
        // SHO cannot take the registrar long day.
        assert!(!placement_allowed(&pb, &hz, &r, 2, 0, ShiftCode::Ldr));
        assert!(placement_allowed(&pb, &hz, &r, 1, 0, ShiftCode::Ldr));
        // Only the CoMET-eligible registrar may take CMN, only in week 1.
        assert!(placement_allowed(&pb, &hz, &r, 0, 0, ShiftCode::Cmn));
        assert!(!placement_allowed(&pb, &hz, &r, 1, 0, ShiftCode::Cmn));
        assert!(!placement_allowed(&pb, &hz, &r, 0, 7, ShiftCode::Cmn));
        // Supernumerary never covers, but may take a short day.
        assert!(!placement_allowed(&pb, &hz, &r, 3, 0, ShiftCode::Ldr));
        assert!(!placement_allowed(&pb, &hz, &r, 3, 0, ShiftCode::Ns));
        assert!(placement_allowed(&pb, &hz, &r, 3, 0, ShiftCode::Sd));
    }

    #[test]
    fn sd_forbidden_on_weekends_and_holidays() {
        let mut pb = problem();
        pb.config.bank_holidays = vec![date(2025, 2, 4)];
        let hz = Horizon::build(&pb);
        let r = Roster::new(hz.n_days(), pb.people.len());
        assert!(!placement_allowed(&pb, &hz, &r, 1, 5, ShiftCode::Sd)); // Saturday
        assert!(!placement_allowed(&pb, &hz, &r, 1, 1, ShiftCode::Sd)); // bank holiday
        assert!(placement_allowed(&pb, &hz, &r, 1, 2, ShiftCode::Sd));
    }

    #[test]
    fn fixed_day_off_forbids_work() {
        let mut pb = problem();
        pb.people[1].wte = 0.8;
        pb.people[1].fixed_day_off = Some(2); // Wednesdays
        let hz = Horizon::build(&pb);
        let r = Roster::new(hz.n_days(), pb.people.len());
        assert!(!placement_allowed(&pb, &hz, &r, 1, 2, ShiftCode::Ldr));
        assert!(placement_allowed(&pb, &hz, &r, 1, 2, ShiftCode::Ltft));
        assert!(placement_allowed(&pb, &hz, &r, 1, 3, ShiftCode::Ldr));
    }

    #[test]
    fn pre_start_days_stay_off() {
        let mut pb = problem();
        pb.people[1].start_date = Some(date(2025, 2, 10));
        let hz = Horizon::build(&pb);
        let r = Roster::new(hz.n_days(), pb.people.len());
        assert!(!placement_allowed(&pb, &hz, &r, 1, 3, ShiftCode::Ldr));
        assert!(placement_allowed(&pb, &hz, &r, 1, 7, ShiftCode::Ldr));
    }

    #[test]
    fn locums_fill_every_uncovered_role() {
        let pb = problem();
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), pb.people.len());
        r.set(0, 1, ShiftCode::Ldr);
        recompute_locums(&pb, &hz, &mut r);
        assert_eq!(r.locums(0).get(CoverRole::LdReg), 0);
        assert_eq!(r.locums(0).get(CoverRole::LdSho), 1);
        assert_eq!(r.locums(0).get(CoverRole::CometNight), 1);
        // Outside the CoMET week no CoMET slack is recorded.
        recompute_locums(&pb, &hz, &mut r);
        assert_eq!(r.locums(7).get(CoverRole::CometNight), 0);
        // Monday needs at least one SD.
        assert_eq!(r.locums(0).get(CoverRole::ShortDay), 1);
        assert_eq!(r.locums(5).get(CoverRole::ShortDay), 0); // Saturday
    }
}
