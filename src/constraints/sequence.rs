//! Règles de repos et de séquence sur la ligne d'une personne.
//!
//! La règle des 46h s'applique après la fin d'un *bloc* de nuits, pas
//! après chaque nuit. Le packer comble des trous hors ordre des jours,
//! d'où deux prédicats nommés, un par direction.

use crate::catalogue::ShiftCode;
use crate::horizon::Horizon;
use crate::model::{ProblemInput, Roster};

/// Portée arrière d'une fin de bloc sur un placement : un bloc fait au
/// plus 4 nuits et le repos 2 jours francs.
const NIGHT_LOOKBACK: usize = 4;

/// Jours francs exigés entre deux blocs de nuits.
pub const NIGHT_BLOCK_GAP: usize = 5;

/// Longueur de la série de jours se terminant à `day` (inclus)
/// vérifiant `pred`.
fn run_left(roster: &Roster, person: usize, day: usize, pred: impl Fn(ShiftCode) -> bool) -> usize {
    let mut len = 0;
    let mut d = day;
    loop {
        if !pred(roster.get(d, person)) {
            break;
        }
        len += 1;
        if d == 0 {
            break;
        }
        d -= 1;
    }
    len
}

/// Longueur de la série de jours commençant à `day` (inclus) vérifiant
/// `pred`.
fn run_right(roster: &Roster, person: usize, day: usize, pred: impl Fn(ShiftCode) -> bool) -> usize {
    let mut len = 0;
    let mut d = day;
    while d < roster.n_days() {
        if !pred(roster.get(d, person)) {
            break;
        }
        len += 1;
        d += 1;
    }
    len
}

/// Le repos depuis la fin du dernier bloc de nuits engagé est-il
/// suffisant ? Tout code travaillé posé à `day` est refusé si un bloc
/// s'est terminé à `day - 1` ou `day - 2`.
pub fn backward_night_rest_ok(roster: &Roster, person: usize, day: usize, code: ShiftCode) -> bool {
    if code.is_night() && day > 0 && roster.night_at(day - 1, person) {
        // Prolonge le bloc ; aucune frontière franchie.
        return true;
    }
    let lo = day.saturating_sub(NIGHT_LOOKBACK);
    let mut e = day;
    while e > lo {
        e -= 1;
        if roster.night_at(e, person) {
            // `e` est la nuit la plus récente, donc une fin de bloc.
            let rest_days = day - e - 1;
            return rest_days >= 2;
        }
    }
    true
}

/// Cette nuit laissera-t-elle deux jours francs après la fin de son
/// bloc ? Si le lendemain porte déjà une nuit, le bloc continue et la
/// vérification suit.
pub fn forward_night_rest_ok(roster: &Roster, person: usize, day: usize) -> bool {
    if day + 1 < roster.n_days() && roster.night_at(day + 1, person) {
        return true;
    }
    for offset in 1..=2 {
        let rest = day + offset;
        if rest < roster.n_days() && roster.working_at(rest, person) {
            return false;
        }
    }
    true
}

/// Au moins `NIGHT_BLOCK_GAP` jours francs entre le bloc résultant et
/// ses voisins.
pub fn night_spacing_ok(roster: &Roster, person: usize, day: usize) -> bool {
    let is_night = |c: ShiftCode| c.is_night();
    let left = if day > 0 {
        run_left(roster, person, day - 1, is_night)
    } else {
        0
    };
    let right = if day + 1 < roster.n_days() {
        run_right(roster, person, day + 1, is_night)
    } else {
        0
    };
    let block_start = day - left;
    let block_end = day + right;

    // Bloc précédent à portée ?
    let scan_lo = block_start.saturating_sub(NIGHT_BLOCK_GAP + NIGHT_LOOKBACK);
    let mut e = block_start;
    while e > scan_lo {
        e -= 1;
        if roster.night_at(e, person) {
            if block_start - e - 1 < NIGHT_BLOCK_GAP {
                return false;
            }
            break;
        }
    }

    // Bloc suivant à portée ?
    let scan_hi = (block_end + NIGHT_BLOCK_GAP + NIGHT_LOOKBACK + 1).min(roster.n_days());
    for f in (block_end + 1)..scan_hi {
        if roster.night_at(f, person) {
            if f - block_end - 1 < NIGHT_BLOCK_GAP {
                return false;
            }
            break;
        }
    }
    true
}

/// Jamais 5 nuits consécutives.
pub fn max_consecutive_nights_ok(roster: &Roster, person: usize, day: usize) -> bool {
    let is_night = |c: ShiftCode| c.is_night();
    let left = if day > 0 {
        run_left(roster, person, day - 1, is_night)
    } else {
        0
    };
    let right = if day + 1 < roster.n_days() {
        run_right(roster, person, day + 1, is_night)
    } else {
        0
    };
    left + 1 + right <= 4
}

/// Plafond de 72h sur chaque fenêtre de 7 jours contenant `day`, avec
/// `code` posé en hypothèse. Les congés comptent leurs 9h comme tout
/// jour planifié.
pub fn window72_ok(roster: &Roster, person: usize, day: usize, code: ShiftCode) -> bool {
    let n = roster.n_days();
    let first = day.saturating_sub(6);
    let last = day.min(n.saturating_sub(7));
    let mut start = first;
    while start <= last {
        let mut hours = 0u32;
        for d in start..(start + 7).min(n) {
            let c = if d == day { code } else { roster.get(d, person) };
            hours += c.hours();
        }
        if hours > 72 {
            return false;
        }
        if start == last {
            break;
        }
        start += 1;
    }
    true
}

/// Au plus 4 gardes longues consécutives ; une série de 4 complétée
/// doit déjà avoir deux jours francs après sa fin.
pub fn long_run_ok(roster: &Roster, person: usize, day: usize) -> bool {
    let is_long = |c: ShiftCode| c.is_long();
    let left = if day > 0 {
        run_left(roster, person, day - 1, is_long)
    } else {
        0
    };
    let right = if day + 1 < roster.n_days() {
        run_right(roster, person, day + 1, is_long)
    } else {
        0
    };
    let total = left + 1 + right;
    if total > 4 {
        return false;
    }
    if total == 4 {
        let end = day + right;
        for offset in 1..=2 {
            let rest = end + offset;
            if rest < roster.n_days() && roster.get(rest, person).is_duty() {
                return false;
            }
        }
    }
    true
}

/// Après 4 gardes longues d'affilée, deux jours francs suivent. Refuse
/// un placement travaillé quand une telle série finit à `day - 1` ou
/// `day - 2`.
pub fn rest_after_long_block_ok(roster: &Roster, person: usize, day: usize) -> bool {
    let is_long = |c: ShiftCode| c.is_long();
    for offset in 1..=2 {
        if day < offset {
            continue;
        }
        let end = day - offset;
        // Série maximale finissant exactement à `end`.
        if end + 1 < roster.n_days() && is_long(roster.get(end + 1, person)) {
            continue;
        }
        if run_left(roster, person, end, is_long) >= 4 {
            return false;
        }
    }
    true
}

/// Au plus 7 jours de présence consécutifs ; une série de 7 complétée
/// doit déjà avoir deux jours francs après sa fin.
pub fn working_run_ok(roster: &Roster, person: usize, day: usize) -> bool {
    let is_duty = |c: ShiftCode| c.is_duty();
    let left = if day > 0 {
        run_left(roster, person, day - 1, is_duty)
    } else {
        0
    };
    let right = if day + 1 < roster.n_days() {
        run_right(roster, person, day + 1, is_duty)
    } else {
        0
    };
    let total = left + 1 + right;
    if total > 7 {
        return false;
    }
    if total == 7 {
        let end = day + right;
        for offset in 1..=2 {
            let rest = end + offset;
            if rest < roster.n_days() && roster.get(rest, person).is_duty() {
                return false;
            }
        }
    }
    true
}

/// Après 7 jours de présence d'affilée, deux jours francs suivent.
pub fn rest_after_working_run_ok(roster: &Roster, person: usize, day: usize) -> bool {
    let is_duty = |c: ShiftCode| c.is_duty();
    for offset in 1..=2 {
        if day < offset {
            continue;
        }
        let end = day - offset;
        if end + 1 < roster.n_days() && is_duty(roster.get(end + 1, person)) {
            continue;
        }
        if run_left(roster, person, end, is_duty) >= 7 {
            return false;
        }
    }
    true
}

/// Un jour de week-end est travaillé s'il porte une garde de
/// couverture ; un congé ou un CPD isolé ne consomme pas de week-end.
pub fn covers_on(roster: &Roster, person: usize, day: usize) -> bool {
    roster.get(day, person).counts_toward_cover()
}

/// Paires complètes samedi+dimanche où la personne travaille au moins
/// un jour.
pub fn worked_weekends(horizon: &Horizon, roster: &Roster, person: usize) -> usize {
    horizon
        .weekends
        .iter()
        .filter(|w| w.is_full())
        .filter(|w| {
            w.sat.map_or(false, |d| covers_on(roster, person, d))
                || w.sun.map_or(false, |d| covers_on(roster, person, d))
        })
        .count()
}

/// Plafond dur : ceil(week-ends complets actifs x WTE / 2).
pub fn weekend_cap(problem: &ProblemInput, horizon: &Horizon, person: usize) -> usize {
    let n = horizon.active_full_weekends(person) as i64;
    let wte = problem.people[person].wte_millis();
    ((n * wte + 1999) / 2000) as usize
}

/// Plafond ferme (préférence 1 sur 3) : ceil(week-ends complets actifs
/// x WTE / 3).
pub fn firm_weekend_cap(problem: &ProblemInput, horizon: &Horizon, person: usize) -> usize {
    let n = horizon.active_full_weekends(person) as i64;
    let wte = problem.people[person].wte_millis();
    ((n * wte + 2999) / 3000) as usize
}

/// Un placement de couverture à `day` ferait-il dépasser le plafond
/// dur de week-ends ?
pub fn weekend_cap_ok(
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
    person: usize,
    day: usize,
) -> bool {
    if !horizon.is_weekend[day] {
        return true;
    }
    let Some(weekend) = horizon
        .weekends
        .iter()
        .find(|w| w.sat == Some(day) || w.sun == Some(day))
    else {
        return true;
    };
    if !weekend.is_full() {
        return true;
    }
    let already_worked = weekend.sat.map_or(false, |d| covers_on(roster, person, d))
        || weekend.sun.map_or(false, |d| covers_on(roster, person, d));
    if already_worked {
        return true;
    }
    worked_weekends(horizon, roster, person) + 1 <= weekend_cap(problem, horizon, person)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Roster;

    fn roster_with_nights(n_days: usize, nights: &[usize]) -> Roster {
        let mut r = Roster::new(n_days, 1);
        for &d in nights {
            r.set(d, 0, ShiftCode::Nr);
        }
        r
    }

    #[test]
    fn backward_rest_blocks_work_for_two_days_after_block_end() {
        let r = roster_with_nights(10, &[2, 3, 4]);
        // Block ends day 4; days 5 and 6 are rest.
        assert!(!backward_night_rest_ok(&r, 0, 5, ShiftCode::Sd));
        assert!(!backward_night_rest_ok(&r, 0, 6, ShiftCode::Sd));
        assert!(backward_night_rest_ok(&r, 0, 7, ShiftCode::Sd));
    }

    #[test]
    fn backward_rest_allows_block_extension() {
        let r = roster_with_nights(10, &[2, 3]);
        assert!(backward_night_rest_ok(&r, 0, 4, ShiftCode::Nr));
        assert!(!backward_night_rest_ok(&r, 0, 4, ShiftCode::Sd));
    }

    #[test]
    fn forward_rest_sees_committed_work() {
        let mut r = Roster::new(10, 1);
        r.set(4, 0, ShiftCode::Ldr);
        // A night on day 3 would end its block right before the LDR.
        assert!(!forward_night_rest_ok(&r, 0, 3));
        assert!(forward_night_rest_ok(&r, 0, 1));
    }

    #[test]
    fn spacing_requires_five_clear_days_between_blocks() {
        let r = roster_with_nights(20, &[2, 3, 4]);
        // Block ends day 4: next block may start day 10 at the earliest.
        assert!(!night_spacing_ok(&r, 0, 8));
        assert!(!night_spacing_ok(&r, 0, 9));
        assert!(night_spacing_ok(&r, 0, 10));
    }

    #[test]
    fn no_five_consecutive_nights() {
        let r = roster_with_nights(10, &[2, 3, 4, 5]);
        assert!(!max_consecutive_nights_ok(&r, 0, 6));
        assert!(!max_consecutive_nights_ok(&r, 0, 1));
    }

    #[test]
    fn window72_counts_leave_hours() {
        let mut r = Roster::new(7, 1);
        for d in 0..5 {
            r.set(d, 0, ShiftCode::Ldr);
        }
        // 65h so far; a 9h leave day would stay under, a 13h would not.
        assert!(window72_ok(&r, 0, 5, ShiftCode::Off));
        assert!(!window72_ok(&r, 0, 5, ShiftCode::Lv));
        assert!(!window72_ok(&r, 0, 5, ShiftCode::Ldr));
    }

    #[test]
    fn working_runs_capped_at_seven() {
        let mut r = Roster::new(12, 1);
        for d in 0..7 {
            r.set(d, 0, ShiftCode::Sd);
        }
        assert!(!working_run_ok(&r, 0, 7));
        assert!(!rest_after_working_run_ok(&r, 0, 7));
        assert!(!rest_after_working_run_ok(&r, 0, 8));
        assert!(rest_after_working_run_ok(&r, 0, 9));
    }

    #[test]
    fn long_block_rest_applies_for_two_days() {
        let mut r = Roster::new(12, 1);
        for d in 2..6 {
            r.set(d, 0, ShiftCode::Ldr);
        }
        assert!(!rest_after_long_block_ok(&r, 0, 6));
        assert!(!rest_after_long_block_ok(&r, 0, 7));
        assert!(rest_after_long_block_ok(&r, 0, 8));
    }
}
