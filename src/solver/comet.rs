//! Étape 1 : blocs de nuits CoMET, emballés semaine par semaine.
//!
//! Pour chaque semaine CoMET le packer essaie les motifs de blocs
//! hebdomadaires par ordre de priorité, confie chaque bloc au médecin
//! au plus grand manque ajusté WTE, puis déroule un nettoyage borné et
//! des nuits isolées en dernier recours. Le contrôle de repos tourne
//! dans les deux directions parce que le comblement des trous se fait
//! hors ordre des jours.

use crate::catalogue::ShiftCode;
use crate::constraints::placement_allowed;
use crate::horizon::Horizon;
use crate::model::{ProblemInput, Roster};
use crate::solver::Deadline;
use tracing::debug;

/// Motifs hebdomadaires, du meilleur au moindre.
const PATTERNS: [&[usize]; 5] = [&[4, 3], &[3, 4], &[3, 2, 2], &[2, 3, 2], &[2, 2, 3]];

const CLEANUP_ROUNDS: usize = 20;

pub(crate) struct CometNightPacker<'a> {
    problem: &'a ProblemInput,
    horizon: &'a Horizon,
    /// Comptes de CMN reportés d'une période antérieure.
    historical: &'a [u32],
    eligible: Vec<usize>,
    total_target: i64,
}

impl<'a> CometNightPacker<'a> {
    pub fn new(problem: &'a ProblemInput, horizon: &'a Horizon, historical: &'a [u32]) -> Self {
        let eligible: Vec<usize> = problem
            .people
            .iter()
            .enumerate()
            .filter(|(_, p)| p.comet_eligible)
            .map(|(i, _)| i)
            .collect();
        let total_target = horizon.is_comet_week.iter().filter(|c| **c).count() as i64;
        Self {
            problem,
            horizon,
            historical,
            eligible,
            total_target,
        }
    }

    pub fn has_eligible(&self) -> bool {
        !self.eligible.is_empty()
    }

    pub fn run(&self, roster: &mut Roster, deadline: Deadline) -> (u32, String) {
        for &(week_lo, week_hi) in &self.horizon.comet_weeks {
            if deadline.expired() {
                break;
            }
            self.pack_week(roster, week_lo, week_hi);
        }
        self.cleanup(roster, deadline);
        self.fill_singletons(roster);

        let assigned = self
            .eligible
            .iter()
            .map(|&p| roster.count_for_person(p, ShiftCode::Cmn) as u32)
            .sum::<u32>();
        let message = format!(
            "CoMET nights: {assigned}/{} covered across {} weeks",
            self.total_target,
            self.horizon.comet_weeks.len()
        );
        (assigned, message)
    }

    fn uncovered_days(&self, roster: &Roster, lo: usize, hi: usize) -> Vec<usize> {
        (lo..=hi)
            .filter(|&d| roster.assignee(d, ShiftCode::Cmn).is_none())
            .collect()
    }

    fn pack_week(&self, roster: &mut Roster, week_lo: usize, week_hi: usize) {
        let available = self.uncovered_days(roster, week_lo, week_hi);
        if available.len() < 4 {
            return;
        }
        for pattern in PATTERNS {
            if self.try_pattern(roster, &available, pattern) {
                return;
            }
        }
        // Aucun motif complet ne tient ; on prend la couverture en
        // blocs possible.
        self.pack_remnant(roster, week_lo, week_hi);
    }

    /// Pose le motif entier dans une série consécutive de jours
    /// libres, un médecin distinct par bloc.
    fn try_pattern(&self, roster: &mut Roster, available: &[usize], pattern: &[usize]) -> bool {
        let need: usize = pattern.iter().sum();
        for group in consecutive_groups(available) {
            if group.len() < need {
                continue;
            }
            for start in 0..=(group.len() - need) {
                let mut placed: Vec<(usize, Vec<usize>)> = Vec::new();
                let mut cursor = start;
                let mut used: Vec<usize> = Vec::new();
                let mut ok = true;
                for &block_size in pattern {
                    let days: Vec<usize> = group[cursor..cursor + block_size].to_vec();
                    match self.place_block(roster, &days, &used) {
                        Some(doctor) => {
                            used.push(doctor);
                            placed.push((doctor, days));
                            cursor += block_size;
                        }
                        None => {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    debug!(pattern = ?pattern, "packed CoMET week pattern");
                    return true;
                }
                for (doctor, days) in placed {
                    for d in days {
                        roster.clear(d, doctor);
                    }
                }
            }
        }
        false
    }

    /// Couverture partielle restante pour les semaines sans motif
    /// complet.
    fn pack_remnant(&self, roster: &mut Roster, week_lo: usize, week_hi: usize) {
        for block_size in [4, 3, 2] {
            loop {
                let uncovered = self.uncovered_days(roster, week_lo, week_hi);
                let mut placed = false;
                for group in consecutive_groups(&uncovered) {
                    if group.len() < block_size {
                        continue;
                    }
                    let days: Vec<usize> = group[..block_size].to_vec();
                    if self.place_block(roster, &days, &[]).is_some() {
                        placed = true;
                        break;
                    }
                }
                if !placed {
                    break;
                }
            }
        }
    }

    /// Affecte un bloc au meilleur médecin, ou le laisse vacant. La
    /// pose passe jour par jour par le filtre et s'annule en bloc.
    fn place_block(&self, roster: &mut Roster, days: &[usize], exclude: &[usize]) -> Option<usize> {
        let doctor = self.select_doctor(roster, days, exclude)?;
        let mut placed = Vec::new();
        for &d in days {
            if placement_allowed(self.problem, self.horizon, roster, doctor, d, ShiftCode::Cmn) {
                roster.set(d, doctor, ShiftCode::Cmn);
                placed.push(d);
            } else {
                for undo in placed {
                    roster.clear(undo, doctor);
                }
                return None;
            }
        }
        Some(doctor)
    }

    /// Le plus grand manque ajusté WTE l'emporte ; la taille du bloc
    /// infléchit le choix pour garder les temps partiels sur des
    /// séries de 2-3 nuits.
    fn select_doctor(&self, roster: &Roster, days: &[usize], exclude: &[usize]) -> Option<usize> {
        let total_wte: i64 = self
            .eligible
            .iter()
            .map(|&p| self.problem.people[p].wte_millis())
            .sum();
        if total_wte == 0 {
            return None;
        }
        let block_size = days.len();
        let mut best: Option<(i64, usize)> = None;
        for &p in &self.eligible {
            if exclude.contains(&p) {
                continue;
            }
            if !days.iter().all(|&d| roster.is_off(d, p)) {
                continue;
            }
            let adjusted = self.adjusted_shortfall_millis(roster, p, block_size, total_wte);
            match best {
                Some((score, _)) if adjusted <= score => {}
                _ => best = Some((adjusted, p)),
            }
        }
        best.map(|(_, p)| p)
    }

    fn shortfall_millis(&self, roster: &Roster, p: usize, total_wte: i64) -> i64 {
        let person = &self.problem.people[p];
        let target = self.total_target * 1000 * person.wte_millis() / total_wte;
        let current =
            (roster.count_for_person(p, ShiftCode::Cmn) as i64 + i64::from(self.historical[p])) * 1000;
        target - current
    }

    fn adjusted_shortfall_millis(
        &self,
        roster: &Roster,
        p: usize,
        block_size: usize,
        total_wte: i64,
    ) -> i64 {
        let mut adjusted = self.shortfall_millis(roster, p, total_wte);

        // Sous 90 % de la cible la priorité monte, au-dessus de 110 %
        // elle baisse.
        let person = &self.problem.people[p];
        let target = self.total_target * 1000 * person.wte_millis() / total_wte;
        if target > 0 {
            let current = (roster.count_for_person(p, ShiftCode::Cmn) as i64
                + i64::from(self.historical[p]))
                * 1000;
            let ratio_millis = current * 1000 / target;
            if ratio_millis < 900 {
                adjusted += (900 - ratio_millis) * 5;
            } else if ratio_millis > 1100 {
                adjusted -= (ratio_millis - 1100) * 3;
            }
        }

        let wte = self.problem.people[p].wte_millis();
        if wte <= 600 {
            if block_size >= 4 {
                adjusted -= 4000;
            } else if (2..=3).contains(&block_size) {
                adjusted += 1000;
            }
        } else if wte == 1000 && (3..=4).contains(&block_size) {
            adjusted += 500;
        }
        adjusted
    }

    /// Jusqu'à vingt tours d'équilibrage confiant des blocs de 2-3
    /// nuits aux médecins encore sous leur cible.
    fn cleanup(&self, roster: &mut Roster, deadline: Deadline) {
        let total_wte: i64 = self
            .eligible
            .iter()
            .map(|&p| self.problem.people[p].wte_millis())
            .sum();
        if total_wte == 0 {
            return;
        }
        let mut failures_by_doctor = vec![0u32; self.problem.people.len()];
        let mut consecutive_failures = 0u32;

        for round in 0..CLEANUP_ROUNDS {
            if deadline.expired() {
                break;
            }
            // Le médecin le plus loin sous 90 % de sa cible, s'il
            // existe.
            let Some(p) = self
                .eligible
                .iter()
                .copied()
                .filter(|&p| {
                    let person = &self.problem.people[p];
                    let target = self.total_target * 1000 * person.wte_millis() / total_wte;
                    let current = (roster.count_for_person(p, ShiftCode::Cmn) as i64
                        + i64::from(self.historical[p]))
                        * 1000;
                    current * 10 < target * 9
                })
                .max_by_key(|&p| (self.shortfall_millis(roster, p, total_wte), usize::MAX - p))
            else {
                debug!(round, "CoMET cleanup balanced");
                break;
            };

            let sizes: &[usize] = if self.problem.people[p].wte_millis() >= 800 {
                &[2, 3]
            } else {
                &[2]
            };
            if self.assign_small_block(roster, p, sizes) {
                consecutive_failures = 0;
                failures_by_doctor[p] = 0;
            } else {
                failures_by_doctor[p] += 1;
                consecutive_failures += 1;
                if failures_by_doctor[p] >= 3 || consecutive_failures >= 5 {
                    break;
                }
            }
        }
    }

    /// Un petit bloc n'importe où, semaine la moins chargée d'abord.
    fn assign_small_block(&self, roster: &mut Roster, doctor: usize, sizes: &[usize]) -> bool {
        let mut weeks: Vec<(usize, usize, usize)> = self
            .horizon
            .comet_weeks
            .iter()
            .map(|&(lo, hi)| {
                let assigned = (lo..=hi)
                    .filter(|&d| roster.assignee(d, ShiftCode::Cmn).is_some())
                    .count();
                (assigned, lo, hi)
            })
            .collect();
        weeks.sort_unstable();

        for &size in sizes {
            for &(_, lo, hi) in &weeks {
                let uncovered = self.uncovered_days(roster, lo, hi);
                for group in consecutive_groups(&uncovered) {
                    if group.len() < size {
                        continue;
                    }
                    for start in 0..=(group.len() - size) {
                        let days = &group[start..start + size];
                        if !days.iter().all(|&d| roster.is_off(d, doctor)) {
                            continue;
                        }
                        let mut placed = Vec::new();
                        let mut ok = true;
                        for &d in days {
                            if placement_allowed(
                                self.problem,
                                self.horizon,
                                roster,
                                doctor,
                                d,
                                ShiftCode::Cmn,
                            ) {
                                roster.set(d, doctor, ShiftCode::Cmn);
                                placed.push(d);
                            } else {
                                ok = false;
                                break;
                            }
                        }
                        if ok {
                            return true;
                        }
                        for undo in placed {
                            roster.clear(undo, doctor);
                        }
                    }
                }
            }
        }
        false
    }

    /// Dernier recours : nuits isolées sur les jours encore
    /// découverts, tant que la cible globale n'est pas atteinte. Les
    /// deux directions de repos passent par le filtre.
    fn fill_singletons(&self, roster: &mut Roster) {
        for &(lo, hi) in &self.horizon.comet_weeks {
            for day in lo..=hi {
                if roster.assignee(day, ShiftCode::Cmn).is_some() {
                    continue;
                }
                let assigned: i64 = self
                    .eligible
                    .iter()
                    .map(|&p| roster.count_for_person(p, ShiftCode::Cmn) as i64)
                    .sum();
                if assigned >= self.total_target {
                    return;
                }
                let best = self
                    .eligible
                    .iter()
                    .copied()
                    .filter(|&p| {
                        placement_allowed(self.problem, self.horizon, roster, p, day, ShiftCode::Cmn)
                    })
                    .min_by_key(|&p| {
                        let count = roster.count_for_person(p, ShiftCode::Cmn) as i64
                            + i64::from(self.historical[p]);
                        let wte = self.problem.people[p].wte_millis().max(1);
                        (count * 1_000_000 / wte, p)
                    });
                if let Some(p) = best {
                    roster.set(day, p, ShiftCode::Cmn);
                    debug!(day, doctor = p, "singleton CoMET night");
                }
            }
        }
    }
}

/// Séries maximales d'indices consécutifs.
pub(crate) fn consecutive_groups(days: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for &d in days {
        match groups.last_mut() {
            Some(group) if *group.last().unwrap() + 1 == d => group.push(d),
            _ => groups.push(vec![d]),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Grade, Person, ProblemInput, Weights};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn problem(n_regs: usize) -> ProblemInput {
        let mut config = Config::new(date(2025, 2, 3), date(2025, 2, 16));
        config.comet_mondays = vec![date(2025, 2, 3)];
        let people = (0..n_regs)
            .map(|i| Person::new(format!("r{i}"), format!("Reg {i}"), Grade::Registrar).with_comet())
            .collect();
        ProblemInput {
            people,
            config,
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn consecutive_groups_split_on_gaps() {
        assert_eq!(
            consecutive_groups(&[1, 2, 3, 5, 6, 9]),
            vec![vec![1, 2, 3], vec![5, 6], vec![9]]
        );
    }

    #[test]
    fn packs_a_full_week_with_two_doctors() {
        let pb = problem(3);
        let hz = Horizon::build(&pb);
        let mut r = Roster::new(hz.n_days(), 3);
        let historical = vec![0; 3];
        let packer = CometNightPacker::new(&pb, &hz, &historical);
        let (assigned, _) = packer.run(&mut r, Deadline::after(Duration::from_secs(10)));
        assert_eq!(assigned, 7, "one CoMET week has 7 nights");
        // Every night in the week is covered by exactly one doctor.
        for day in 0..7 {
            assert_eq!(r.count_on_day(day, ShiftCode::Cmn), 1);
        }
        // Blocks stay within 2..=4 nights.
        for p in 0..3 {
            let mut run = 0;
            for d in 0..r.n_days() {
                if r.get(d, p) == ShiftCode::Cmn {
                    run += 1;
                    assert!(run <= 4);
                } else {
                    run = 0;
                }
            }
        }
    }

    #[test]
    fn no_eligible_doctors_is_reported() {
        let mut pb = problem(1);
        pb.people[0].comet_eligible = false;
        let hz = Horizon::build(&pb);
        let historical = vec![0; 1];
        let packer = CometNightPacker::new(&pb, &hz, &historical);
        assert!(!packer.has_eligible());
    }
}
