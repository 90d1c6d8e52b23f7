use crate::model::ProblemInput;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashMap;

/// Une paire samedi/dimanche ; chaque moitié peut tomber hors horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weekend {
    pub sat: Option<usize>,
    pub sun: Option<usize>,
}

impl Weekend {
    /// Les plafonds ne portent que sur les paires complètes ; les
    /// moitiés en bord d'horizon comptent quand même comme
    /// travaillées dans les totaux.
    pub fn is_full(&self) -> bool {
        self.sat.is_some() && self.sun.is_some()
    }
}

/// Séquence de jours matérialisée, plus les masques par jour que
/// consultent toutes les contraintes.
#[derive(Debug, Clone)]
pub struct Horizon {
    pub days: Vec<NaiveDate>,
    day_index: HashMap<NaiveDate, usize>,
    /// 0=lundi .. 6=dimanche pour chaque jour.
    pub weekday: Vec<u8>,
    pub is_weekend: Vec<bool>,
    pub is_bank_holiday: Vec<bool>,
    pub is_comet_week: Vec<bool>,
    pub is_registrar_teaching: Vec<bool>,
    pub is_sho_teaching: Vec<bool>,
    pub is_pccu_teaching: Vec<bool>,
    pub is_induction: Vec<bool>,
    pub weekends: Vec<Weekend>,
    /// Par personne : indice du premier jour planifiable (0 sans date
    /// d'arrivée).
    pub start_index: Vec<usize>,
    /// Semaines CoMET en plages d'indices incluses, bornées à
    /// l'horizon.
    pub comet_weeks: Vec<(usize, usize)>,
}

impl Horizon {
    pub fn build(problem: &ProblemInput) -> Self {
        let cfg = &problem.config;
        let mut days = Vec::new();
        let mut current = cfg.start_date;
        while current <= cfg.end_date {
            days.push(current);
            current = current.succ_opt().expect("date overflow");
        }
        let n = days.len();
        let day_index: HashMap<NaiveDate, usize> =
            days.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let weekday: Vec<u8> = days
            .iter()
            .map(|d| d.weekday().num_days_from_monday() as u8)
            .collect();
        let is_weekend: Vec<bool> = weekday.iter().map(|w| *w >= 5).collect();
        let is_bank_holiday: Vec<bool> =
            days.iter().map(|d| cfg.bank_holidays.contains(d)).collect();

        // Les semaines CoMET courent du lundi au dimanche autour de
        // chaque lundi configuré.
        let mondays: Vec<NaiveDate> = cfg
            .comet_mondays
            .iter()
            .map(|d| *d - Duration::days(i64::from(d.weekday().num_days_from_monday())))
            .collect();
        let mut is_comet_week = vec![false; n];
        let mut comet_weeks = Vec::new();
        for monday in &mondays {
            let week_end = *monday + Duration::days(6);
            if week_end < cfg.start_date || *monday > cfg.end_date {
                continue;
            }
            let lo = day_index.get(&(*monday).max(cfg.start_date)).copied();
            let hi = day_index.get(&week_end.min(cfg.end_date)).copied();
            if let (Some(lo), Some(hi)) = (lo, hi) {
                for mask in is_comet_week.iter_mut().take(hi + 1).skip(lo) {
                    *mask = true;
                }
                comet_weeks.push((lo, hi));
            }
        }
        comet_weeks.sort_unstable();
        comet_weeks.dedup();

        let mask_for = |dates: &[NaiveDate]| -> Vec<bool> {
            days.iter().map(|d| dates.contains(d)).collect()
        };
        let is_registrar_teaching = mask_for(&cfg.registrar_teaching_days);
        let is_sho_teaching = mask_for(&cfg.sho_teaching_days);
        let is_pccu_teaching = mask_for(&cfg.pccu_teaching_days);
        let is_induction = mask_for(&cfg.induction_days);

        let mut weekends = Vec::new();
        for (i, d) in days.iter().enumerate() {
            match d.weekday().num_days_from_monday() {
                5 => {
                    let sun = if i + 1 < n { Some(i + 1) } else { None };
                    weekends.push(Weekend { sat: Some(i), sun });
                }
                6 if i == 0 => {
                    weekends.push(Weekend {
                        sat: None,
                        sun: Some(0),
                    });
                }
                _ => {}
            }
        }

        let start_index: Vec<usize> = problem
            .people
            .iter()
            .map(|p| match p.start_date {
                Some(start) if start > cfg.start_date => {
                    day_index.get(&start).copied().unwrap_or(n)
                }
                _ => 0,
            })
            .collect();

        Self {
            days,
            day_index,
            weekday,
            is_weekend,
            is_bank_holiday,
            is_comet_week,
            is_registrar_teaching,
            is_sho_teaching,
            is_pccu_teaching,
            is_induction,
            weekends,
            start_index,
            comet_weeks,
        }
    }

    pub fn n_days(&self) -> usize {
        self.days.len()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.day_index.get(&date).copied()
    }

    pub fn weeks(&self) -> f64 {
        self.n_days() as f64 / 7.0
    }

    /// Jours où `person` est planifiable.
    pub fn active_days(&self, person: usize) -> usize {
        self.n_days().saturating_sub(self.start_index[person])
    }

    /// Paires complètes samedi+dimanche à partir du premier jour de la
    /// personne.
    pub fn active_full_weekends(&self, person: usize) -> usize {
        let start = self.start_index[person];
        self.weekends
            .iter()
            .filter(|w| w.is_full() && w.sat.map_or(false, |s| s >= start))
            .count()
    }

    /// Un jour ouvré portant la couverture SD : ni week-end, ni férié,
    /// ni journée d'induction.
    pub fn is_sd_day(&self, day: usize) -> bool {
        !self.is_weekend[day] && !self.is_bank_holiday[day] && !self.is_induction[day]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Grade, Person, ProblemInput, Weights};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn problem(start: NaiveDate, end: NaiveDate) -> ProblemInput {
        ProblemInput {
            people: vec![Person::new("r1", "Reg One", Grade::Registrar)],
            config: Config::new(start, end),
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn comet_mask_covers_the_whole_week() {
        // Mon 2025-02-03 .. Sun 2025-02-16, first week CoMET-on.
        let mut pb = problem(date(2025, 2, 3), date(2025, 2, 16));
        pb.config.comet_mondays = vec![date(2025, 2, 3)];
        let hz = Horizon::build(&pb);
        assert_eq!(hz.n_days(), 14);
        assert!(hz.is_comet_week[0]);
        assert!(hz.is_comet_week[6]);
        assert!(!hz.is_comet_week[7]);
        assert_eq!(hz.comet_weeks, vec![(0, 6)]);
    }

    #[test]
    fn comet_monday_is_normalised_to_its_week() {
        let mut pb = problem(date(2025, 2, 3), date(2025, 2, 9));
        // A Wednesday; the whole surrounding week is CoMET-on.
        pb.config.comet_mondays = vec![date(2025, 2, 5)];
        let hz = Horizon::build(&pb);
        assert!(hz.is_comet_week.iter().all(|&c| c));
    }

    #[test]
    fn weekend_pairs_and_boundary_halves() {
        // Sun 2025-02-02 .. Sat 2025-02-15: leading Sunday half, one
        // full pair, trailing Saturday half.
        let pb = problem(date(2025, 2, 2), date(2025, 2, 15));
        let hz = Horizon::build(&pb);
        assert_eq!(hz.weekends.len(), 3);
        assert!(!hz.weekends[0].is_full());
        assert!(hz.weekends[1].is_full());
        assert!(!hz.weekends[2].is_full());
    }

    #[test]
    fn start_date_gates_active_days() {
        let mut pb = problem(date(2025, 2, 3), date(2025, 2, 16));
        pb.people[0].start_date = Some(date(2025, 2, 10));
        let hz = Horizon::build(&pb);
        assert_eq!(hz.start_index[0], 7);
        assert_eq!(hz.active_days(0), 7);
        assert_eq!(hz.active_full_weekends(0), 1);
    }
}
