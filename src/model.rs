use crate::catalogue::{CoverRole, ShiftCode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiant fort pour Person
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(String);

impl PersonId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "SHO")]
    Sho,
    Registrar,
    Supernumerary,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Sho => "SHO",
            Grade::Registrar => "Registrar",
            Grade::Supernumerary => "Supernumerary",
        }
    }
}

/// Un clinicien du planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub grade: Grade,
    /// Fraction d'équivalent temps plein, 0.2..=1.0.
    #[serde(default = "default_wte")]
    pub wte: f64,
    /// 0=lundi .. 6=dimanche ; ne s'applique que si wte < 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_day_off: Option<u8>,
    #[serde(default)]
    pub comet_eligible: bool,
    /// Premier jour planifiable (inclus) ; début d'horizon par défaut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_entitlement: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpd_entitlement: Option<u16>,
}

fn default_wte() -> f64 {
    1.0
}

impl Person {
    pub fn new<I: AsRef<str>, N: Into<String>>(id: I, name: N, grade: Grade) -> Self {
        Self {
            id: PersonId::new(id),
            name: name.into(),
            grade,
            wte: 1.0,
            fixed_day_off: None,
            comet_eligible: false,
            start_date: None,
            leave_entitlement: None,
            cpd_entitlement: None,
        }
    }

    pub fn with_wte(mut self, wte: f64) -> Self {
        self.wte = wte;
        self
    }

    pub fn with_comet(mut self) -> Self {
        self.comet_eligible = true;
        self
    }

    /// WTE en millièmes entiers, l'unité de toute l'arithmétique
    /// d'équité.
    pub fn wte_millis(&self) -> i64 {
        (self.wte * 1000.0).round() as i64
    }
}

/// Dates de l'horizon, caractéristiques du calendrier et calendrier de
/// formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub bank_holidays: Vec<NaiveDate>,
    /// Lundis marquant les semaines CoMET ; tout autre jour est ramené
    /// au lundi de sa semaine à la lecture.
    #[serde(default)]
    pub comet_mondays: Vec<NaiveDate>,
    #[serde(default)]
    pub registrar_teaching_days: Vec<NaiveDate>,
    #[serde(default)]
    pub sho_teaching_days: Vec<NaiveDate>,
    #[serde(default)]
    pub pccu_teaching_days: Vec<NaiveDate>,
    #[serde(default)]
    pub induction_days: Vec<NaiveDate>,
    #[serde(default = "default_sd_min")]
    pub sd_weekday_min: u8,
    #[serde(default = "default_sd_max")]
    pub sd_weekday_max: u8,
    #[serde(default = "default_sd_target")]
    pub sd_weekday_target: u8,
}

fn default_sd_min() -> u8 {
    1
}
fn default_sd_max() -> u8 {
    3
}
fn default_sd_target() -> u8 {
    3
}

impl Config {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            bank_holidays: Vec::new(),
            comet_mondays: Vec::new(),
            registrar_teaching_days: Vec::new(),
            sho_teaching_days: Vec::new(),
            pccu_teaching_days: Vec::new(),
            induction_days: Vec::new(),
            sd_weekday_min: default_sd_min(),
            sd_weekday_max: default_sd_max(),
            sd_weekday_target: default_sd_target(),
        }
    }
}

/// Poids de l'objectif, du palier le plus fort au plus faible. Les
/// défauts gardent l'échelle des locums ordonnée CMN >= N >= CMD >=
/// LD férié >= LD week-end >= LD semaine >= SD semaine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub locum_comet_night: i64,
    pub locum_night: i64,
    pub locum_comet_day: i64,
    pub locum_long_day_holiday: i64,
    pub locum_long_day_weekend: i64,
    pub locum_long_day: i64,
    pub locum_short_day: i64,
    pub preassignment: i64,
    pub firm_weekend: i64,
    pub training_gap: i64,
    pub sd_deviation: i64,
    pub weekend_split: i64,
    pub weekly_hours: i64,
    pub night_shape: i64,
    pub fairness_variance: i64,
    pub fairness_band: i64,
    pub training_band: i64,
    pub continuity: i64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            locum_comet_night: 1500,
            locum_night: 1400,
            locum_comet_day: 1300,
            locum_long_day_holiday: 1200,
            locum_long_day_weekend: 1100,
            locum_long_day: 1000,
            locum_short_day: 600,
            preassignment: 400,
            firm_weekend: 120,
            training_gap: 80,
            sd_deviation: 40,
            weekend_split: 30,
            weekly_hours: 25,
            night_shape: 20,
            fairness_variance: 5,
            fairness_band: 3,
            training_band: 2,
            continuity: 1,
        }
    }
}

/// Un triplet (personne, date, code) qui prime sur le choix du
/// solveur. Les codes d'absence sont fermes ; le reste est un souhait
/// pénalisé.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preassignment {
    pub person: PersonId,
    pub date: NaiveDate,
    /// Code brut ; les anciens `LD`/`N` sont canonisés selon le grade.
    pub code: String,
}

/// Le problème fourni à l'un ou l'autre solveur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInput {
    pub people: Vec<Person>,
    pub config: Config,
    #[serde(default)]
    pub preassignments: Vec<Preassignment>,
    #[serde(default)]
    pub weights: Weights,
}

/// Une préaffectation résolue contre l'horizon et la table des
/// personnes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCell {
    pub person: usize,
    pub day: usize,
    pub code: ShiftCode,
    pub hard: bool,
}

/// Locum par rôle pour un jour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocumCounts {
    pub ld_reg: u8,
    pub ld_sho: u8,
    pub n_reg: u8,
    pub n_sho: u8,
    pub cmd: u8,
    pub cmn: u8,
    pub sd: u8,
}

impl LocumCounts {
    pub fn get(&self, role: CoverRole) -> u8 {
        match role {
            CoverRole::LdReg => self.ld_reg,
            CoverRole::LdSho => self.ld_sho,
            CoverRole::NReg => self.n_reg,
            CoverRole::NSho => self.n_sho,
            CoverRole::CometDay => self.cmd,
            CoverRole::CometNight => self.cmn,
            CoverRole::ShortDay => self.sd,
        }
    }

    pub fn set(&mut self, role: CoverRole, value: u8) {
        match role {
            CoverRole::LdReg => self.ld_reg = value,
            CoverRole::LdSho => self.ld_sho = value,
            CoverRole::NReg => self.n_reg = value,
            CoverRole::NSho => self.n_sho = value,
            CoverRole::CometDay => self.cmd = value,
            CoverRole::CometNight => self.cmn = value,
            CoverRole::ShortDay => self.sd = value,
        }
    }

    pub fn total(&self) -> u32 {
        u32::from(self.ld_reg)
            + u32::from(self.ld_sho)
            + u32::from(self.n_reg)
            + u32::from(self.n_sho)
            + u32::from(self.cmd)
            + u32::from(self.cmn)
            + u32::from(self.sd)
    }
}

/// Grille dense jour x personne des codes, plus les locums par jour.
/// Seul état mutable pendant une résolution ; immuable une fois rendue.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    n_days: usize,
    n_people: usize,
    cells: Vec<ShiftCode>,
    locums: Vec<LocumCounts>,
}

impl Roster {
    pub fn new(n_days: usize, n_people: usize) -> Self {
        Self {
            n_days,
            n_people,
            cells: vec![ShiftCode::Off; n_days * n_people],
            locums: vec![LocumCounts::default(); n_days],
        }
    }

    pub fn n_days(&self) -> usize {
        self.n_days
    }

    pub fn n_people(&self) -> usize {
        self.n_people
    }

    pub fn get(&self, day: usize, person: usize) -> ShiftCode {
        self.cells[day * self.n_people + person]
    }

    pub fn set(&mut self, day: usize, person: usize, code: ShiftCode) {
        self.cells[day * self.n_people + person] = code;
    }

    pub fn clear(&mut self, day: usize, person: usize) {
        self.set(day, person, ShiftCode::Off);
    }

    pub fn is_off(&self, day: usize, person: usize) -> bool {
        self.get(day, person) == ShiftCode::Off
    }

    pub fn locums(&self, day: usize) -> &LocumCounts {
        &self.locums[day]
    }

    pub fn locums_mut(&mut self, day: usize) -> &mut LocumCounts {
        &mut self.locums[day]
    }

    /// Qui tient `code` le jour `day`, le cas échéant.
    pub fn assignee(&self, day: usize, code: ShiftCode) -> Option<usize> {
        (0..self.n_people).find(|&p| self.get(day, p) == code)
    }

    pub fn count_on_day(&self, day: usize, code: ShiftCode) -> usize {
        (0..self.n_people)
            .filter(|&p| self.get(day, p) == code)
            .count()
    }

    pub fn count_for_person(&self, person: usize, code: ShiftCode) -> usize {
        (0..self.n_days)
            .filter(|&d| self.get(d, person) == code)
            .count()
    }

    pub fn night_at(&self, day: usize, person: usize) -> bool {
        self.get(day, person).is_night()
    }

    pub fn working_at(&self, day: usize, person: usize) -> bool {
        self.get(day, person).is_working()
    }

    pub fn total_hours(&self, person: usize) -> u32 {
        (0..self.n_days).map(|d| self.get(d, person).hours()).sum()
    }

    pub fn total_assigned(&self) -> u32 {
        self.cells.iter().filter(|c| **c != ShiftCode::Off).count() as u32
    }
}
