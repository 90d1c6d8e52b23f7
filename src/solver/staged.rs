//! Solveur par étapes : six étapes ordonnées, chacune s'engageant dans
//! le roster partiel avant la suivante, avec des checkpoints synchrones
//! pour un contrôleur externe entre les étapes. Une étape ne réécrit
//! jamais les engagements d'une étape antérieure.

use crate::catalogue::ShiftCode;
use crate::constraints::{placement_allowed, recompute_locums, violations};
use crate::horizon::Horizon;
use crate::model::{FixedCell, PersonId, ProblemInput, Roster};
use crate::solver::{comet, comet_days, holidays, long_days, nights, short_days};
use crate::solver::{Deadline, SolveOptions};
use crate::validate::{validate, RosterError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::info;

/// Identifiants stables des étapes, dans l'ordre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CometNights,
    Nights,
    WeekendHolidays,
    CometDays,
    WeekdayLongDays,
    ShortDays,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::CometNights,
        Stage::Nights,
        Stage::WeekendHolidays,
        Stage::CometDays,
        Stage::WeekdayLongDays,
        Stage::ShortDays,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::CometNights => "comet_nights",
            Stage::Nights => "nights",
            Stage::WeekendHolidays => "weekend_holidays",
            Stage::CometDays => "comet_days",
            Stage::WeekdayLongDays => "weekday_long_days",
            Stage::ShortDays => "short_days",
        }
    }

    pub fn from_name(name: &str) -> Option<Stage> {
        Stage::ALL.iter().copied().find(|s| s.name() == name)
    }

    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    fn index(self) -> usize {
        Stage::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

/// Réponse du contrôleur à un checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointDecision {
    Continue,
    Pause,
    Abort,
}

/// Contrat de checkpoint synchrone : le solveur remet le résultat
/// d'étape, attend la décision, puis reprend.
pub trait CheckpointController {
    fn decide(&mut self, result: &StageResult) -> CheckpointDecision;
}

/// Contrôleur qui continue toujours.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoContinue;

impl CheckpointController for AutoContinue {
    fn decide(&mut self, _result: &StageResult) -> CheckpointDecision {
        CheckpointDecision::Continue
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageStats {
    pub shift_counts: BTreeMap<String, u32>,
    pub total_assigned: u32,
    pub days_covered: usize,
}

/// Résultat d'une étape (ou de la résolution par étapes entière).
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: String,
    pub success: bool,
    pub message: String,
    pub partial_roster: Roster,
    pub next_stage: Option<String>,
    pub stats: StageStats,
}

/// Construit le roster étape par étape. Possède le roster partiel et
/// le masque d'engagements ; rien d'autre ne les écrit.
pub struct StagedSolver {
    problem: ProblemInput,
    horizon: Horizon,
    fixed: Vec<FixedCell>,
    roster: Roster,
    committed: Vec<bool>,
    historical_cmd: Vec<u32>,
    historical_cmn: Vec<u32>,
    options: SolveOptions,
    rng: ChaCha8Rng,
}

impl StagedSolver {
    pub fn new(problem: ProblemInput) -> Result<Self, RosterError> {
        Self::with_options(problem, SolveOptions::default())
    }

    pub fn with_options(problem: ProblemInput, options: SolveOptions) -> Result<Self, RosterError> {
        let horizon = Horizon::build(&problem);
        let fixed = validate(&problem, &horizon)?;
        let n_people = problem.people.len();
        let mut roster = Roster::new(horizon.n_days(), n_people);
        let mut committed = vec![false; horizon.n_days() * n_people];

        // Les préaffectations fermes sont engagées d'emblée ; les
        // souhaits souples sont pris là où le filtre l'autorise, sinon
        // laissés au rapport de manquements.
        for f in &fixed {
            if f.hard {
                roster.set(f.day, f.person, f.code);
                committed[f.day * n_people + f.person] = true;
            }
        }
        for f in &fixed {
            if !f.hard && placement_allowed(&problem, &horizon, &roster, f.person, f.day, f.code) {
                roster.set(f.day, f.person, f.code);
                committed[f.day * n_people + f.person] = true;
            }
        }
        recompute_locums(&problem, &horizon, &mut roster);

        let rng = ChaCha8Rng::seed_from_u64(options.seed);
        Ok(Self {
            historical_cmd: vec![0; n_people],
            historical_cmn: vec![0; n_people],
            problem,
            horizon,
            fixed,
            roster,
            committed,
            options,
            rng,
        })
    }

    /// Amorce l'équité CoMET avec les comptes d'une période antérieure.
    pub fn with_historical_comet(mut self, counts: &HashMap<PersonId, (u32, u32)>) -> Self {
        for (i, person) in self.problem.people.iter().enumerate() {
            if let Some((cmd, cmn)) = counts.get(&person.id) {
                self.historical_cmd[i] = *cmd;
                self.historical_cmn[i] = *cmn;
            }
        }
        self
    }

    pub fn problem(&self) -> &ProblemInput {
        &self.problem
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn fixed_cells(&self) -> &[FixedCell] {
        &self.fixed
    }

    /// Instantané du roster partiel.
    pub fn get_current_roster(&self) -> Roster {
        self.roster.clone()
    }

    /// Audite le roster partiel contre toutes les règles dures.
    pub fn check_hard_constraints(&self) -> violations::ViolationReport {
        violations::audit(&self.problem, &self.horizon, &self.roster)
    }

    pub fn roster_statistics(&self) -> StageStats {
        let mut shift_counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut total_assigned = 0u32;
        for day in 0..self.roster.n_days() {
            for person in 0..self.roster.n_people() {
                let code = self.roster.get(day, person);
                if code != ShiftCode::Off {
                    *shift_counts.entry(code.to_string()).or_insert(0) += 1;
                    total_assigned += 1;
                }
            }
        }
        StageStats {
            shift_counts,
            total_assigned,
            days_covered: self.roster.n_days(),
        }
    }

    /// Exécute une seule étape par son identifiant stable.
    pub fn solve_stage(&mut self, name: &str, timeout: Duration) -> Result<StageResult, RosterError> {
        let stage =
            Stage::from_name(name).ok_or_else(|| RosterError::UnknownStage(name.to_string()))?;
        Ok(self.run_stage(stage, timeout))
    }

    /// Exécute toutes les étapes avec un checkpoint après chacune.
    /// Avec `auto_continue` la résolution va au bout ; sans lui le
    /// solveur s'arrête au premier checkpoint et l'appelant reprend
    /// via `resume_from_stage` après revue.
    pub fn solve_with_checkpoints(&mut self, timeout: Duration, auto_continue: bool) -> StageResult {
        struct PauseEveryCheckpoint;
        impl CheckpointController for PauseEveryCheckpoint {
            fn decide(&mut self, _result: &StageResult) -> CheckpointDecision {
                CheckpointDecision::Pause
            }
        }
        if auto_continue {
            self.solve_with_controller(timeout, &mut AutoContinue)
        } else {
            self.solve_with_controller(timeout, &mut PauseEveryCheckpoint)
        }
    }

    pub fn solve_with_controller(
        &mut self,
        timeout: Duration,
        controller: &mut dyn CheckpointController,
    ) -> StageResult {
        self.run_stages(&Stage::ALL, timeout, controller)
    }

    /// Reprend à l'étape nommée après une pause.
    pub fn resume_from_stage(
        &mut self,
        name: &str,
        timeout: Duration,
    ) -> Result<StageResult, RosterError> {
        let stage =
            Stage::from_name(name).ok_or_else(|| RosterError::UnknownStage(name.to_string()))?;
        Ok(self.run_stages(&Stage::ALL[stage.index()..], timeout, &mut AutoContinue))
    }

    /// Reprend à l'étape nommée sous un contrôleur externe.
    pub fn resume_with_controller(
        &mut self,
        name: &str,
        timeout: Duration,
        controller: &mut dyn CheckpointController,
    ) -> Result<StageResult, RosterError> {
        let stage =
            Stage::from_name(name).ok_or_else(|| RosterError::UnknownStage(name.to_string()))?;
        Ok(self.run_stages(&Stage::ALL[stage.index()..], timeout, controller))
    }

    fn run_stages(
        &mut self,
        stages: &[Stage],
        timeout: Duration,
        controller: &mut dyn CheckpointController,
    ) -> StageResult {
        let mut last = None;
        for (i, stage) in stages.iter().enumerate() {
            let result = self.run_stage(*stage, timeout);
            if !result.success {
                return result;
            }
            let is_last = i + 1 == stages.len();
            if !is_last {
                match controller.decide(&result) {
                    CheckpointDecision::Continue => {}
                    CheckpointDecision::Pause => {
                        info!(stage = stage.name(), "paused at checkpoint");
                        return result;
                    }
                    CheckpointDecision::Abort => {
                        let mut aborted = result;
                        aborted.message =
                            format!("Aborted at checkpoint after '{}'", aborted.stage);
                        return aborted;
                    }
                }
            }
            last = Some(result);
        }
        match last {
            Some(mut result) => {
                result.stage = "complete".to_string();
                result.message = "All roster stages completed".to_string();
                result.next_stage = None;
                result
            }
            None => StageResult {
                stage: "complete".to_string(),
                success: true,
                message: "No stages to run".to_string(),
                partial_roster: self.roster.clone(),
                next_stage: None,
                stats: self.roster_statistics(),
            },
        }
    }

    fn run_stage(&mut self, stage: Stage, timeout: Duration) -> StageResult {
        info!(stage = stage.name(), "stage starting");
        let deadline = Deadline::after(timeout);
        let (success, message) = match stage {
            Stage::CometNights => {
                let packer =
                    comet::CometNightPacker::new(&self.problem, &self.horizon, &self.historical_cmn);
                if !packer.has_eligible() {
                    (false, "No CoMET eligible registrars found".to_string())
                } else {
                    let (_, message) = packer.run(&mut self.roster, deadline);
                    (true, message)
                }
            }
            Stage::Nights => {
                let sub = nights::NightSubSolve::for_registrars(&self.problem, &self.horizon);
                if !sub.has_eligible() {
                    (false, "No registrars available for unit nights".to_string())
                } else {
                    let (_, message) = sub.run(
                        &mut self.roster,
                        &self.committed,
                        &mut self.rng,
                        deadline,
                        self.options.improve_iterations,
                    );
                    (true, message)
                }
            }
            Stage::WeekendHolidays => {
                let (_, message) = holidays::run(&self.problem, &self.horizon, &mut self.roster);
                (true, message)
            }
            Stage::CometDays => comet_days::run(
                &self.problem,
                &self.horizon,
                &mut self.roster,
                &self.historical_cmd,
            ),
            Stage::WeekdayLongDays => {
                let (_, message) = long_days::run(&self.problem, &self.horizon, &mut self.roster);
                (true, message)
            }
            Stage::ShortDays => {
                let (_, message) = short_days::run(&self.problem, &self.horizon, &mut self.roster);
                (true, message)
            }
        };

        // Tout ce que l'étape a écrit est désormais engagé, dans
        // l'ordre des étapes.
        for day in 0..self.roster.n_days() {
            for person in 0..self.roster.n_people() {
                if !self.roster.is_off(day, person) {
                    self.committed[day * self.roster.n_people() + person] = true;
                }
            }
        }
        recompute_locums(&self.problem, &self.horizon, &mut self.roster);
        info!(stage = stage.name(), success, %message, "stage finished");

        StageResult {
            stage: stage.name().to_string(),
            success,
            message,
            partial_roster: self.roster.clone(),
            next_stage: stage.next().map(|s| s.name().to_string()),
            stats: self.roster_statistics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Grade, Person, Preassignment, Weights};
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
                Person::new("r2", "Reg Two", Grade::Registrar).with_comet(),
                Person::new("r3", "Reg Three", Grade::Registrar),
                Person::new("r4", "Reg Four", Grade::Registrar),
                Person::new("s1", "Sho One", Grade::Sho),
                Person::new("s2", "Sho Two", Grade::Sho),
            ],
            config,
            preassignments: Vec::new(),
            weights: Weights::default(),
        }
    }

    #[test]
    fn stage_names_round_trip_in_order() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "comet_nights",
                "nights",
                "weekend_holidays",
                "comet_days",
                "weekday_long_days",
                "short_days"
            ]
        );
        for s in Stage::ALL {
            assert_eq!(Stage::from_name(s.name()), Some(s));
        }
        assert_eq!(Stage::ShortDays.next(), None);
    }

    #[test]
    fn unknown_stage_is_an_error() {
        let mut solver = StagedSolver::new(problem()).unwrap();
        assert!(matches!(
            solver.solve_stage("naps", Duration::from_secs(1)),
            Err(RosterError::UnknownStage(_))
        ));
    }

    #[test]
    fn stages_never_rewrite_earlier_commitments() {
        let mut solver = StagedSolver::new(problem()).unwrap();
        let first = solver
            .solve_stage("comet_nights", Duration::from_secs(10))
            .unwrap();
        assert!(first.success);
        let snapshot = solver.get_current_roster();
        let committed: Vec<(usize, usize, ShiftCode)> = (0..snapshot.n_days())
            .flat_map(|d| (0..snapshot.n_people()).map(move |p| (d, p)))
            .filter(|&(d, p)| !snapshot.is_off(d, p))
            .map(|(d, p)| (d, p, snapshot.get(d, p)))
            .collect();
        assert!(!committed.is_empty());

        let second = solver.solve_stage("nights", Duration::from_secs(10)).unwrap();
        assert!(second.success);
        let after = solver.get_current_roster();
        for (d, p, code) in committed {
            assert_eq!(after.get(d, p), code, "cell ({d},{p}) was rewritten");
        }
    }

    #[test]
    fn pause_reports_next_stage_and_resume_finishes() {
        struct PauseAfterFirst {
            seen: usize,
        }
        impl CheckpointController for PauseAfterFirst {
            fn decide(&mut self, _result: &StageResult) -> CheckpointDecision {
                self.seen += 1;
                if self.seen == 1 {
                    CheckpointDecision::Pause
                } else {
                    CheckpointDecision::Continue
                }
            }
        }

        let mut solver = StagedSolver::new(problem()).unwrap();
        let mut controller = PauseAfterFirst { seen: 0 };
        let paused = solver.solve_with_controller(Duration::from_secs(10), &mut controller);
        assert!(paused.success);
        assert_eq!(paused.stage, "comet_nights");
        assert_eq!(paused.next_stage.as_deref(), Some("nights"));

        let done = solver
            .resume_from_stage("nights", Duration::from_secs(10))
            .unwrap();
        assert!(done.success);
        assert_eq!(done.stage, "complete");
    }

    #[test]
    fn hard_preassignment_survives_every_stage() {
        let mut pb = problem();
        pb.preassignments = vec![Preassignment {
            person: pb.people[0].id.clone(),
            date: date(2025, 2, 5),
            code: "LV".into(),
        }];
        let mut solver = StagedSolver::new(pb).unwrap();
        let result = solver.solve_with_checkpoints(Duration::from_secs(10), true);
        assert!(result.success);
        let r = solver.get_current_roster();
        assert_eq!(r.get(2, 0), ShiftCode::Lv);
    }
}
