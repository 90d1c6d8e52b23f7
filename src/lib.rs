#![forbid(unsafe_code)]
//! Rotaplan : planification de gardes sous contraintes pour une équipe
//! de réanimation pédiatrique (sans base de données).
//!
//! - Grille dense jour x personne avec slack locum par rôle.
//! - Règles dures de repos, de couverture et d'équité derrière un seul
//!   filtre de placement.
//! - Deux solveurs : une résolution globale en deux passes et une
//!   décomposition par étapes avec checkpoints synchrones.
//! - Toutes les dates sont des dates calendaires (ISO-8601 une fois
//!   sérialisées).

pub mod catalogue;
pub mod constraints;
pub mod horizon;
pub mod io;
pub mod model;
pub mod objective;
pub mod report;
pub mod sample;
pub mod solver;
pub mod storage;
pub mod validate;

pub use catalogue::{CoverRole, ShiftCode, ALL_CODES, ALL_ROLES, MANDATORY_COVER};
pub use horizon::{Horizon, Weekend};
pub use model::{
    Config, FixedCell, Grade, LocumCounts, Person, PersonId, Preassignment, ProblemInput, Roster,
    Weights,
};
pub use objective::ObjectiveBreakdown;
pub use report::{BreachReport, Summary};
pub use solver::global::solve as solve_roster;
pub use solver::staged::{
    AutoContinue, CheckpointController, CheckpointDecision, Stage, StageResult, StageStats,
    StagedSolver,
};
pub use solver::{SolveOptions, SolveOutcome};
pub use storage::{JsonStorage, Storage};
pub use validate::{validate, RosterError};
