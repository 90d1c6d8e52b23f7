use crate::catalogue::ALL_ROLES;
use crate::horizon::Horizon;
use crate::model::{Grade, Person, PersonId, ProblemInput, Roster};
use anyhow::{bail, Context};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::Path;

/// Charge un problème complet depuis JSON.
pub fn load_problem_json<P: AsRef<Path>>(path: P) -> anyhow::Result<ProblemInput> {
    let data = fs::read(&path)
        .with_context(|| format!("reading {}", path.as_ref().display()))?;
    let problem: ProblemInput = serde_json::from_slice(&data)
        .with_context(|| format!("parsing {}", path.as_ref().display()))?;
    Ok(problem)
}

/// Import de personnes depuis CSV : header
/// `id,name,grade,wte[,fixed_day_off][,comet_eligible][,start_date]`.
/// Un id vide en reçoit un généré.
pub fn import_people_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Person>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = rec.get(0).context("missing id")?.trim();
        let name = rec.get(1).context("missing name")?.trim();
        let grade_raw = rec.get(2).context("missing grade")?.trim();
        if name.is_empty() {
            bail!("invalid people row (empty name)");
        }
        let grade = parse_grade(grade_raw)
            .with_context(|| format!("invalid grade for {name}: {grade_raw}"))?;
        let mut person = if id.is_empty() {
            let mut p = Person::new("tmp", name, grade);
            p.id = PersonId::random();
            p
        } else {
            Person::new(id, name, grade)
        };
        if let Some(raw) = rec.get(3) {
            let raw = raw.trim();
            if !raw.is_empty() {
                person.wte = raw
                    .parse::<f64>()
                    .with_context(|| format!("invalid wte for {name}"))?;
            }
        }
        if let Some(raw) = rec.get(4) {
            let raw = raw.trim();
            if !raw.is_empty() {
                person.fixed_day_off = Some(
                    raw.parse::<u8>()
                        .with_context(|| format!("invalid fixed_day_off for {name}"))?,
                );
            }
        }
        if let Some(raw) = rec.get(5) {
            let raw = raw.trim();
            if !raw.is_empty() {
                person.comet_eligible = parse_bool(raw)
                    .with_context(|| format!("invalid comet_eligible for {name}"))?;
            }
        }
        if let Some(raw) = rec.get(6) {
            let raw = raw.trim();
            if !raw.is_empty() {
                person.start_date = Some(
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .with_context(|| format!("invalid start_date for {name}"))?,
                );
            }
        }
        out.push(person);
    }
    Ok(out)
}

fn parse_grade(s: &str) -> anyhow::Result<Grade> {
    match s {
        "SHO" | "sho" => Ok(Grade::Sho),
        "Registrar" | "registrar" => Ok(Grade::Registrar),
        "Supernumerary" | "supernumerary" => Ok(Grade::Supernumerary),
        _ => bail!("expected SHO, Registrar or Supernumerary"),
    }
}

fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => bail!("expected boolean"),
    }
}

/// Export CSV de la grille dense : une ligne par date, une colonne par
/// personne, colonnes locum à droite.
pub fn export_roster_csv<P: AsRef<Path>>(
    path: P,
    problem: &ProblemInput,
    horizon: &Horizon,
    roster: &Roster,
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(false).from_path(path)?;
    let mut header = vec!["date".to_string()];
    header.extend(problem.people.iter().map(|p| p.id.as_str().to_string()));
    header.extend(ALL_ROLES.iter().map(|r| r.column().to_string()));
    w.write_record(&header)?;

    let mut buf = itoa::Buffer::new();
    for (day, date) in horizon.days.iter().enumerate() {
        let mut row = vec![date.to_string()];
        for person in 0..roster.n_people() {
            row.push(roster.get(day, person).to_string());
        }
        for role in ALL_ROLES {
            row.push(buf.format(roster.locums(day).get(role)).to_string());
        }
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

/// Export JSON (jolie mise en forme) de toute pièce sérialisable du
/// rapport.
pub fn export_json<P: AsRef<Path>, T: serde::Serialize>(path: P, value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, Weights};
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn people_csv_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,name,grade,wte,fixed_day_off,comet_eligible,start_date").unwrap();
        writeln!(file, "r1,Reg One,Registrar,0.8,,true,2025-02-10").unwrap();
        writeln!(file, ",Sho One,SHO,1.0,4,,").unwrap();
        file.flush().unwrap();

        let people = import_people_csv(file.path()).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].id.as_str(), "r1");
        assert!(people[0].comet_eligible);
        assert_eq!(people[0].start_date, Some(date(2025, 2, 10)));
        assert_eq!(people[1].grade, Grade::Sho);
        assert_eq!(people[1].fixed_day_off, Some(4));
        assert!(!people[1].id.as_str().is_empty());
    }

    #[test]
    fn problem_json_round_trip() {
        let pb = ProblemInput {
            people: vec![Person::new("r1", "Reg One", Grade::Registrar)],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 9)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        export_json(file.path(), &pb).unwrap();
        let loaded = load_problem_json(file.path()).unwrap();
        assert_eq!(loaded, pb);
    }

    #[test]
    fn roster_csv_has_locum_columns() {
        let pb = ProblemInput {
            people: vec![Person::new("r1", "Reg One", Grade::Registrar)],
            config: Config::new(date(2025, 2, 3), date(2025, 2, 4)),
            preassignments: Vec::new(),
            weights: Weights::default(),
        };
        let hz = Horizon::build(&pb);
        let mut roster = Roster::new(hz.n_days(), 1);
        crate::constraints::recompute_locums(&pb, &hz, &mut roster);
        let file = tempfile::NamedTempFile::new().unwrap();
        export_roster_csv(file.path(), &pb, &hz, &roster).unwrap();
        let text = fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("date,r1,LOC_REG_LD"));
        assert!(text.contains("2025-02-03,OFF"));
    }
}
