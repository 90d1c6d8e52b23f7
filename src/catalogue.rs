use crate::model::Grade;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Codes de garde canoniques. Le catalogue est fixe et exhaustif ; le
/// locum est un compteur par jour, jamais un code affecté à une
/// personne.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShiftCode {
    #[serde(rename = "LDR")]
    Ldr,
    #[serde(rename = "LDS")]
    Lds,
    #[serde(rename = "NR")]
    Nr,
    #[serde(rename = "NS")]
    Ns,
    #[serde(rename = "CMD")]
    Cmd,
    #[serde(rename = "CMN")]
    Cmn,
    #[serde(rename = "SD")]
    Sd,
    #[serde(rename = "CPD")]
    Cpd,
    #[serde(rename = "TREG")]
    Treg,
    #[serde(rename = "TSHO")]
    Tsho,
    #[serde(rename = "TPCCU")]
    Tpccu,
    #[serde(rename = "IND")]
    Ind,
    #[serde(rename = "LV")]
    Lv,
    #[serde(rename = "SLV")]
    Slv,
    #[serde(rename = "LTFT")]
    Ltft,
    #[serde(rename = "OFF")]
    Off,
}

/// Tous les codes, dans l'ordre du catalogue.
pub const ALL_CODES: [ShiftCode; 16] = [
    ShiftCode::Ldr,
    ShiftCode::Lds,
    ShiftCode::Nr,
    ShiftCode::Ns,
    ShiftCode::Cmd,
    ShiftCode::Cmn,
    ShiftCode::Sd,
    ShiftCode::Cpd,
    ShiftCode::Treg,
    ShiftCode::Tsho,
    ShiftCode::Tpccu,
    ShiftCode::Ind,
    ShiftCode::Lv,
    ShiftCode::Slv,
    ShiftCode::Ltft,
    ShiftCode::Off,
];

/// Rôles à pourvoir chaque jour applicable, sinon une unité de locum
/// est enregistrée.
pub const MANDATORY_COVER: [ShiftCode; 6] = [
    ShiftCode::Ldr,
    ShiftCode::Lds,
    ShiftCode::Nr,
    ShiftCode::Ns,
    ShiftCode::Cmd,
    ShiftCode::Cmn,
];

impl ShiftCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ShiftCode::Ldr => "LDR",
            ShiftCode::Lds => "LDS",
            ShiftCode::Nr => "NR",
            ShiftCode::Ns => "NS",
            ShiftCode::Cmd => "CMD",
            ShiftCode::Cmn => "CMN",
            ShiftCode::Sd => "SD",
            ShiftCode::Cpd => "CPD",
            ShiftCode::Treg => "TREG",
            ShiftCode::Tsho => "TSHO",
            ShiftCode::Tpccu => "TPCCU",
            ShiftCode::Ind => "IND",
            ShiftCode::Lv => "LV",
            ShiftCode::Slv => "SLV",
            ShiftCode::Ltft => "LTFT",
            ShiftCode::Off => "OFF",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ShiftCode::Ldr => "Long Day (Registrar)",
            ShiftCode::Lds => "Long Day (SHO)",
            ShiftCode::Nr => "Night (Registrar)",
            ShiftCode::Ns => "Night (SHO)",
            ShiftCode::Cmd => "CoMET Day",
            ShiftCode::Cmn => "CoMET Night",
            ShiftCode::Sd => "Short Day",
            ShiftCode::Cpd => "CPD",
            ShiftCode::Treg => "Registrar Teaching",
            ShiftCode::Tsho => "SHO Teaching",
            ShiftCode::Tpccu => "PCCU Teaching",
            ShiftCode::Ind => "Induction",
            ShiftCode::Lv => "Leave",
            ShiftCode::Slv => "Study Leave",
            ShiftCode::Ltft => "LTFT Day",
            ShiftCode::Off => "Off",
        }
    }

    /// Heures planifiées du code. Congés et congés d'étude comptent
    /// 9h ; LTFT et OFF n'en portent aucune.
    pub fn hours(self) -> u32 {
        match self {
            ShiftCode::Ldr | ShiftCode::Lds | ShiftCode::Nr | ShiftCode::Ns => 13,
            ShiftCode::Cmd | ShiftCode::Cmn => 12,
            ShiftCode::Sd
            | ShiftCode::Cpd
            | ShiftCode::Treg
            | ShiftCode::Tsho
            | ShiftCode::Tpccu
            | ShiftCode::Ind
            | ShiftCode::Lv
            | ShiftCode::Slv => 9,
            ShiftCode::Ltft | ShiftCode::Off => 0,
        }
    }

    pub fn counts_toward_cover(self) -> bool {
        matches!(
            self,
            ShiftCode::Ldr
                | ShiftCode::Lds
                | ShiftCode::Nr
                | ShiftCode::Ns
                | ShiftCode::Cmd
                | ShiftCode::Cmn
                | ShiftCode::Sd
        )
    }

    pub fn grade_requirement(self) -> Option<Grade> {
        match self {
            ShiftCode::Ldr | ShiftCode::Nr | ShiftCode::Cmd | ShiftCode::Cmn | ShiftCode::Treg => {
                Some(Grade::Registrar)
            }
            ShiftCode::Lds | ShiftCode::Ns | ShiftCode::Tsho => Some(Grade::Sho),
            _ => None,
        }
    }

    pub fn is_night(self) -> bool {
        matches!(self, ShiftCode::Nr | ShiftCode::Ns | ShiftCode::Cmn)
    }

    /// Les gardes longues dépassent 10 heures.
    pub fn is_long(self) -> bool {
        self.hours() > 10
    }

    pub fn is_working(self) -> bool {
        self.hours() > 0
    }

    /// Présence sur site : temps travaillé hors congés. Les règles de
    /// séquence bornent la présence, donc quinze jours de congés ne
    /// forment pas une « série » illégale.
    pub fn is_duty(self) -> bool {
        self.is_working() && !matches!(self, ShiftCode::Lv | ShiftCode::Slv)
    }

    pub fn is_comet(self) -> bool {
        matches!(self, ShiftCode::Cmd | ShiftCode::Cmn)
    }

    /// Les codes d'absence sont fermes en préaffectation ; le reste
    /// est un souhait que le solveur peut arbitrer contre couverture
    /// et repos.
    pub fn is_hard_preassignment(self) -> bool {
        matches!(
            self,
            ShiftCode::Lv | ShiftCode::Slv | ShiftCode::Ltft | ShiftCode::Cpd | ShiftCode::Off
        )
    }

    pub fn is_training(self) -> bool {
        matches!(
            self,
            ShiftCode::Treg | ShiftCode::Tsho | ShiftCode::Tpccu | ShiftCode::Ind
        )
    }

    /// Canonise un code brut selon le grade. L'ancien catalogue
    /// utilisait un seul couple `LD`/`N`, le grade étant levé
    /// ailleurs ; la forme canonique porte les comptes de couverture
    /// filtrés par grade.
    pub fn canonicalise(raw: &str, grade: Grade) -> Option<ShiftCode> {
        match raw {
            "LD" => match grade {
                Grade::Registrar => Some(ShiftCode::Ldr),
                Grade::Sho => Some(ShiftCode::Lds),
                Grade::Supernumerary => None,
            },
            "N" => match grade {
                Grade::Registrar => Some(ShiftCode::Nr),
                Grade::Sho => Some(ShiftCode::Ns),
                Grade::Supernumerary => None,
            },
            other => other.parse().ok(),
        }
    }
}

impl fmt::Display for ShiftCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_CODES
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown shift code: {s}"))
    }
}

/// Rôles de couverture, un compteur de locum chacun par jour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverRole {
    LdReg,
    LdSho,
    NReg,
    NSho,
    CometDay,
    CometNight,
    ShortDay,
}

pub const ALL_ROLES: [CoverRole; 7] = [
    CoverRole::LdReg,
    CoverRole::LdSho,
    CoverRole::NReg,
    CoverRole::NSho,
    CoverRole::CometDay,
    CoverRole::CometNight,
    CoverRole::ShortDay,
];

impl CoverRole {
    /// Nom de colonne dans la table des locums en sortie.
    pub fn column(self) -> &'static str {
        match self {
            CoverRole::LdReg => "LOC_REG_LD",
            CoverRole::LdSho => "LOC_SHO_LD",
            CoverRole::NReg => "LOC_REG_N",
            CoverRole::NSho => "LOC_SHO_N",
            CoverRole::CometDay => "LOC_REG_CMD",
            CoverRole::CometNight => "LOC_REG_CMN",
            CoverRole::ShortDay => "LOC_SD_ANY",
        }
    }

    /// Clé dans le rapport de manquements en sortie.
    pub fn breach_key(self) -> &'static str {
        match self {
            CoverRole::LdReg => "ld_reg",
            CoverRole::LdSho => "ld_sho",
            CoverRole::NReg => "n_reg",
            CoverRole::NSho => "n_sho",
            CoverRole::CometDay => "comet_day",
            CoverRole::CometNight => "comet_night",
            CoverRole::ShortDay => "sd_weekday",
        }
    }

    /// Le code de garde qui pourvoit ce rôle.
    pub fn code(self) -> ShiftCode {
        match self {
            CoverRole::LdReg => ShiftCode::Ldr,
            CoverRole::LdSho => ShiftCode::Lds,
            CoverRole::NReg => ShiftCode::Nr,
            CoverRole::NSho => ShiftCode::Ns,
            CoverRole::CometDay => ShiftCode::Cmd,
            CoverRole::CometNight => ShiftCode::Cmn,
            CoverRole::ShortDay => ShiftCode::Sd,
        }
    }
}
