//! Registros de humor dos pacientes

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Categoria de humor informada pelo paciente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoodKind {
    VeryGood,
    Good,
    Neutral,
    Bad,
    VeryBad,
}

impl MoodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodKind::VeryGood => "very_good",
            MoodKind::Good => "good",
            MoodKind::Neutral => "neutral",
            MoodKind::Bad => "bad",
            MoodKind::VeryBad => "very_bad",
        }
    }
}

impl std::str::FromStr for MoodKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very_good" => Ok(MoodKind::VeryGood),
            "good" => Ok(MoodKind::Good),
            "neutral" => Ok(MoodKind::Neutral),
            "bad" => Ok(MoodKind::Bad),
            "very_bad" => Ok(MoodKind::VeryBad),
            other => Err(DomainError::Validation(format!(
                "Tipo de humor inválido: {}",
                other
            ))),
        }
    }
}

/// Intensidade do humor, sempre entre 1 e 10
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value < i64::from(Self::MIN) || value > i64::from(Self::MAX) {
            return Err(DomainError::IntensityOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Intensity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Intensity::new(value)
    }
}

impl From<Intensity> for u8 {
    fn from(intensity: Intensity) -> Self {
        intensity.0
    }
}

/// Dados para registrar um humor
#[derive(Debug, Clone)]
pub struct NewMoodEntry {
    pub patient_id: Uuid,
    pub mood: MoodKind,
    pub intensity: i64,
    pub notes: Option<String>,
    /// Padrão: momento do registro
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Registro de humor. Apenas as notas podem mudar após a criação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    id: Uuid,
    patient_id: Uuid,
    recorded_at: DateTime<Utc>,
    mood: MoodKind,
    intensity: Intensity,
    notes: Option<String>,
}

impl MoodEntry {
    pub fn record(new: NewMoodEntry, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let intensity = Intensity::new(new.intensity)?;
        Ok(Self {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            recorded_at: new.recorded_at.unwrap_or(now),
            mood: new.mood,
            intensity,
            notes: new.notes,
        })
    }

    pub(crate) fn restore(
        id: Uuid,
        patient_id: Uuid,
        recorded_at: DateTime<Utc>,
        mood: MoodKind,
        intensity: Intensity,
        notes: Option<String>,
    ) -> Self {
        Self {
            id,
            patient_id,
            recorded_at,
            mood,
            intensity,
            notes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn patient_id(&self) -> Uuid {
        self.patient_id
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn mood(&self) -> MoodKind {
        self.mood
    }

    pub fn intensity(&self) -> Intensity {
        self.intensity
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Substitui as notas (única mutação permitida)
    pub fn update_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
    }
}

/// Agregado por categoria de humor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodSummary {
    pub mood: MoodKind,
    pub count: usize,
    pub average_intensity: f64,
}

/// Ponto da série temporal de humor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodTrendPoint {
    pub recorded_at: DateTime<Utc>,
    pub intensity: u8,
    pub mood: MoodKind,
}

/// Estatísticas derivadas do histórico de humor de um paciente
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodStats {
    /// Ordenado por quantidade (decrescente)
    pub summary: Vec<MoodSummary>,
    /// Ordenado por data de registro
    pub trend: Vec<MoodTrendPoint>,
}

impl MoodStats {
    pub fn from_entries(entries: &[MoodEntry]) -> Self {
        let mut groups: HashMap<MoodKind, (usize, u32)> = HashMap::new();
        for entry in entries {
            let group = groups.entry(entry.mood).or_insert((0, 0));
            group.0 += 1;
            group.1 += u32::from(entry.intensity.value());
        }

        let mut summary: Vec<MoodSummary> = groups
            .into_iter()
            .map(|(mood, (count, total))| MoodSummary {
                mood,
                count,
                average_intensity: f64::from(total) / count as f64,
            })
            .collect();
        summary.sort_by(|a, b| b.count.cmp(&a.count).then(a.mood.cmp(&b.mood)));

        let mut trend: Vec<MoodTrendPoint> = entries
            .iter()
            .map(|e| MoodTrendPoint {
                recorded_at: e.recorded_at,
                intensity: e.intensity.value(),
                mood: e.mood,
            })
            .collect();
        trend.sort_by_key(|p| p.recorded_at);

        Self { summary, trend }
    }
}
