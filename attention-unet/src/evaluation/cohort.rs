//! Cohort-level aggregation of per-case Dice scores.
//!
//! Every case is filed under its histologic subtype and its histologic grade.
//! The report gives, per group and tissue class, the number of cases, the mean
//! score and the sample standard deviation.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use super::TissueClass;
use crate::error::{AttentionUNetError, AttentionUNetResult};

/// Subtype code that rare subtypes are folded into.
const FOLDED_SUBTYPE: u8 = 8;

/// Histologic subtype of a case, a code in `1..=8`.
///
/// Codes `3` to `7` are too rare to report on their own and are folded into
/// `8`, leaving the groups `1`, `2` and `8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistologicSubtype(u8);

impl HistologicSubtype {
    /// Maps a registry code to a subtype.
    ///
    /// # Errors
    ///
    /// Returns `Err(AttentionUNetError::Evaluation)` for codes outside `1..=8`.
    pub fn from_code(code: i64) -> AttentionUNetResult<Self> {
        match code {
            3..=7 => Ok(Self(FOLDED_SUBTYPE)),
            1..=8 => Ok(Self(code as u8)),
            _ => Err(AttentionUNetError::Evaluation {
                message: format!("histologic subtype must be in 1..=8, got {code}"),
            }),
        }
    }

    /// The (folded) subtype code.
    pub const fn code(self) -> u8 {
        self.0
    }
}

/// Histologic grade of a case, `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistologicGrade(u8);

impl HistologicGrade {
    /// Maps a registry code to a grade.
    ///
    /// # Errors
    ///
    /// Returns `Err(AttentionUNetError::Evaluation)` for codes outside `1..=3`.
    pub fn from_code(code: i64) -> AttentionUNetResult<Self> {
        match code {
            1..=3 => Ok(Self(code as u8)),
            _ => Err(AttentionUNetError::Evaluation {
                message: format!("histologic grade must be in 1..=3, got {code}"),
            }),
        }
    }

    /// The grade code.
    pub const fn code(self) -> u8 {
        self.0
    }
}

/// Scores and registry codes of one evaluated case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Free-form case identifier, used in log messages only.
    #[serde(default)]
    pub id: String,
    /// Raw histologic subtype code.
    pub subtype: i64,
    /// Raw histologic grade code.
    pub grade: i64,
    /// Dice scores in [`TissueClass::ALL`] order.
    pub dice: [f64; 3],
}

/// Count, mean and sample standard deviation of one tissue class in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    /// Number of scores.
    pub count: usize,
    /// Mean score, `None` without scores.
    pub mean: Option<f64>,
    /// Sample standard deviation (`ddof = 1`), `None` with fewer than two scores.
    pub std: Option<f64>,
}

impl ClassSummary {
    fn from_scores(scores: &[f64]) -> Self {
        let count = scores.len();
        let mean = (count > 0).then(|| scores.iter().sum::<f64>() / count as f64);
        let std = mean.filter(|_| count > 1).map(|mean| {
            let squares: f64 = scores.iter().map(|score| (score - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        });
        Self { count, mean, std }
    }
}

/// Summary of one subtype or grade group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// The subtype or grade code.
    pub code: u8,
    /// Per-class summaries in [`TissueClass::ALL`] order.
    pub classes: [ClassSummary; 3],
}

/// Aggregated cohort scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortReport {
    /// Groups by histologic subtype, ascending code.
    pub subtypes: Vec<GroupSummary>,
    /// Groups by histologic grade, ascending code.
    pub grades: Vec<GroupSummary>,
    /// Cases skipped for an invalid subtype or grade.
    pub skipped: usize,
}

impl fmt::Display for CohortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn optional(value: Option<f64>) -> String {
            value.map_or_else(|| "-".to_string(), |value| format!("{value:.4}"))
        }

        for (title, groups) in [("subtype", &self.subtypes), ("grade", &self.grades)] {
            for group in groups {
                write!(f, "{title} {}: n={}", group.code, group.classes[0].count)?;
                for (class, summary) in TissueClass::ALL.iter().zip(&group.classes) {
                    write!(
                        f,
                        " | {} mean {} std {}",
                        class.name(),
                        optional(summary.mean),
                        optional(summary.std)
                    )?;
                }
                writeln!(f)?;
            }
            writeln!(f)?;
        }
        write!(f, "skipped cases: {}", self.skipped)
    }
}

/// Per-class score lists of one group.
type GroupScores = [Vec<f64>; 3];

/// Collects per-case scores into subtype and grade groups.
#[derive(Debug, Clone, Default)]
pub struct CohortAggregator {
    subtypes: BTreeMap<HistologicSubtype, GroupScores>,
    grades: BTreeMap<HistologicGrade, GroupScores>,
    skipped: usize,
}

impl CohortAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a case under its subtype and grade.
    ///
    /// Returns `false` and counts the case as skipped if either code is
    /// invalid.
    pub fn record(&mut self, case: &CaseRecord) -> bool {
        let codes = HistologicSubtype::from_code(case.subtype).and_then(|subtype| {
            HistologicGrade::from_code(case.grade).map(|grade| (subtype, grade))
        });
        let (subtype, grade) = match codes {
            Ok(codes) => codes,
            Err(err) => {
                tracing::debug!(case = %case.id, %err, "skipping case");
                self.skipped += 1;
                return false;
            }
        };

        for scores in [
            self.subtypes.entry(subtype).or_default(),
            self.grades.entry(grade).or_default(),
        ] {
            for (class_scores, score) in scores.iter_mut().zip(case.dice) {
                class_scores.push(score);
            }
        }
        true
    }

    /// Number of cases filed so far.
    pub fn recorded(&self) -> usize {
        self.grades.values().map(|scores| scores[0].len()).sum()
    }

    /// Number of cases skipped so far.
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Summarizes the collected scores.
    pub fn report(&self) -> CohortReport {
        fn summarize<K>(
            groups: &BTreeMap<K, GroupScores>,
            code: impl Fn(&K) -> u8,
        ) -> Vec<GroupSummary> {
            groups
                .iter()
                .map(|(key, scores)| GroupSummary {
                    code: code(key),
                    classes: [
                        ClassSummary::from_scores(&scores[0]),
                        ClassSummary::from_scores(&scores[1]),
                        ClassSummary::from_scores(&scores[2]),
                    ],
                })
                .collect()
        }

        CohortReport {
            subtypes: summarize(&self.subtypes, |subtype| subtype.code()),
            grades: summarize(&self.grades, |grade| grade.code()),
            skipped: self.skipped,
        }
    }
}

impl Extend<CaseRecord> for CohortAggregator {
    fn extend<T: IntoIterator<Item = CaseRecord>>(&mut self, cases: T) {
        for case in cases {
            self.record(&case);
        }
    }
}
