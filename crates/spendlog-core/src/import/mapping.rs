//! Column-to-field inference with confidence scores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MappingError;

/// Header equals a keyword.
pub const SCORE_EXACT: u8 = 100;
/// Header contains a keyword.
pub const SCORE_CONTAINS: u8 = 80;
/// A keyword contains the header.
pub const SCORE_PARTIAL: u8 = 60;
/// No keyword matched.
pub const SCORE_NONE: u8 = 0;

/// Semantic field a source column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Amount,
    Description,
    Category,
    Date,
    Notes,
    Ignore,
}

impl FieldKey {
    /// Fields considered during inference, in tie-break order.
    pub const DETECTABLE: [FieldKey; 5] = [
        FieldKey::Amount,
        FieldKey::Description,
        FieldKey::Category,
        FieldKey::Date,
        FieldKey::Notes,
    ];

    /// Fields every import must map.
    pub const REQUIRED: [FieldKey; 2] = [FieldKey::Amount, FieldKey::Description];

    /// Known header spellings for this field.
    pub fn variations(&self) -> &'static [&'static str] {
        match self {
            Self::Amount => &["amount", "cost", "price", "total", "value", "expense"],
            Self::Description => &["description", "details", "item", "expense", "note", "title"],
            Self::Category => &["category", "type", "group", "classification"],
            Self::Date => &["date", "transaction date", "created", "when", "timestamp"],
            Self::Notes => &["notes", "memo", "comment", "remarks"],
            Self::Ignore => &[],
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Description => "description",
            Self::Category => "category",
            Self::Date => "date",
            Self::Notes => "notes",
            Self::Ignore => "ignore",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amount" => Ok(Self::Amount),
            "description" => Ok(Self::Description),
            "category" => Ok(Self::Category),
            "date" => Ok(Self::Date),
            "notes" | "note" => Ok(Self::Notes),
            "ignore" | "skip" => Ok(Self::Ignore),
            other => Err(MappingError::UnknownField(other.to_string())),
        }
    }
}

/// The field a header feeds and how sure we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAssignment {
    pub field: FieldKey,
    /// 0, 60, 80 or 100 for inferred assignments; 100 for manual ones.
    pub confidence: u8,
    /// Set by the user during manual remapping.
    pub manual: bool,
}

/// Header → field assignment for one imported file, in source column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    entries: Vec<(String, ColumnAssignment)>,
}

impl ColumnMapping {
    pub fn get(&self, header: &str) -> Option<&ColumnAssignment> {
        self.entries
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, a)| a)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnAssignment)> {
        self.entries.iter().map(|(h, a)| (h.as_str(), a))
    }

    /// Headers assigned to `field`, in column order.
    pub fn headers_for(&self, field: FieldKey) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(_, a)| a.field == field)
            .map(|(h, _)| h.as_str())
    }

    pub fn has_field(&self, field: FieldKey) -> bool {
        self.headers_for(field).next().is_some()
    }

    /// Required fields with no source column.
    pub fn missing_required(&self) -> Vec<FieldKey> {
        FieldKey::REQUIRED
            .into_iter()
            .filter(|f| !self.has_field(*f))
            .collect()
    }

    /// Fails unless every required field is mapped, regardless of confidence.
    pub fn ensure_complete(&self) -> Result<(), MappingError> {
        let missing = self.missing_required();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MappingError::MissingRequiredFields(missing))
        }
    }

    /// Manually assign a header. Replaces any inferred assignment.
    pub fn assign(&mut self, header: &str, field: FieldKey) -> Result<(), MappingError> {
        let key = header.trim().to_lowercase();
        let entry = self
            .entries
            .iter_mut()
            .find(|(h, _)| *h == key)
            .ok_or_else(|| MappingError::UnknownHeader(header.to_string()))?;

        entry.1 = ColumnAssignment {
            field,
            confidence: SCORE_EXACT,
            manual: true,
        };
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Infers which column feeds which field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapper {
    min_confidence: u8,
}

impl ColumnMapper {
    pub fn new() -> Self {
        Self {
            min_confidence: SCORE_CONTAINS,
        }
    }

    /// Set the confidence required for automatic acceptance.
    pub fn with_min_confidence(mut self, confidence: u8) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Assign each header its single best field. Unmatched headers become `ignore`.
    pub fn infer_mapping<S: AsRef<str>>(&self, headers: &[S]) -> ColumnMapping {
        let entries = headers
            .iter()
            .map(|h| {
                let header = h.as_ref().trim().to_lowercase();
                let assignment = best_assignment(&header);
                debug!(
                    "Column \"{}\" -> {} ({})",
                    header, assignment.field, assignment.confidence
                );
                (header, assignment)
            })
            .collect();

        ColumnMapping { entries }
    }

    /// Whether `mapping` can be used without a manual step.
    pub fn review(&self, mapping: &ColumnMapping) -> Result<(), MappingError> {
        mapping.ensure_complete()?;

        for (header, assignment) in mapping.iter() {
            if assignment.field.is_required() && assignment.confidence < self.min_confidence {
                return Err(MappingError::LowConfidence {
                    header: header.to_string(),
                    field: assignment.field,
                    confidence: assignment.confidence,
                });
            }
        }
        Ok(())
    }

    /// `true` when the mapping passes [`ColumnMapper::review`].
    pub fn is_confident(&self, mapping: &ColumnMapping) -> bool {
        self.review(mapping).is_ok()
    }
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Score a normalized header against one keyword.
pub fn match_score(header: &str, keyword: &str) -> u8 {
    if header.is_empty() {
        SCORE_NONE
    } else if header == keyword {
        SCORE_EXACT
    } else if header.contains(keyword) {
        SCORE_CONTAINS
    } else if keyword.contains(header) {
        SCORE_PARTIAL
    } else {
        SCORE_NONE
    }
}

/// Best score of a header against all spellings of `field`.
pub fn field_score(header: &str, field: FieldKey) -> u8 {
    field
        .variations()
        .iter()
        .map(|kw| match_score(header, kw))
        .max()
        .unwrap_or(SCORE_NONE)
}

fn best_assignment(header: &str) -> ColumnAssignment {
    let mut best = ColumnAssignment {
        field: FieldKey::Ignore,
        confidence: SCORE_NONE,
        manual: false,
    };

    // Strictly greater: on a tie the field scanned first keeps the header.
    for field in FieldKey::DETECTABLE {
        let score = field_score(header, field);
        if score > best.confidence {
            best.field = field;
            best.confidence = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_infer_mapping_basic() {
        let mapping =
            ColumnMapper::new().infer_mapping(&["total amount", "details", "ignored_col"]);

        let amount = mapping.get("total amount").unwrap();
        assert_eq!(amount.field, FieldKey::Amount);
        assert!(amount.confidence >= 80);

        let description = mapping.get("details").unwrap();
        assert_eq!(description.field, FieldKey::Description);
        assert!(description.confidence >= 80);

        let ignored = mapping.get("ignored_col").unwrap();
        assert_eq!(ignored.field, FieldKey::Ignore);
        assert_eq!(ignored.confidence, 0);
    }

    #[test]
    fn test_match_score_precedence() {
        assert_eq!(match_score("amount", "amount"), SCORE_EXACT);
        assert_eq!(match_score("amount (usd)", "amount"), SCORE_CONTAINS);
        assert_eq!(match_score("desc", "description"), SCORE_PARTIAL);
        assert_eq!(match_score("vendor", "amount"), SCORE_NONE);
        assert_eq!(match_score("", "amount"), SCORE_NONE);
    }

    #[test]
    fn test_header_keeps_single_best_field() {
        // "transaction date" is an exact date keyword; nothing else scores higher.
        let mapping = ColumnMapper::new().infer_mapping(&["Transaction Date"]);
        let a = mapping.get("transaction date").unwrap();
        assert_eq!((a.field, a.confidence), (FieldKey::Date, SCORE_EXACT));
    }

    #[test]
    fn test_tie_goes_to_first_scanned_field() {
        // "expense" is an exact keyword for both amount and description.
        let mapping = ColumnMapper::new().infer_mapping(&["expense"]);
        assert_eq!(mapping.get("expense").unwrap().field, FieldKey::Amount);
    }

    #[test]
    fn test_notes_beats_partial_description() {
        let mapping = ColumnMapper::new().infer_mapping(&["notes"]);
        let a = mapping.get("notes").unwrap();
        assert_eq!((a.field, a.confidence), (FieldKey::Notes, SCORE_EXACT));
    }

    #[test]
    fn test_review_accepts_confident_mapping() {
        let mapper = ColumnMapper::new();
        let mapping = mapper.infer_mapping(&["amount", "description", "category", "date"]);
        assert!(mapper.is_confident(&mapping));
    }

    #[test]
    fn test_review_rejects_missing_required() {
        let mapper = ColumnMapper::new();
        let mapping = mapper.infer_mapping(&["amount", "vendor"]);
        assert_eq!(
            mapper.review(&mapping),
            Err(MappingError::MissingRequiredFields(vec![FieldKey::Description]))
        );
    }

    #[test]
    fn test_review_rejects_low_confidence() {
        let mapper = ColumnMapper::new();
        // "val" is only a fragment of "value"
        let mapping = mapper.infer_mapping(&["val", "description"]);
        let err = mapper.review(&mapping).unwrap_err();
        assert_eq!(
            err,
            MappingError::LowConfidence {
                header: "val".into(),
                field: FieldKey::Amount,
                confidence: SCORE_PARTIAL,
            }
        );
    }

    #[test]
    fn test_manual_assignment_passes_review() {
        let mapper = ColumnMapper::new();
        let mut mapping = mapper.infer_mapping(&["spent", "what"]);
        assert!(!mapper.is_confident(&mapping));

        mapping.assign("Spent", FieldKey::Amount).unwrap();
        mapping.assign("what", FieldKey::Description).unwrap();
        assert!(mapper.is_confident(&mapping));
        assert!(mapping.get("spent").unwrap().manual);

        assert_eq!(
            mapping.assign("missing", FieldKey::Date),
            Err(MappingError::UnknownHeader("missing".into()))
        );
    }

    #[test]
    fn test_field_key_from_str() {
        assert_eq!("Amount".parse::<FieldKey>().unwrap(), FieldKey::Amount);
        assert_eq!("ignore".parse::<FieldKey>().unwrap(), FieldKey::Ignore);
        assert!("price".parse::<FieldKey>().is_err());
    }
}
