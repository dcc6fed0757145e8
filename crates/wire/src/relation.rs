//! The closed set of knowledge relation types.
//!
//! Both the permission evaluator and any presentation layer key their per-relation
//! summaries on this enum, so adding a variant is a coordinated change.

use crate::{WireError, WireResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a knowledge triple's relation field.
///
/// Each variant has a stable wire tag (kebab-case) and a fixed human-readable name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    /// Signs and symptoms supporting the diagnosis.
    DiagnosticSign,
    /// Conditions to rule out.
    DifferentialDiagnosis,
    /// Procedures associated with the condition.
    AssociatedProcedure,
    /// The clinical discipline that owns the condition.
    OwningDiscipline,
    Complication,
    Examination,
    Treatment,
    Medication,
}

impl RelationType {
    /// Every relation type, in display order.
    pub const ALL: [RelationType; 8] = [
        RelationType::DiagnosticSign,
        RelationType::DifferentialDiagnosis,
        RelationType::AssociatedProcedure,
        RelationType::OwningDiscipline,
        RelationType::Complication,
        RelationType::Examination,
        RelationType::Treatment,
        RelationType::Medication,
    ];

    /// Wire tag, as written in payloads and REST bodies.
    pub fn tag(self) -> &'static str {
        match self {
            RelationType::DiagnosticSign => "diagnostic-sign",
            RelationType::DifferentialDiagnosis => "differential-diagnosis",
            RelationType::AssociatedProcedure => "associated-procedure",
            RelationType::OwningDiscipline => "owning-discipline",
            RelationType::Complication => "complication",
            RelationType::Examination => "examination",
            RelationType::Treatment => "treatment",
            RelationType::Medication => "medication",
        }
    }

    /// Fixed human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            RelationType::DiagnosticSign => "临床表现",
            RelationType::DifferentialDiagnosis => "鉴别诊断",
            RelationType::AssociatedProcedure => "相关手术",
            RelationType::OwningDiscipline => "所属科室",
            RelationType::Complication => "并发症",
            RelationType::Examination => "辅助检查",
            RelationType::Treatment => "治疗方案",
            RelationType::Medication => "常用药物",
        }
    }

    /// Parses either the wire tag or the human-readable name.
    ///
    /// Legacy payloads carry the display name in the relation field, so both are accepted.
    pub fn parse(input: &str) -> WireResult<Self> {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.tag() == input || r.display_name() == input)
            .ok_or_else(|| WireError::UnknownRelation(input.to_string()))
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for RelationType {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_and_display_names() {
        assert_eq!(
            RelationType::parse("diagnostic-sign").unwrap(),
            RelationType::DiagnosticSign
        );
        assert_eq!(
            RelationType::parse(" 鉴别诊断 ").unwrap(),
            RelationType::DifferentialDiagnosis
        );
        assert!(matches!(
            RelationType::parse("treats"),
            Err(WireError::UnknownRelation(r)) if r == "treats"
        ));
    }

    #[test]
    fn tags_and_names_are_unique() {
        let mut tags: Vec<&str> = RelationType::ALL.iter().map(|r| r.tag()).collect();
        let mut names: Vec<&str> = RelationType::ALL.iter().map(|r| r.display_name()).collect();
        tags.sort();
        tags.dedup();
        names.sort();
        names.dedup();
        assert_eq!(tags.len(), RelationType::ALL.len());
        assert_eq!(names.len(), RelationType::ALL.len());
    }

    #[test]
    fn serde_uses_wire_tag() {
        let json = serde_json::to_string(&RelationType::AssociatedProcedure).unwrap();
        assert_eq!(json, "\"associated-procedure\"");
        for relation in RelationType::ALL {
            let json = serde_json::to_string(&relation).unwrap();
            assert_eq!(json.trim_matches('"'), relation.tag());
        }
    }
}
