use std::fmt;

use serde::{Deserialize, Serialize};

use crate::database::entities::EntityKind;

/// A single broken structural rule, reported to the user for correction.
///
/// `path` is the slash-separated chain of current names from the service down to the
/// offending record, so a message can be located without looking up ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: EntityKind,
    pub entity_id: Option<i32>,
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        kind: EntityKind,
        entity_id: Option<i32>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity_id,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.kind.display_name(), self.message)
        } else {
            write!(
                f,
                "{} '{}': {}",
                self.kind.display_name(),
                self.path,
                self.message
            )
        }
    }
}

/// Join violations into one line per problem.
pub fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_kind_and_path() {
        let v = Violation::new(
            EntityKind::Table,
            Some(3),
            "svc1/d1/t1",
            "must have exactly one primary key field (found 0)",
        );
        assert_eq!(
            v.to_string(),
            "Table 'svc1/d1/t1': must have exactly one primary key field (found 0)"
        );
    }

    #[test]
    fn format_joins_all_problems() {
        let list = vec![
            Violation::new(EntityKind::Service, None, "", "name is required"),
            Violation::new(EntityKind::Field, Some(9), "a/b/c/id", "duplicate source name"),
        ];
        assert_eq!(
            format_violations(&list),
            "Service: name is required; Field 'a/b/c/id': duplicate source name"
        );
    }
}
