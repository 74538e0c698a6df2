//! Naming strategies (spec.md §4.B).
//!
//! A namer is a pure pair `(name: source -> derivative, is_of: name -> bool)`.
//! It is the identity of an automation's output: invariant F1 requires that
//! no two automations in a folder produce the same name for the same source.

use crate::id::{ext_lower, is_valid_uuid_v4, stem};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A naming strategy, configured from YAML (`namer.kind`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Namer {
    /// `name(f) = stem(f) + "_" + suffix + "." + ext(f)`.
    /// `is_of(n)` holds iff `n`'s stem ends with `"_" + suffix`.
    Suffix { suffix: String },
    /// `name(f) = uuid_v4() + "." + ext(f)`.
    /// `is_of(n)` holds iff `basename_without_ext(n)` is a valid UUID v4.
    UuidReplace,
}

impl Namer {
    /// Derives the output name for a given source/derivative name.
    pub fn name(&self, source_name: &str) -> String {
        let ext = ext_lower(source_name);
        match self {
            Namer::Suffix { suffix } => {
                format!("{}_{}.{}", stem(source_name), suffix, ext)
            }
            Namer::UuidReplace => format!("{}.{}", Uuid::new_v4(), ext),
        }
    }

    /// Whether `name` belongs to the output set of this namer.
    pub fn is_of(&self, name: &str) -> bool {
        match self {
            Namer::Suffix { suffix } => {
                let marker = format!("_{suffix}");
                stem(name).ends_with(&marker)
            }
            Namer::UuidReplace => is_valid_uuid_v4(stem(name)),
        }
    }

    /// A short identity string used for error messages and logs (invariant
    /// F1 violations, config errors).
    pub fn label(&self) -> String {
        match self {
            Namer::Suffix { suffix } => format!("suffix({suffix})"),
            Namer::UuidReplace => "uuid-replace".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_name_and_is_of() {
        let n = Namer::Suffix { suffix: "thumb".into() };
        let uuid = Uuid::new_v4();
        let source = format!("{uuid}.jpg");
        let out = n.name(&source);
        assert_eq!(out, format!("{uuid}_thumb.jpg"));
        assert!(n.is_of(&out));
        assert!(!n.is_of(&source));
    }

    #[test]
    fn suffix_is_of_does_not_match_unrelated_suffix() {
        let n = Namer::Suffix { suffix: "lg".into() };
        let uuid = Uuid::new_v4();
        assert!(!n.is_of(&format!("{uuid}_sm.jpg")));
        assert!(n.is_of(&format!("{uuid}_lg.jpg")));
    }

    #[test]
    fn uuid_replace_regenerates_and_is_of_any_uuid_basename() {
        let n = Namer::UuidReplace;
        let out = n.name("incoming-name.png");
        assert!(out.ends_with(".png"));
        assert!(n.is_of(&out));
        assert!(!n.is_of("incoming-name.png"));
    }

    #[test]
    fn uuid_replace_produces_fresh_uuid_each_call() {
        let n = Namer::UuidReplace;
        assert_ne!(n.name("a.jpg"), n.name("a.jpg"));
    }
}
