//! Label families and their closed vocabularies.

use std::fmt;

use crate::types::LabelValue;

/// Judgment taxonomy attached to every `query_item_labels` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LabelFamily {
    /// Four-way graded relevance (Exact/Substitute/Complement/Irrelevant).
    Esci,
    /// Item viewed within a session.
    View,
    /// Item clicked from a result page.
    Click,
    /// Item purchased within a session.
    Purchase,
}

const ESCI_VOCAB: [&str; 4] = ["Exact", "Substitute", "Complement", "Irrelevant"];
const SIGNAL_VOCAB: [&str; 1] = ["1"];

impl LabelFamily {
    /// Name stored in the `label_family` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LabelFamily::Esci => "ESCI",
            LabelFamily::View => "view",
            LabelFamily::Click => "click",
            LabelFamily::Purchase => "purchase",
        }
    }

    /// Canonical label values for this family.
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            LabelFamily::Esci => &ESCI_VOCAB,
            LabelFamily::View | LabelFamily::Click | LabelFamily::Purchase => &SIGNAL_VOCAB,
        }
    }

    /// Map a raw label onto the family vocabulary.
    ///
    /// ESCI letter codes (`E`, `S`, `C`, `I`) are documented aliases of the full
    /// names. Anything else returns `None` and must be rejected by the caller.
    pub fn canonical(&self, raw: &str) -> Option<LabelValue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(hit) = self
            .vocabulary()
            .iter()
            .find(|value| value.eq_ignore_ascii_case(raw))
        {
            return Some((*hit).to_string());
        }
        match self {
            LabelFamily::Esci if raw.len() == 1 => {
                let code = raw.to_ascii_uppercase();
                ESCI_VOCAB
                    .iter()
                    .find(|value| value.starts_with(code.as_str()))
                    .map(|value| (*value).to_string())
            }
            _ => None,
        }
    }
}

impl fmt::Display for LabelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esci_accepts_names_and_letter_codes() {
        let family = LabelFamily::Esci;
        assert_eq!(family.canonical("Exact").as_deref(), Some("Exact"));
        assert_eq!(family.canonical("irrelevant").as_deref(), Some("Irrelevant"));
        assert_eq!(family.canonical("S").as_deref(), Some("Substitute"));
        assert_eq!(family.canonical("c").as_deref(), Some("Complement"));
    }

    #[test]
    fn unknown_labels_are_not_coerced() {
        let family = LabelFamily::Esci;
        assert_eq!(family.canonical("Partial"), None);
        assert_eq!(family.canonical("X"), None);
        assert_eq!(family.canonical(""), None);
        assert_eq!(LabelFamily::Click.canonical("2"), None);
        assert_eq!(LabelFamily::Purchase.canonical("1").as_deref(), Some("1"));
    }
}
