//! DMT identification by keyword lexicon.

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use historia_core::SIN_DMT;

use crate::document::TreatmentEntry;

/// Substrings that identify a disease-modifying therapy, already normalized.
pub const DMT_KEYWORDS: [&str; 25] = [
    "interfer",
    "rebif",
    "betaferon",
    "avonex",
    "copaxon",
    "glatiramer",
    "cop-i",
    "natalizumab",
    "tysabri",
    "fingolimod",
    "gilenya",
    "ocrelizumab",
    "ocrevus",
    "rituximab",
    "teriflunomida",
    "aubagio",
    "cladribina",
    "mavenclad",
    "alemtuzumab",
    "dimetil",
    "dimeful",
    "tecfidera",
    "ponvory",
    "kesimpta",
    "mayzent",
];

const CANONICAL_DMT: [(&[&str], &str); 6] = [
    (
        &["interfer", "rebif", "betaferon", "avonex"],
        "Interferón Beta",
    ),
    (
        &["glatiramer", "copaxon", "cop-i"],
        "Acetato de Glatiramer",
    ),
    (&["fingolimod", "gilenya"], "Fingolimod"),
    (&["natalizumab", "tysabri"], "Natalizumab"),
    (&["dimetil", "dimeful"], "Dimetilfumarato"),
    (&["ocrelizumab", "ocrevus"], "Ocrelizumab"),
];

/// Decompose, drop combining diacritics (U+0300..U+036F) and lower-case.
pub fn normalize_text(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

/// Substring test of a treatment's `"<droga> <molecula>"` against the lexicon.
pub fn is_dmt(entry: &TreatmentEntry) -> bool {
    let haystack = format!("{} {}", entry.droga, entry.molecula);
    let haystack = normalize_text(haystack.trim());
    DMT_KEYWORDS.iter().any(|keyword| haystack.contains(keyword))
}

/// Canonical label of a DMT name, or the name itself when no group matches.
pub fn canonical_dmt_name(name: &str) -> String {
    let normalized = normalize_text(name);
    CANONICAL_DMT
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| normalized.contains(kw)))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Treatments of one encounter split into the primary DMT and supportive care.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Classification<'a> {
    /// First entry in list order that matches the lexicon. Further DMTs in
    /// the same encounter are not surfaced as primary.
    pub primary: Option<&'a TreatmentEntry>,
    pub supportive: Vec<&'a TreatmentEntry>,
}

impl Classification<'_> {
    /// DMT text as written, or [`SIN_DMT`].
    pub fn raw_dmt_name(&self) -> String {
        self.primary
            .and_then(TreatmentEntry::name)
            .unwrap_or(SIN_DMT)
            .to_string()
    }

    pub fn dmt_label(&self) -> String {
        canonical_dmt_name(&self.raw_dmt_name())
    }

    /// `"<name> <dosis>"` for every supportive treatment.
    pub fn support_labels(&self) -> Vec<String> {
        self.supportive
            .iter()
            .map(|entry| support_label(entry))
            .collect()
    }
}

pub fn classify_treatments(entries: &[TreatmentEntry]) -> Classification<'_> {
    let mut primary = None;
    let mut supportive = Vec::new();
    for entry in entries {
        if is_dmt(entry) {
            if primary.is_none() {
                primary = Some(entry);
            }
        } else {
            supportive.push(entry);
        }
    }
    Classification {
        primary,
        supportive,
    }
}

fn support_label(entry: &TreatmentEntry) -> String {
    format!("{} {}", entry.name().unwrap_or_default(), entry.dosis)
        .trim()
        .to_string()
}
