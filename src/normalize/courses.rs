//! Course name normalisation and alias resolution.

use std::collections::HashMap;

/// Words that carry no identity ("Kempton Park" and "Kempton" are one course).
const GENERIC_WORDS: &[&str] = &[
    "park",
    "raceway",
    "racecourse",
    "track",
    "stadium",
    "greyhound",
    "greyhounds",
    "harness",
    "the",
    "aw",
];

/// Built-in variants seen across sites, keyed by normalised form.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("newmarket rowley", "newmarket"),
    ("newmarket july", "newmarket"),
    ("epsom downs", "epsom"),
    ("chelmsford city", "chelmsford"),
    ("wolves", "wolverhampton"),
    ("parislongchamp", "longchamp"),
    ("paris longchamp", "longchamp"),
    ("churchill downs", "churchill"),
    ("belmont at big a", "belmont"),
    ("belmont at aqueduct", "belmont"),
    ("woodbine mohawk", "mohawk"),
    ("shatin", "sha tin"),
    ("mountaineer casino", "mountaineer"),
];

/// Lowercase, drop parentheticals and generic words, fold punctuation.
pub fn normalize_course_name(name: &str) -> String {
    let mut without_parens = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_parens.push(c),
            _ => {}
        }
    }

    without_parens
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !GENERIC_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Alias table mapping normalised variants to a canonical course key.
#[derive(Debug, Clone)]
pub struct CourseAliases {
    map: HashMap<String, String>,
}

impl Default for CourseAliases {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CourseAliases {
    pub fn empty() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn builtin() -> Self {
        let mut aliases = Self::empty();
        for (variant, canonical) in BUILTIN_ALIASES {
            aliases.insert(variant, canonical);
        }
        aliases
    }

    /// Add an alias. Both sides are normalised so config entries can be
    /// written the way sites print them.
    pub fn insert(&mut self, variant: &str, canonical: &str) {
        let v = normalize_course_name(variant);
        let c = normalize_course_name(canonical);
        if !v.is_empty() && !c.is_empty() {
            self.map.insert(v, c);
        }
    }

    pub fn extend<'a>(&mut self, entries: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (variant, canonical) in entries {
            self.insert(variant, canonical);
        }
    }

    /// Identity key for a course as printed by any source.
    pub fn course_key(&self, name: &str) -> String {
        let normalized = normalize_course_name(name);
        self.map.get(&normalized).cloned().unwrap_or(normalized)
    }
}

/// Title-case display name from a printed course name.
pub fn display_name(name: &str) -> String {
    let trimmed = name.split('(').next().unwrap_or(name).trim();
    trimmed
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_generic_words_and_parens() {
        assert_eq!(normalize_course_name("Kempton Park (AW)"), "kempton");
        assert_eq!(normalize_course_name("ROMFORD Greyhound Stadium"), "romford");
        assert_eq!(normalize_course_name("Santa-Anita"), "santa anita");
        assert_eq!(normalize_course_name("  Ayr "), "ayr");
        assert_eq!(normalize_course_name("Cagnes-sur-Mer (Midi)"), "cagnes sur mer");
    }

    #[test]
    fn test_aliases_resolve_variants() {
        let aliases = CourseAliases::builtin();
        assert_eq!(aliases.course_key("ParisLongchamp"), "longchamp");
        assert_eq!(aliases.course_key("Longchamp"), "longchamp");
        assert_eq!(aliases.course_key("Newmarket (July)"), "newmarket");
        assert_eq!(aliases.course_key("Newmarket July"), "newmarket");
        assert_eq!(aliases.course_key("Chelmsford City"), "chelmsford");
    }

    #[test]
    fn test_config_alias_entries_are_normalised() {
        let mut aliases = CourseAliases::empty();
        let extra = HashMap::from([("Royal Ascot".to_string(), "ASCOT".to_string())]);
        aliases.extend(&extra);
        assert_eq!(aliases.course_key("royal-ascot"), "ascot");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("KEMPTON PARK (AW)"), "Kempton Park");
        assert_eq!(display_name("santa anita"), "Santa Anita");
    }
}
