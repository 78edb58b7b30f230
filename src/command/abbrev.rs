use std::collections::HashMap;

/// Maps every prefix of a set of names to a full name
///
/// Unlike strict abbreviation tables, a prefix shared by several names is not
/// rejected: it resolves to the shortest of them (`"b"` in `{ban, bananas}`
/// resolves to `"ban"`). Full names always resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct Abbreviations {
    prefixes: HashMap<String, String>,
}

impl Abbreviations {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();

        let mut prefixes = HashMap::new();

        // Later (shorter) names overwrite the prefixes claimed by longer ones
        for name in names.iter().rev() {
            prefixes.insert(name.clone(), name.clone());
            for (end, _) in name.char_indices().skip(1) {
                prefixes.insert(name[..end].to_string(), name.clone());
            }
        }

        Self { prefixes }
    }

    /// Resolve a probe to the full name it abbreviates
    pub fn resolve(&self, probe: &str) -> Option<&str> {
        self.prefixes.get(probe).map(String::as_str)
    }
}
