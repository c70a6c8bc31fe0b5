use crate::naming::package_name_from_path;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportEntry {
    alias: String,
    /// Not present in the file yet
    fresh: bool,
}

/// Import path to alias registry of one output file
#[derive(Debug, Clone, Default)]
pub struct ImportRegistry {
    entries: IndexMap<String, ImportEntry>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an import the file already has
    pub fn seed(&mut self, path: impl Into<String>, alias: impl Into<String>) {
        self.entries.insert(
            path.into(),
            ImportEntry {
                alias: alias.into(),
                fresh: false,
            },
        );
    }

    pub fn reference(&mut self, path: &str) -> String {
        self.reference_with(path, |_| false)
    }

    /// Alias of `path`, assigned on first use. `taken` reports names the alias must avoid.
    pub fn reference_with(&mut self, path: &str, taken: impl Fn(&str) -> bool) -> String {
        if let Some(entry) = self.entries.get(path) {
            return entry.alias.clone();
        }

        let base = package_name_from_path(path);
        let mut alias = base.clone();
        let mut n = 2;
        while self.entries.values().any(|e| e.alias == alias) || taken(&alias) {
            alias = format!("{base}{n}");
            n += 1;
        }

        self.entries.insert(
            path.to_string(),
            ImportEntry {
                alias: alias.clone(),
                fresh: true,
            },
        );
        alias
    }

    pub fn alias(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(|e| e.alias.as_str())
    }

    /// New imports in first-use order
    pub fn fresh(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.fresh)
            .map(|(path, e)| (path.as_str(), e.alias.as_str()))
    }

    /// Import declaration for the new imports, if there are any
    pub fn render_block(&self) -> Option<String> {
        let lines: Vec<String> = self
            .fresh()
            .map(|(path, alias)| {
                if alias == package_name_from_path(path) {
                    format!("\t\"{path}\"")
                } else {
                    format!("\t{alias} \"{path}\"")
                }
            })
            .collect();

        if lines.is_empty() {
            return None;
        }
        Some(format!("import (\n{}\n)\n", lines.join("\n")))
    }
}
