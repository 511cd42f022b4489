// src/labels.rs - Label set loading and reserved command labels
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{error, info, warn};

use crate::Result;

/// Used when the label file is missing, unreadable or empty.
pub const DEFAULT_LABELS: [&str; 7] = ["A", "B", "C", "D", "E", "NEXT", "SPACE"];

/// Reserved labels that mutate the sentence instead of being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Space,
}

impl Command {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "NEXT" => Some(Command::Next),
            "SPACE" => Some(Command::Space),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Next => "NEXT",
            Command::Space => "SPACE",
        }
    }
}

/// Ordered label set; a classifier output index maps to `labels[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Loads `index,label` lines in file order, falling back to
    /// [`DEFAULT_LABELS`] with a warning when nothing usable is found.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Labels file '{}' not found, using default labels", path.display());
            return Self::default();
        }

        let set = match Self::load(path) {
            Ok(set) if set.is_empty() => {
                warn!("Labels file '{}' has no labels, using default labels", path.display());
                return Self::default();
            }
            Ok(set) => set,
            Err(e) => {
                error!("Failed to load labels from '{}': {}", path.display(), e);
                return Self::default();
            }
        };

        info!("Loaded {} labels from {}", set.len(), path.display());
        for command in [Command::Next, Command::Space] {
            if !set.labels.iter().any(|l| l == command.as_str()) {
                warn!("Label set has no '{}' label, that command will never fire", command.as_str());
            }
        }
        set
    }

    /// Strict load. Lines that do not have exactly two fields are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)?;

        let mut labels = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() == 2 {
                labels.push(record[1].to_string());
            }
        }
        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_labels(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_loads_in_file_order_ignoring_index() {
        let file = write_labels("3,H\n0, I \n7,NEXT\n1,SPACE\n");
        let set = LabelSet::load_or_default(file.path());
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["H", "I", "NEXT", "SPACE"]);
    }

    #[test]
    fn test_skips_malformed_lines() {
        let file = write_labels("0,A\njunk\n1,B,extra\n2,C\n");
        let set = LabelSet::load(file.path()).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["A", "C"]);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let set = LabelSet::load_or_default("/definitely/not/here/labels.txt");
        assert_eq!(set, LabelSet::default());
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn test_empty_file_falls_back() {
        let file = write_labels("");
        assert_eq!(LabelSet::load_or_default(file.path()), LabelSet::default());
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("NEXT"), Some(Command::Next));
        assert_eq!(Command::parse("SPACE"), Some(Command::Space));
        assert_eq!(Command::parse("next"), None);
        assert_eq!(Command::parse("A"), None);
    }

    #[test]
    fn test_get_out_of_range() {
        let set = LabelSet::default();
        assert_eq!(set.get(5), Some("NEXT"));
        assert_eq!(set.get(7), None);
    }
}
