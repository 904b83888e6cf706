//! Normalization of the recursive `klass` option.

use serde::Deserialize;

/// `klass` as written in configuration: a name, a list, or nested lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KlassSpec {
    One(String),
    Many(Vec<KlassSpec>),
}

impl KlassSpec {
    /// Flattens into an ordered list of distinct klass names.
    pub fn flatten(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_into(&mut names);
        names
    }

    fn collect_into(&self, names: &mut Vec<String>) {
        match self {
            Self::One(name) => {
                let name = name.trim();
                if !name.is_empty() && !names.iter().any(|existing| existing == name) {
                    names.push(name.to_string());
                }
            }
            Self::Many(specs) => {
                for spec in specs {
                    spec.collect_into(names);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_lists() {
        let spec: KlassSpec =
            serde_yaml::from_str("[Patient, [Tumour, [Patient, Treatment]]]").unwrap();
        assert_eq!(spec.flatten(), vec!["Patient", "Tumour", "Treatment"]);
    }

    #[test]
    fn single_name() {
        let spec: KlassSpec = serde_yaml::from_str("Patient").unwrap();
        assert_eq!(spec.flatten(), vec!["Patient"]);
    }
}
