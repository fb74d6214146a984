use std::sync::Arc;

/// Human-readable class names indexed by class id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    names: Arc<[String]>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names: names.into(),
        }
    }

    /// Parse a JSON array of strings.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let names: Vec<String> = serde_json::from_str(content)
            .map_err(|e| anyhow::anyhow!("Class labels are not a JSON string array: {e}"))?;
        Ok(Self::new(names))
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.names.iter().any(|name| name == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ClassLabels {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array_in_class_id_order() -> anyhow::Result<()> {
        let labels = ClassLabels::from_json(r#"["tench", "goldfish", "great white shark"]"#)?;
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(0), Some("tench"));
        assert_eq!(labels.get(2), Some("great white shark"));
        assert_eq!(labels.get(3), None);
        Ok(())
    }

    #[test]
    fn rejects_non_string_entries() {
        assert!(ClassLabels::from_json("[1, 2, 3]").is_err());
        assert!(ClassLabels::from_json(r#"{"0": "tench"}"#).is_err());
    }
}
