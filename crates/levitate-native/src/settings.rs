use anyhow::Context;
use levitate_core::SettingsStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flat key/number map kept in a JSON file. Every write goes straight to
/// disk; a failed write is logged and the in-memory value still updates.
pub struct JsonSettings {
    path: PathBuf,
    values: BTreeMap<String, f32>,
}

impl JsonSettings {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing settings {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("writing settings {}", self.path.display()))
    }
}

impl SettingsStore for JsonSettings {
    fn persist(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_owned(), value);
        match self.write() {
            Ok(()) => log::info!("saved {key}={value:.3} to {}", self.path.display()),
            Err(e) => log::error!("{e:#}"),
        }
    }

    fn load(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("levitate-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn missing_file_opens_empty() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let settings = JsonSettings::open(&path).unwrap();
        assert_eq!(settings.load("BCI_MIN"), None);
    }

    #[test]
    fn persisted_values_survive_reopen() {
        let path = temp_path("reopen");
        let mut settings = JsonSettings::open(&path).unwrap();
        settings.persist("BCI_MIN", 0.25);
        settings.persist("BCI_MAX", 0.75);

        let reopened = JsonSettings::open(&path).unwrap();
        assert_eq!(reopened.load("BCI_MIN"), Some(0.25));
        assert_eq!(reopened.load("BCI_MAX"), Some(0.75));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonSettings::open(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
