use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Persistance fichier des sorties de résolution.
pub trait Storage {
    /// Charge un document JSON.
    fn load<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T>;
    /// Sauvegarde de manière atomique.
    fn save<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()>;
}

/// Documents JSON dans un répertoire de sortie, écrits de manière
/// atomique.
pub struct JsonStorage {
    dir: PathBuf,
}

impl JsonStorage {
    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.as_ref().display()))?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl Storage for JsonStorage {
    fn load<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let path = self.path_of(name);
        let data = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let value = serde_json::from_slice(&data)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(value)
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(value)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).with_context(|| "creating temp file")?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_of(name))
            .with_context(|| "atomic rename")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::open(dir.path()).unwrap();
        let mut doc = BTreeMap::new();
        doc.insert("2025-02-03".to_string(), 2u32);
        storage.save("locums", &doc).unwrap();
        let loaded: BTreeMap<String, u32> = storage.load("locums").unwrap();
        assert_eq!(loaded, doc);
        assert!(storage.path_of("locums").exists());
    }
}
