use std::{fs, path::PathBuf};

use log::warn;
use syncwatch_core::IdentityStorage;

/// Identity storage backed by one file per key inside a directory.
///
/// Failures degrade to not-persisted rather than erroring, matching the
/// engine's expectation that identity creation never fails.
pub struct FileIdentityStorage {
    dir: PathBuf,
}

impl FileIdentityStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl IdentityStorage for FileIdentityStorage {
    fn read(&self, key: &str) -> Option<String> {
        let value = fs::read_to_string(self.path_for(key)).ok()?;
        let value = value.trim().to_string();

        (!value.is_empty()).then_some(value)
    }

    fn write(&self, key: &str, value: &str) -> bool {
        let result =
            fs::create_dir_all(&self.dir).and_then(|_| fs::write(self.path_for(key), value));

        if let Err(e) = &result {
            warn!("failed to persist {key}: {e}");
        }

        result.is_ok()
    }
}
