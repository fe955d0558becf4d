//! A store that persists records as files on the local filesystem

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use super::{StoreError, StoreKey, TokenStore};
use crate::{ClientId, ClientIdRef};

/// A token store backed by one JSON file per record
///
/// Records live in `dir` as `<account>.<key>.json`. On unix, files are
/// created readable by the owner only.
#[derive(Debug)]
pub struct FileTokenStore {
    account: ClientId,
    dir: PathBuf,
}

impl FileTokenStore {
    /// Constructs a file store rooted at `dir` for `account`
    ///
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>, account: impl Into<ClientId>) -> Self {
        Self {
            account: account.into(),
            dir: dir.into(),
        }
    }

    /// The directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: StoreKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}.json", self.account.as_str(), key.as_str()))
    }

    fn write_record(&self, path: &Path, value: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut file_opts = OpenOptions::new();
        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            file_opts.mode(0o600);
        }

        let mut file = file_opts.open(path)?;
        file.write_all(value)?;
        file.sync_all()
    }
}

impl TokenStore for FileTokenStore {
    fn account(&self) -> &ClientIdRef {
        &self.account
    }

    fn load(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { key, source }),
        }
    }

    fn save(&self, key: StoreKey, value: Option<&[u8]>) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let result = match value {
            Some(value) => self.write_record(&path, value),
            None => match fs::remove_file(&path) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };

        result.map_err(|source| StoreError::Io { key, source })?;
        tracing::trace!(%key, deleted = value.is_none(), "persisted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aliri_clock::{DurationSecs, UnixTime};

    use super::*;
    use crate::{store::TokenStoreExt, UserSession};

    #[test]
    fn records_survive_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let session = UserSession::issued_at("t", DurationSecs(60), UnixTime(100))
            .with_refresh_token("r");

        FileTokenStore::new(dir.path(), "app")
            .set(StoreKey::UserSession, Some(&session))
            .unwrap();

        let reopened = FileTokenStore::new(dir.path(), "app");
        assert_eq!(reopened.get(StoreKey::UserSession).unwrap(), Some(session));
    }

    #[test]
    fn accounts_do_not_share_records() {
        let dir = tempfile::tempdir().unwrap();
        FileTokenStore::new(dir.path(), "one")
            .save(StoreKey::User, Some(b"{}"))
            .unwrap();

        let other = FileTokenStore::new(dir.path(), "two");
        assert_eq!(other.load(StoreKey::User).unwrap(), None);
    }

    #[test]
    fn deleting_a_missing_record_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested"), "app");

        store.save(StoreKey::ClientToken, None).unwrap();
        store.reset().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn records_are_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path(), "app");
        store.save(StoreKey::ClientToken, Some(b"{}")).unwrap();

        let mode = fs::metadata(store.path_for(StoreKey::ClientToken))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
