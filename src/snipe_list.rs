//! Allow-list of mints to snipe
//!
//! One base58 mint per line; blank lines and `#` comments are ignored.
//! While snipe-list mode is on, the file is re-read on a fixed interval and
//! only pools whose base mint is listed are evaluated.

use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Parse the file contents. Unparseable lines are returned separately.
pub fn parse_snipe_list(text: &str) -> (HashSet<Pubkey>, Vec<String>) {
    let mut mints = HashSet::new();
    let mut invalid = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Pubkey::from_str(line) {
            Ok(mint) => {
                mints.insert(mint);
            }
            Err(_) => invalid.push(line.to_string()),
        }
    }

    (mints, invalid)
}

pub struct SnipeList {
    path: PathBuf,
    mints: RwLock<HashSet<Pubkey>>,
}

impl SnipeList {
    /// Read the list once. A missing or unreadable file is an error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let list = Self {
            path: path.as_ref().to_path_buf(),
            mints: RwLock::new(HashSet::new()),
        };
        list.reload().await?;
        Ok(list)
    }

    /// Re-read the file, replacing the current set. Returns the new size.
    pub async fn reload(&self) -> Result<usize> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Config(format!("snipe list {}: {}", self.path.display(), e))
        })?;

        let (mints, invalid) = parse_snipe_list(&text);
        for line in &invalid {
            warn!("Ignoring invalid mint in snipe list: {}", line);
        }

        let count = mints.len();
        let mut current = self.mints.write().await;
        if current.len() != count {
            info!("Loaded snipe list: {}", count);
        }
        *current = mints;
        Ok(count)
    }

    pub async fn contains(&self, mint: &Pubkey) -> bool {
        self.mints.read().await.contains(mint)
    }

    pub async fn len(&self) -> usize {
        self.mints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mints.read().await.is_empty()
    }

    /// Reload every `every` until cancelled. A failed reload keeps the
    /// previous list.
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let list = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = list.reload().await {
                            warn!("Snipe list reload failed, keeping previous list: {}", e);
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("Snipe list refresh stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_list(file: &NamedTempFile, mints: &[Pubkey]) {
        let body: Vec<String> = mints.iter().map(|m| m.to_string()).collect();
        std::fs::write(file.path(), body.join("\n")).unwrap();
    }

    #[test]
    fn test_parse_skips_blanks_and_comments() {
        let mint = Pubkey::new_unique();
        let text = format!("# watch\n\n  {}  \nnot-a-mint\n", mint);

        let (mints, invalid) = parse_snipe_list(&text);

        assert_eq!(mints.len(), 1);
        assert!(mints.contains(&mint));
        assert_eq!(invalid, vec!["not-a-mint".to_string()]);
    }

    #[tokio::test]
    async fn test_load_and_reload() {
        let x = Pubkey::new_unique();
        let y = Pubkey::new_unique();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", x).unwrap();

        let list = SnipeList::load(file.path()).await.unwrap();
        assert!(list.contains(&x).await);
        assert!(!list.contains(&y).await);

        write_list(&file, &[x, y]);
        assert_eq!(list.reload().await.unwrap(), 2);
        assert!(list.contains(&y).await);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SnipeList::load(dir.path().join("absent.txt")).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_list() {
        let x = Pubkey::new_unique();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snipe-list.txt");
        std::fs::write(&path, x.to_string()).unwrap();

        let list = SnipeList::load(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(list.reload().await.is_err());
        assert!(list.contains(&x).await);
    }

    #[tokio::test]
    async fn test_periodic_refresh_picks_up_changes() {
        let x = Pubkey::new_unique();
        let file = NamedTempFile::new().unwrap();
        write_list(&file, &[]);
        let list = Arc::new(SnipeList::load(file.path()).await.unwrap());
        let cancel = CancellationToken::new();
        let handle = list.spawn_refresh(Duration::from_millis(10), cancel.clone());

        write_list(&file, &[x]);
        let mut found = false;
        for _ in 0..50 {
            if list.contains(&x).await {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
        assert!(found);
    }
}
