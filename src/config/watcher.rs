//! Configuration file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::BalancerConfig;

/// Watches the configuration file and emits every valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<BalancerConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BalancerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    ///
    /// Invalid files are logged and skipped; the running pools are left as they are.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(config) => {
                            tracing::info!(
                                path = %path.display(),
                                pools = config.pools.len(),
                                members = config.members.len(),
                                "Config change detected"
                            );
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Rejected config reload, keeping current pools"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BEFORE: &str = r#"
[[pools]]
name = "web"
"#;

    const AFTER: &str = r#"
[[pools]]
name = "web"
strategy = "round_robin"

[[members]]
pool = "web"
address = "10.0.0.7"
port = 8080
"#;

    #[tokio::test]
    async fn test_file_change_emits_new_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balancer.toml");
        fs::write(&path, BEFORE).unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&path, AFTER).unwrap();

        // one write can surface as several events; wait for the complete file
        let config = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let config = updates.recv().await.unwrap();
                if !config.members.is_empty() {
                    break config;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(config.pools[0].name, "web");
        assert_eq!(config.members[0].port, 8080);
    }
}
