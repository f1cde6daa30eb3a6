//! Per-invocation state: configuration, the loaded store and output mode.

use crate::Cli;
use anyhow::{Result, bail};
use pvb_common::{
    AccountFieldMutator, EntitlementReconciler, FieldProjector, Intent, LoadedConfig,
    MemoryStore, RequestBuilder, SchemaCache, Snapshot,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Context {
    pub config: LoadedConfig,
    pub store: Arc<MemoryStore>,
    pub json: bool,
    pub intent: Intent,
    snapshot_path: Option<PathBuf>,
    write: bool,
}

impl Context {
    pub fn load(cli: &Cli, config: LoadedConfig) -> Result<Self> {
        let store = match &cli.snapshot {
            Some(path) => {
                let snapshot = Snapshot::load(path)?;
                debug!(
                    path = %path.display(),
                    forms = snapshot.forms.len(),
                    accounts = snapshot.accounts.len(),
                    "loaded snapshot"
                );
                MemoryStore::from_snapshot(snapshot)
            }
            None => MemoryStore::default(),
        };

        if cli.write && cli.snapshot.is_none() {
            bail!("--write needs --snapshot to know where to save");
        }

        Ok(Self {
            config,
            store: Arc::new(store),
            json: cli.json,
            intent: if cli.direct {
                Intent::Direct
            } else {
                Intent::Request
            },
            snapshot_path: cli.snapshot.clone(),
            write: cli.write,
        })
    }

    pub fn schema(&self) -> SchemaCache {
        let store = &self.store;
        SchemaCache::new(store.clone(), store.clone(), store.clone())
            .with_config(self.config.config.schema.clone())
    }

    pub fn projector(&self) -> FieldProjector {
        FieldProjector::new(self.schema()).with_order(self.config.config.projection.order)
    }

    pub fn reconciler(&self) -> EntitlementReconciler {
        let store = &self.store;
        EntitlementReconciler::new(store.clone(), store.clone(), store.clone(), self.schema())
    }

    pub fn requests(&self) -> RequestBuilder {
        RequestBuilder::new(self.store.clone(), self.store.clone()).with_intent(self.intent)
    }

    pub fn mutator(&self) -> AccountFieldMutator {
        AccountFieldMutator::new(self.store.clone()).with_config(&self.config.config)
    }

    /// Print `value` as JSON in `--json` mode, otherwise print `text`.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            let text = text();
            if text.ends_with('\n') {
                print!("{text}");
            } else {
                println!("{text}");
            }
        }
        Ok(())
    }

    /// Save the store back to the snapshot file when `--write` was given.
    pub fn persist(&self) -> Result<()> {
        if !self.write {
            return Ok(());
        }
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        self.store.snapshot().save(path)?;
        info!(path = %path.display(), "saved snapshot");
        Ok(())
    }
}
