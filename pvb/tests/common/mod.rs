//! Fixtures for pvb CLI tests.

#![allow(dead_code)]

use pvb_common::memory::{FieldRecord, FormRecord, MemoryStore};
use pvb_common::store::ApplicationInstance;
use pvb_common::{Account, AccountType, FieldMap, Snapshot};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn init_test_logging() {
    pvb_common::testing::init_global_test_logging();
}

pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "Expected to find '{needle}' in output, got: {haystack}"
    );
}

/// A snapshot file in a temporary directory.
pub struct SnapshotFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl SnapshotFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("store.json");
        directory_snapshot()
            .save(&path)
            .expect("Failed to write snapshot");
        Self { dir, path }
    }

    pub fn reload(&self) -> Snapshot {
        Snapshot::load(&self.path).expect("Failed to reload snapshot")
    }

    /// Run pvb against this snapshot with an empty config file.
    pub fn pvb(&self, args: &[&str]) -> Output {
        let config = self.dir.path().join("config.toml");
        if !config.exists() {
            std::fs::write(&config, "").expect("Failed to write config");
        }
        pvb_with(&self.path, &config, args)
    }
}

pub fn pvb_with(snapshot: &Path, config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pvb"))
        .arg("--snapshot")
        .arg(snapshot)
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("PVB_LOG_LEVEL")
        .env_remove("PVB_LOG_FILE")
        .env_remove("PVB_PROJECTION_ORDER")
        .output()
        .expect("Failed to run pvb")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn directory_snapshot() -> Snapshot {
    MemoryStore::builder()
        .form(
            FormRecord::new(1, "UD_APP")
                .description("Application Account")
                .version(
                    1,
                    vec![
                        FieldRecord::new(11, "UD_APP_USR").label("User").order(1),
                        FieldRecord::new(12, "UD_APP_PWD")
                            .label("Password")
                            .order(2)
                            .encrypted(),
                    ],
                )
                .active(1),
        )
        .form(
            FormRecord::new(2, "UD_APP_GRP")
                .description("Groups")
                .version(
                    1,
                    vec![FieldRecord::new(21, "UD_APP_GRP_NAME").label("Group").order(1)],
                )
                .active(1),
        )
        .lookup_value("Lookup.AD.Groups", 7, "1~admins", "AD~admins")
        .app_instance(ApplicationInstance {
            key: 4,
            name: "ActiveDirectory".to_string(),
            object_key: 40,
            it_resource_key: 1,
            it_resource_name: "AD".to_string(),
        })
        .account(Account {
            key: 500,
            account_id: "alice@ad".to_string(),
            user_id: "1001".to_string(),
            app_instance: "ActiveDirectory".to_string(),
            process_instance_key: 9001,
            status: "Provisioned".to_string(),
            account_type: AccountType::Primary,
            data: FieldMap::new().with("UD_APP_USR", "alice"),
        })
        .build()
        .snapshot()
}
