//! Shared fixtures for pvb-common integration tests.

#![allow(dead_code)]

use pvb_common::memory::{FieldRecord, FormRecord, MemoryStore};
use pvb_common::store::ApplicationInstance;
use pvb_common::{Account, AccountType, EntitlementReconciler, FieldMap, SchemaCache};
use std::sync::Arc;

#[ctor::ctor]
fn setup() {
    pvb_common::testing::init_global_test_logging();
}

pub fn active_directory() -> ApplicationInstance {
    ApplicationInstance {
        key: 4,
        name: "ActiveDirectory".to_string(),
        object_key: 40,
        it_resource_key: 1,
        it_resource_name: "AD".to_string(),
    }
}

/// A directory connector: parent form `UD_APP`, child form `UD_APP_GRP`,
/// a group lookup and one provisioned account.
pub fn directory_store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::builder()
            .form(
                FormRecord::new(1, "UD_APP")
                    .description("Application Account")
                    .version(
                        1,
                        vec![FieldRecord::new(10, "UD_APP_OLD").label("Old").order(1)],
                    )
                    .version(
                        2,
                        vec![
                            FieldRecord::new(11, "UD_APP_USR").label("User").order(1),
                            FieldRecord::new(12, "UD_APP_PWD")
                                .label("Password")
                                .order(2)
                                .field_type("PasswordField")
                                .encrypted(),
                            FieldRecord::new(13, "UD_APP_SERVER")
                                .label("Server")
                                .order(3)
                                .field_type("ITResourceLookupField"),
                        ],
                    )
                    .active(2),
            )
            .form(
                FormRecord::new(2, "UD_APP_GRP")
                    .description("Groups")
                    .version(
                        1,
                        vec![
                            FieldRecord::new(21, "UD_APP_GRP_NAME")
                                .label("Group")
                                .order(1)
                                .field_type("LookupField")
                                .lookup("Lookup.AD.Groups"),
                        ],
                    )
                    .active(1),
            )
            .object(40, "AD User")
            .lookup_value("Lookup.AD.Groups", 7, "1~admins", "AD~admins")
            .lookup_value("Lookup.AD.Groups", 8, "1~users", "AD~users")
            .app_instance(active_directory())
            .account(Account {
                key: 500,
                account_id: "alice@ad".to_string(),
                user_id: "1001".to_string(),
                app_instance: "ActiveDirectory".to_string(),
                process_instance_key: 9001,
                status: "Provisioned".to_string(),
                account_type: AccountType::Primary,
                data: FieldMap::new()
                    .with("UD_APP_USR", "alice")
                    .with("UD_APP_SERVER", 1),
            })
            .build(),
    )
}

pub fn schema(store: &Arc<MemoryStore>) -> SchemaCache {
    SchemaCache::new(store.clone(), store.clone(), store.clone())
}

pub fn reconciler(store: &Arc<MemoryStore>) -> EntitlementReconciler {
    EntitlementReconciler::new(store.clone(), store.clone(), store.clone(), schema(store))
}
