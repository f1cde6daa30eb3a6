//! Direct account and process-form writes.
//!
//! These writes bypass the approval subsystem and take effect immediately.
//! Locating the account and writing it back are two separate calls with no
//! atomicity between them: concurrent writers to the same account resolve
//! last-writer-wins.

use crate::errors::{EntityKind, PvbError};
use crate::store::ProvisioningGateway;
use crate::types::{AccountConfig, FieldMap, FieldValue, PvbConfig};
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AccountType {
    #[default]
    Primary,
    Secondary,
    ServiceAccount,
}

/// An account provisioned to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Account {
    pub key: i64,
    pub account_id: String,
    pub user_id: String,
    pub app_instance: String,
    pub process_instance_key: i64,
    pub status: String,
    #[serde(default)]
    pub account_type: AccountType,
    /// Process-form data of the account.
    #[serde(default)]
    pub data: FieldMap,
}

pub struct AccountFieldMutator {
    provisioning: Arc<dyn ProvisioningGateway>,
    config: AccountConfig,
    completed_status: String,
}

impl AccountFieldMutator {
    pub fn new(provisioning: Arc<dyn ProvisioningGateway>) -> Self {
        let defaults = PvbConfig::default();
        Self {
            provisioning,
            config: defaults.account,
            completed_status: defaults.request.completed_status,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &PvbConfig) -> Self {
        self.config = config.account.clone();
        self.completed_status = config.request.completed_status.clone();
        self
    }

    /// The user's account bound to a process instance.
    ///
    /// Fails with `Ambiguous` rather than picking one when several of the
    /// user's accounts share the process instance.
    pub fn find_account(&self, user_id: &str, process_instance_key: i64) -> Result<Account> {
        let mut matches: Vec<Account> = self
            .provisioning
            .accounts_for_user(user_id, self.config.primary_only)?
            .into_iter()
            .filter(|a| a.process_instance_key == process_instance_key)
            .collect();
        let name = format!("for user {user_id} with process instance {process_instance_key}");
        match matches.len() {
            0 => Err(PvbError::not_found(EntityKind::Account, name)),
            1 => Ok(matches.remove(0)),
            count => Err(PvbError::ambiguous(EntityKind::Account, name, count)),
        }
    }

    /// Write one field of an account immediately, returning the completed
    /// status token.
    pub fn set_field(
        &self,
        user_id: &str,
        process_instance_key: i64,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<String> {
        self.set_fields(
            user_id,
            process_instance_key,
            &FieldMap::new().with(field, value),
        )
    }

    pub fn set_fields(
        &self,
        user_id: &str,
        process_instance_key: i64,
        values: &FieldMap,
    ) -> Result<String> {
        let mut account = self.find_account(user_id, process_instance_key)?;
        for (name, value) in values.iter() {
            account.data.insert(name, value.clone());
        }
        self.provisioning.modify_account(&account)?;
        info!(
            user = user_id,
            process_instance_key,
            account = %account.account_id,
            fields = values.len(),
            "updated account fields directly"
        );
        Ok(self.completed_status.clone())
    }

    /// Read a field from the process form of the user's live primary
    /// account for an application instance. `None` when the user has no
    /// such account.
    pub fn primary_account_field(
        &self,
        user_id: &str,
        app_instance: &str,
        field: &str,
    ) -> Result<Option<String>> {
        let accounts = self.provisioning.accounts_for_user(user_id, false)?;
        let Some(account) = accounts.iter().find(|a| {
            a.account_type == AccountType::Primary
                && a.app_instance == app_instance
                && self
                    .config
                    .active_statuses
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(&a.status))
        }) else {
            debug!(user = user_id, app_instance, "no live primary account");
            return Ok(None);
        };

        let form = self
            .provisioning
            .process_form_data(account.process_instance_key)?;
        match form.first() {
            Some(row) => Ok(row.get_string(field)?),
            None => Ok(None),
        }
    }

    /// Write process-form fields directly, returning the completed token.
    pub fn set_process_form_fields(
        &self,
        process_instance_key: i64,
        values: &FieldMap,
    ) -> Result<String> {
        self.provisioning
            .set_process_form_data(process_instance_key, values)?;
        info!(
            process_instance_key,
            fields = values.len(),
            "updated process form directly"
        );
        Ok(self.completed_status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreCall};
    use crate::store::ServiceError;

    fn account(key: i64, pik: i64, account_type: AccountType, status: &str) -> Account {
        Account {
            key,
            account_id: format!("acct-{key}"),
            user_id: "1001".to_string(),
            app_instance: "ActiveDirectory".to_string(),
            process_instance_key: pik,
            status: status.to_string(),
            account_type,
            data: FieldMap::new()
                .with("UD_AD_LOGIN", "alice")
                .with("UD_AD_TITLE", "Engineer"),
        }
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::builder()
                .account(account(1, 501, AccountType::Secondary, "Provisioned"))
                .account(account(2, 502, AccountType::Primary, "Revoked"))
                .account(account(3, 503, AccountType::Primary, "Enabled"))
                .build(),
        )
    }

    #[test]
    fn test_set_field_writes_immediately() {
        let store = store();
        let mutator = AccountFieldMutator::new(store.clone());
        let status = mutator.set_field("1001", 503, "UD_AD_TITLE", "CTO").unwrap();
        assert_eq!(status, "COMPLETED");
        assert_eq!(store.calls(StoreCall::Submit), 0);

        let stored = &store.snapshot().accounts[2];
        assert_eq!(stored.data.get("UD_AD_TITLE"), Some(&FieldValue::from("CTO")));
    }

    #[test]
    fn test_unmatched_account_is_not_found() {
        let store = store();
        let mutator = AccountFieldMutator::new(store.clone());
        let err = mutator.set_field("1001", 999, "UD_AD_TITLE", "CTO").unwrap_err();
        assert!(matches!(
            err,
            PvbError::NotFound {
                kind: EntityKind::Account,
                ..
            }
        ));
        assert_eq!(store.calls(StoreCall::ModifyAccount), 0);
    }

    #[test]
    fn test_shared_process_instance_is_ambiguous() {
        let store = Arc::new(
            MemoryStore::builder()
                .account(account(1, 503, AccountType::Primary, "Provisioned"))
                .account(account(2, 503, AccountType::Primary, "Enabled"))
                .build(),
        );
        let err = AccountFieldMutator::new(store.clone())
            .set_field("1001", 503, "UD_AD_TITLE", "CTO")
            .unwrap_err();
        assert!(matches!(
            err,
            PvbError::Ambiguous {
                kind: EntityKind::Account,
                count: 2,
                ..
            }
        ));
        assert_eq!(err.code(), crate::errors::ErrorCode::AccountAmbiguous);
        assert_eq!(store.calls(StoreCall::ModifyAccount), 0);
    }

    #[test]
    fn test_primary_only_scan() {
        let store = store();
        let mutator = AccountFieldMutator::new(store.clone());
        assert!(mutator.find_account("1001", 501).is_err());

        let mut config = PvbConfig::default();
        config.account.primary_only = false;
        let mutator = AccountFieldMutator::new(store).with_config(&config);
        assert_eq!(mutator.find_account("1001", 501).unwrap().key, 1);
    }

    #[test]
    fn test_primary_account_field_skips_inactive() {
        let store = store();
        let mutator = AccountFieldMutator::new(store.clone());
        let login = mutator
            .primary_account_field("1001", "ActiveDirectory", "UD_AD_LOGIN")
            .unwrap();
        assert_eq!(login.as_deref(), Some("alice"));
        assert_eq!(
            mutator
                .primary_account_field("1001", "Other", "UD_AD_LOGIN")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_set_process_form_fields() {
        let store = store();
        let mutator = AccountFieldMutator::new(store.clone());
        let values = FieldMap::new().with("UD_AD_TITLE", "Lead").with("UD_AD_UID", 7);
        assert_eq!(mutator.set_process_form_fields(503, &values).unwrap(), "COMPLETED");
        let data = &store.snapshot().accounts[2].data;
        assert_eq!(data.get("UD_AD_UID"), Some(&FieldValue::Integer(7)));
    }

    #[test]
    fn test_modify_failure_propagates() {
        let store = store();
        store.fail_next(
            StoreCall::ModifyAccount,
            ServiceError::ConcurrentModification("account 3".to_string()),
        );
        let err = AccountFieldMutator::new(store)
            .set_field("1001", 503, "UD_AD_TITLE", "CTO")
            .unwrap_err();
        assert!(matches!(
            err,
            PvbError::Transport(ServiceError::ConcurrentModification(_))
        ));
    }
}
