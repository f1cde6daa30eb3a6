//! In-memory identity store.
//!
//! Implements every collaborator trait in [`crate::store`] over a
//! [`Snapshot`] that can be loaded from and saved to JSON. Used by the CLI
//! and as the substitutable fake in tests: it counts calls per operation,
//! supports one-shot fault injection, records every submitted request and
//! can simulate a competing writer winning an entitlement create race.

use crate::account::{Account, AccountType};
use crate::entitlement::{Entitlement, NewEntitlement};
use crate::errors::ErrorCode;
use crate::request::{Intent, OperationResult, RequestData};
use crate::store::{
    AppInstanceDirectory, ApplicationInstance, Cell, Criteria, EntitlementStore, FormStore,
    LookupCatalog, LookupValue, ObjectStore, ProvisioningGateway, RecordSet, RequestGateway, Row,
    ServiceError, columns,
};
use crate::types::{FieldMap, FieldValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Collaborator operations, for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreCall {
    FindForms,
    FormVersions,
    FormFields,
    FindObjects,
    LookupValues,
    RemoveLookupValues,
    FindEntitlements,
    AddEntitlement,
    FindAppByName,
    FindAppByBinding,
    Submit,
    AccountsForUser,
    ModifyAccount,
    ProcessFormData,
    SetProcessFormData,
}

/// Serializable contents of an identity store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Snapshot {
    #[serde(default)]
    pub forms: Vec<FormRecord>,
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    /// Lookup list name to its code/decode pairs.
    #[serde(default)]
    pub lookups: BTreeMap<String, Vec<LookupValue>>,
    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
    #[serde(default)]
    pub app_instances: Vec<ApplicationInstance>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// Errors reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write snapshot {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SnapshotError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::SnapshotReadError,
            Self::Parse { .. } => ErrorCode::SnapshotParseError,
            Self::Write { .. } => ErrorCode::SnapshotWriteError,
        }
    }
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let write_err = |source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(std::io::Error::from)
            .map_err(write_err)?;
        std::fs::write(path, json + "\n").map_err(write_err)
    }

    /// JSON Schema of the snapshot file format.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Snapshot)
    }
}

/// A form definition with its versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FormRecord {
    pub key: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_version: Option<i32>,
    #[serde(default)]
    pub versions: Vec<FormVersionRecord>,
}

impl FormRecord {
    pub fn new(key: i64, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: None,
            active_version: None,
            versions: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn version(mut self, version: i32, fields: Vec<FieldRecord>) -> Self {
        self.versions.push(FormVersionRecord { version, fields });
        self
    }

    #[must_use]
    pub fn active(mut self, version: i32) -> Self {
        self.active_version = Some(version);
        self
    }

    fn row(&self) -> Row {
        Row::new()
            .with(columns::FORM_KEY, self.key)
            .with(columns::FORM_NAME, self.name.as_str())
            .with(columns::FORM_DESCRIPTION, self.description.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FormVersionRecord {
    pub version: i32,
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
}

/// One stored form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldRecord {
    pub key: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_field_type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub encrypted: bool,
}

fn default_field_type() -> String {
    "TextField".to_string()
}

fn default_true() -> bool {
    true
}

impl FieldRecord {
    pub fn new(key: i64, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            label: None,
            field_type: default_field_type(),
            lookup: None,
            order: None,
            visible: true,
            encrypted: false,
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }

    #[must_use]
    pub fn lookup(mut self, list: impl Into<String>) -> Self {
        self.lookup = Some(list.into());
        self
    }

    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn row(&self) -> Row {
        Row::new()
            .with(columns::FORM_FIELD_KEY, self.key)
            .with(columns::FORM_FIELD_NAME, self.name.as_str())
            .with(columns::FORM_FIELD_LABEL, self.label.clone())
            .with(columns::FORM_FIELD_TYPE, self.field_type.as_str())
            .with(columns::FORM_FIELD_ORDER, self.order)
            .with(columns::FORM_FIELD_ENCRYPTED, if self.encrypted { "1" } else { "0" })
            .with(columns::FORM_FIELD_VISIBLE, if self.visible { "true" } else { "false" })
            .with(columns::FORM_FIELD_LOOKUP_CODE, self.lookup.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ObjectRecord {
    pub key: i64,
    pub name: String,
}

/// What the approval stub answers to a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ApprovalResponse {
    /// `REQUEST_CREATED` for approval requests, `COMPLETED` for direct ones.
    #[default]
    ByIntent,
    /// Always answer with this status.
    Status(String),
    /// Return no result at all.
    NoResult,
}

/// A request received by the approval stub.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub request: RequestData,
    pub intent: Intent,
}

/// In-memory implementation of every collaborator trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Snapshot>,
    faults: Mutex<BTreeMap<StoreCall, ServiceError>>,
    calls: Mutex<BTreeMap<StoreCall, usize>>,
    submissions: Mutex<Vec<Submission>>,
    approval: Mutex<ApprovalResponse>,
    competing_add: Mutex<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.state).clone()
    }

    /// Make the next call of `call` fail with `error`.
    pub fn fail_next(&self, call: StoreCall, error: ServiceError) {
        lock(&self.faults).insert(call, error);
    }

    /// Number of times `call` has been invoked, failed calls included.
    pub fn calls(&self, call: StoreCall) -> usize {
        lock(&self.calls).get(&call).copied().unwrap_or(0)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.submissions).clone()
    }

    pub fn respond_with(&self, response: ApprovalResponse) {
        *lock(&self.approval) = response;
    }

    /// On the next entitlement add, persist an identical entitlement first,
    /// as a concurrent caller that passed the same existence check would.
    pub fn race_next_entitlement_add(&self) {
        *lock(&self.competing_add) = true;
    }

    fn enter(&self, call: StoreCall) -> Result<(), ServiceError> {
        *lock(&self.calls).entry(call).or_insert(0) += 1;
        match lock(&self.faults).remove(&call) {
            Some(err) => {
                debug!(?call, error = %err, "injected fault");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

impl FormStore for MemoryStore {
    fn find_forms(&self, criteria: &Criteria) -> Result<RecordSet, ServiceError> {
        self.enter(StoreCall::FindForms)?;
        let state = lock(&self.state);
        Ok(RecordSet::from_rows(
            state
                .forms
                .iter()
                .map(FormRecord::row)
                .filter(|row| criteria.matches(row))
                .collect(),
        ))
    }

    fn form_versions(&self, form_key: i64) -> Result<RecordSet, ServiceError> {
        self.enter(StoreCall::FormVersions)?;
        let state = lock(&self.state);
        let form = state
            .forms
            .iter()
            .find(|f| f.key == form_key)
            .ok_or_else(|| ServiceError::UnknownReference(format!("form #{form_key}")))?;
        let rows = form
            .active_version
            .map(|v| Row::new().with(columns::FORM_ACTIVE_VERSION, v))
            .into_iter()
            .collect();
        Ok(RecordSet::from_rows(rows))
    }

    fn form_fields(&self, form_key: i64, version: i32) -> Result<RecordSet, ServiceError> {
        self.enter(StoreCall::FormFields)?;
        let state = lock(&self.state);
        let fields = state
            .forms
            .iter()
            .find(|f| f.key == form_key)
            .and_then(|f| f.versions.iter().find(|v| v.version == version))
            .ok_or_else(|| {
                ServiceError::UnknownReference(format!("form #{form_key} version {version}"))
            })?;
        Ok(RecordSet::from_rows(
            fields.fields.iter().map(FieldRecord::row).collect(),
        ))
    }
}

impl ObjectStore for MemoryStore {
    fn find_objects(&self, criteria: &Criteria) -> Result<RecordSet, ServiceError> {
        self.enter(StoreCall::FindObjects)?;
        let state = lock(&self.state);
        Ok(RecordSet::from_rows(
            state
                .objects
                .iter()
                .map(|o| {
                    Row::new()
                        .with(columns::OBJECT_KEY, o.key)
                        .with(columns::OBJECT_NAME, o.name.as_str())
                })
                .filter(|row| criteria.matches(row))
                .collect(),
        ))
    }
}

impl LookupCatalog for MemoryStore {
    fn lookup_values(&self, list: &str) -> Result<Vec<LookupValue>, ServiceError> {
        self.enter(StoreCall::LookupValues)?;
        lock(&self.state)
            .lookups
            .get(list)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownReference(format!("lookup {list}")))
    }

    fn remove_values(&self, list: &str, codes: &[String]) -> Result<usize, ServiceError> {
        self.enter(StoreCall::RemoveLookupValues)?;
        let mut state = lock(&self.state);
        let values = state
            .lookups
            .get_mut(list)
            .ok_or_else(|| ServiceError::UnknownReference(format!("lookup {list}")))?;
        let before = values.len();
        values.retain(|v| !codes.contains(&v.code));
        Ok(before - values.len())
    }
}

impl EntitlementStore for MemoryStore {
    fn find_by_code(&self, code: &str) -> Result<Vec<Entitlement>, ServiceError> {
        self.enter(StoreCall::FindEntitlements)?;
        let mut found: Vec<Entitlement> = lock(&self.state)
            .entitlements
            .iter()
            .filter(|e| e.code == code)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.key);
        Ok(found)
    }

    fn add(&self, entitlement: NewEntitlement) -> Result<Entitlement, ServiceError> {
        self.enter(StoreCall::AddEntitlement)?;
        let mut state = lock(&self.state);
        let mut next_key = state.entitlements.iter().map(|e| e.key).max().unwrap_or(0) + 1;

        if std::mem::take(&mut *lock(&self.competing_add)) {
            state
                .entitlements
                .push(entitlement.clone().into_entitlement(next_key));
            next_key += 1;
        }

        let created = entitlement.into_entitlement(next_key);
        state.entitlements.push(created.clone());
        Ok(created)
    }
}

impl AppInstanceDirectory for MemoryStore {
    fn find_by_name(&self, name: &str) -> Result<Option<ApplicationInstance>, ServiceError> {
        self.enter(StoreCall::FindAppByName)?;
        Ok(lock(&self.state)
            .app_instances
            .iter()
            .find(|a| a.name == name)
            .cloned())
    }

    fn find_by_binding(
        &self,
        object_key: i64,
        it_resource_key: i64,
    ) -> Result<Vec<ApplicationInstance>, ServiceError> {
        self.enter(StoreCall::FindAppByBinding)?;
        Ok(lock(&self.state)
            .app_instances
            .iter()
            .filter(|a| a.object_key == object_key && a.it_resource_key == it_resource_key)
            .cloned()
            .collect())
    }
}

impl RequestGateway for MemoryStore {
    fn submit(
        &self,
        request: &RequestData,
        intent: Intent,
    ) -> Result<Option<OperationResult>, ServiceError> {
        self.enter(StoreCall::Submit)?;
        let mut submissions = lock(&self.submissions);
        submissions.push(Submission {
            request: request.clone(),
            intent,
        });
        let request_id = Some(submissions.len().to_string());

        let status = match &*lock(&self.approval) {
            ApprovalResponse::NoResult => return Ok(None),
            ApprovalResponse::Status(status) => status.clone(),
            ApprovalResponse::ByIntent => match intent {
                Intent::Request => "REQUEST_CREATED".to_string(),
                Intent::Direct => "COMPLETED".to_string(),
            },
        };
        Ok(Some(OperationResult { status, request_id }))
    }
}

impl ProvisioningGateway for MemoryStore {
    fn accounts_for_user(
        &self,
        user_id: &str,
        primary_only: bool,
    ) -> Result<Vec<Account>, ServiceError> {
        self.enter(StoreCall::AccountsForUser)?;
        Ok(lock(&self.state)
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| !primary_only || a.account_type == AccountType::Primary)
            .cloned()
            .collect())
    }

    fn modify_account(&self, account: &Account) -> Result<(), ServiceError> {
        self.enter(StoreCall::ModifyAccount)?;
        let mut state = lock(&self.state);
        let stored = state
            .accounts
            .iter_mut()
            .find(|a| a.key == account.key)
            .ok_or_else(|| ServiceError::UnknownReference(format!("account #{}", account.key)))?;
        *stored = account.clone();
        Ok(())
    }

    fn process_form_data(&self, process_instance_key: i64) -> Result<RecordSet, ServiceError> {
        self.enter(StoreCall::ProcessFormData)?;
        let state = lock(&self.state);
        let account = find_by_process_instance(&state, process_instance_key)?;
        let row = account
            .data
            .iter()
            .fold(Row::new(), |row, (name, value)| row.with(name, cell(value)));
        Ok(RecordSet::from_rows(vec![row]))
    }

    fn set_process_form_data(
        &self,
        process_instance_key: i64,
        values: &FieldMap,
    ) -> Result<(), ServiceError> {
        self.enter(StoreCall::SetProcessFormData)?;
        let mut state = lock(&self.state);
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.process_instance_key == process_instance_key)
            .ok_or_else(|| unknown_process_instance(process_instance_key))?;
        for (name, value) in values.iter() {
            account.data.insert(name, value.clone());
        }
        Ok(())
    }
}

fn find_by_process_instance(
    state: &Snapshot,
    process_instance_key: i64,
) -> Result<&Account, ServiceError> {
    state
        .accounts
        .iter()
        .find(|a| a.process_instance_key == process_instance_key)
        .ok_or_else(|| unknown_process_instance(process_instance_key))
}

fn unknown_process_instance(process_instance_key: i64) -> ServiceError {
    ServiceError::UnknownReference(format!("process instance #{process_instance_key}"))
}

fn cell(value: &FieldValue) -> Cell {
    match value {
        FieldValue::Null => Cell::Null,
        FieldValue::Integer(n) => Cell::Number(i64::from(*n)),
        FieldValue::Long(n) => Cell::Number(*n),
        other => Cell::Text(other.to_string()),
    }
}

/// Builder for a [`MemoryStore`].
#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    snapshot: Snapshot,
}

impl MemoryStoreBuilder {
    #[must_use]
    pub fn form(mut self, form: FormRecord) -> Self {
        self.snapshot.forms.push(form);
        self
    }

    #[must_use]
    pub fn object(mut self, key: i64, name: impl Into<String>) -> Self {
        self.snapshot.objects.push(ObjectRecord {
            key,
            name: name.into(),
        });
        self
    }

    #[must_use]
    pub fn lookup_value(
        mut self,
        list: impl Into<String>,
        key: i64,
        code: impl Into<String>,
        decode: impl Into<String>,
    ) -> Self {
        self.snapshot
            .lookups
            .entry(list.into())
            .or_default()
            .push(LookupValue {
                key,
                code: code.into(),
                decode: decode.into(),
            });
        self
    }

    #[must_use]
    pub fn entitlement(mut self, entitlement: Entitlement) -> Self {
        self.snapshot.entitlements.push(entitlement);
        self
    }

    #[must_use]
    pub fn app_instance(mut self, app: ApplicationInstance) -> Self {
        self.snapshot.app_instances.push(app);
        self
    }

    #[must_use]
    pub fn account(mut self, account: Account) -> Self {
        self.snapshot.accounts.push(account);
        self
    }

    pub fn build(self) -> MemoryStore {
        MemoryStore::from_snapshot(self.snapshot)
    }
}
