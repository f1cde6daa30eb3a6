//! Shared library for the provisioning bridge.
//!
//! Resolves connected-system form schemas, renders form data for audit,
//! reconciles entitlements against lookup catalogs and builds typed
//! provisioning requests for the approval subsystem. Every external
//! collaborator is reached through the traits in [`store`], so callers
//! inject the live platform or the in-memory fake from [`memory`].

#![forbid(unsafe_code)]

pub mod account;
pub mod config;
pub mod entitlement;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod projector;
pub mod request;
pub mod schema;
pub mod store;
pub mod testing;
pub mod types;

pub use account::{Account, AccountFieldMutator, AccountType};
pub use config::{ConfigError, LoadedConfig, load_config};
pub use entitlement::{
    Entitlement, EntitlementReconciler, EntitlementTarget, NewEntitlement, Reconciliation,
};
pub use errors::{EntityKind, ErrorCategory, ErrorCode, ErrorEntry, InvalidArgument, PvbError};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use memory::{MemoryStore, Snapshot, SnapshotError, StoreCall};
pub use projector::FieldProjector;
pub use request::{
    AttributeAction, AttributeType, AttributeValue, Intent, Operation, OperationResult,
    RequestBuilder, RequestData, TypedAttribute,
};
pub use schema::{FieldDefinition, FieldType, FormDefinition, FormRef, FormSchema, SchemaCache};
pub use store::{ApplicationInstance, LookupValue, RecordSet, Row, ServiceError};
pub use types::{
    ChildAction, ChildSectionRecord, ChildSections, FieldMap, FieldValue, ProjectionOrder,
    PvbConfig,
};

/// Result alias for operations that fail with a [`PvbError`].
pub type Result<T> = std::result::Result<T, PvbError>;
