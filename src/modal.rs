use crate::ids::IdGenerator;
use crate::record::{DataSource, FieldMap, Record};
use crate::resources::ResourceSchema;
use crate::store::{CollectionClient, StoreError};
use crate::tenant::TenantContext;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} records belong to an organization; select one first")]
    NoTenant(&'static str),
    #[error("a save is already in progress")]
    InFlight,
    #[error("nothing is being saved")]
    NotSubmitting,
    #[error("the form is closed")]
    Closed,
    #[error(transparent)]
    Remote(#[from] StoreError),
}

impl CrudError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::NoTenant(_) => "no_tenant",
            Self::InFlight | Self::NotSubmitting | Self::Closed => "bad_state",
            Self::Remote(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalMode {
    Create,
    Edit { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalPhase {
    Open,
    Submitting,
    Closed,
}

/// A write built by the modal, waiting to be sent to the client.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    Insert {
        collection: &'static str,
        record: Record,
    },
    Update {
        collection: &'static str,
        id: String,
        patch: FieldMap,
        updated_at: DateTime<Utc>,
    },
}

impl PendingWrite {
    pub fn execute(&self, client: &dyn CollectionClient) -> Result<Record, StoreError> {
        match self {
            Self::Insert { collection, record } => client.insert(collection, record),
            Self::Update {
                collection,
                id,
                patch,
                updated_at,
            } => client.update(collection, id, patch, *updated_at),
        }
    }
}

/// Create/edit form bound to a draft. A failed save keeps the form open with
/// the draft untouched and an error banner; a successful one closes it.
#[derive(Debug)]
pub struct CrudModal {
    schema: &'static ResourceSchema,
    mode: ModalMode,
    draft: FieldMap,
    defaults: FieldMap,
    /// Field values of the row being edited; empty when creating.
    stored: FieldMap,
    phase: ModalPhase,
    error: Option<String>,
}

impl CrudModal {
    /// `defaults` fill fields the draft leaves out. Envelope keys in it are ignored:
    /// organization, source and timestamps are always set by the modal.
    pub fn open_create(schema: &'static ResourceSchema, defaults: FieldMap) -> Self {
        Self {
            schema,
            mode: ModalMode::Create,
            draft: FieldMap::new(),
            defaults,
            stored: FieldMap::new(),
            phase: ModalPhase::Open,
            error: None,
        }
    }

    pub fn open_edit(schema: &'static ResourceSchema, record: &Record) -> Self {
        let draft: FieldMap = record
            .fields
            .iter()
            .filter(|(k, _)| schema.field(k).is_some())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            schema,
            mode: ModalMode::Edit {
                id: record.id.clone(),
            },
            stored: draft.clone(),
            draft,
            defaults: FieldMap::new(),
            phase: ModalPhase::Open,
            error: None,
        }
    }

    pub fn mode(&self) -> &ModalMode {
        &self.mode
    }

    pub fn phase(&self) -> ModalPhase {
        self.phase
    }

    pub fn draft(&self) -> &FieldMap {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn can_submit(&self) -> bool {
        self.phase == ModalPhase::Open
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.draft.insert(key.to_string(), value.into());
    }

    pub fn set_draft(&mut self, draft: FieldMap) {
        for (k, v) in draft {
            self.draft.insert(k, v);
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn close(&mut self) {
        if self.phase == ModalPhase::Open {
            self.phase = ModalPhase::Closed;
        }
    }

    fn reject(&mut self, e: CrudError) -> CrudError {
        self.error = Some(e.to_string());
        e
    }

    /// Validates and builds the write, then locks the form until `finish`.
    /// Validation failures never produce a write.
    pub fn begin_submit(
        &mut self,
        tenant: Option<&TenantContext>,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
    ) -> Result<PendingWrite, CrudError> {
        match self.phase {
            ModalPhase::Open => {}
            ModalPhase::Submitting => return Err(CrudError::InFlight),
            ModalPhase::Closed => return Err(CrudError::Closed),
        }
        self.error = None;

        if let Err(msg) = self.schema.check_required(&self.draft) {
            return Err(self.reject(CrudError::Validation(msg)));
        }
        let fields = match self.schema.normalize_edit(&self.draft, &self.stored) {
            Ok(f) => f,
            Err(msg) => return Err(self.reject(CrudError::Validation(msg))),
        };

        let pending = match self.mode.clone() {
            ModalMode::Create => {
                let organization_id = if self.schema.tenant_scoped {
                    match tenant {
                        Some(t) => Some(t.organization_id.clone()),
                        None => return Err(self.reject(CrudError::NoTenant(self.schema.label))),
                    }
                } else {
                    None
                };
                let caller_defaults = match self.schema.normalize_draft(&self.defaults) {
                    Ok(d) => d,
                    Err(msg) => return Err(self.reject(CrudError::Validation(msg))),
                };

                let mut record =
                    Record::new(ids.generate(self.schema.id_prefix), DataSource::Offline, now);
                record.organization_id = organization_id;
                record.updated_at = Some(now);
                record.fields = self.schema.default_fields();
                // Blank inputs leave the schema default in place.
                for (k, v) in caller_defaults.into_iter().chain(fields) {
                    if !v.is_null() {
                        record.fields.insert(k, v);
                    }
                }
                PendingWrite::Insert {
                    collection: self.schema.collection,
                    record,
                }
            }
            ModalMode::Edit { id } => PendingWrite::Update {
                collection: self.schema.collection,
                id,
                patch: fields,
                updated_at: now,
            },
        };

        self.phase = ModalPhase::Submitting;
        Ok(pending)
    }

    /// Settles an in-flight save with the client's answer.
    pub fn finish(&mut self, result: Result<Record, StoreError>) -> Result<Record, CrudError> {
        if self.phase != ModalPhase::Submitting {
            return Err(CrudError::NotSubmitting);
        }
        match result {
            Ok(rec) => {
                self.phase = ModalPhase::Closed;
                self.error = None;
                Ok(rec)
            }
            Err(e) => {
                self.phase = ModalPhase::Open;
                self.error = Some(format!("Failed to save {}: {}", self.schema.label, e));
                Err(CrudError::Remote(e))
            }
        }
    }

    pub fn submit(
        &mut self,
        client: &dyn CollectionClient,
        tenant: Option<&TenantContext>,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
    ) -> Result<Record, CrudError> {
        let pending = self.begin_submit(tenant, ids, now)?;
        let result = pending.execute(client);
        self.finish(result)
    }
}

/// Delete that only reaches the client once confirmed.
#[derive(Debug)]
pub struct PendingDelete {
    schema: &'static ResourceSchema,
    id: String,
}

impl PendingDelete {
    pub fn new(schema: &'static ResourceSchema, id: impl Into<String>) -> Self {
        Self {
            schema,
            id: id.into(),
        }
    }

    pub fn prompt(&self) -> String {
        format!("Delete this {}? This cannot be undone.", self.schema.label)
    }

    pub fn confirm(self, client: &dyn CollectionClient) -> Result<(), CrudError> {
        client.delete(self.schema.collection, &self.id)?;
        log::info!("deleted {} {}", self.schema.collection, self.id);
        Ok(())
    }
}
