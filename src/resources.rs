use crate::export::Column;
use crate::join::ForeignKey;
use crate::record::{FieldMap, RESERVED_KEYS};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Choice(&'static [&'static str]),
    /// Soft foreign key into the named collection.
    Reference(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Text,
    }
}

const fn number(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Number,
    }
}

const fn date(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Date,
    }
}

const fn choice(
    name: &'static str,
    label: &'static str,
    options: &'static [&'static str],
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Choice(options),
    }
}

const fn reference(name: &'static str, label: &'static str, collection: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Reference(collection),
    }
}

/// Everything a generic screen needs to list, filter, edit and export one
/// collection.
#[derive(Debug)]
pub struct ResourceSchema {
    pub collection: &'static str,
    pub label: &'static str,
    pub id_prefix: &'static str,
    /// Rows carry the tenant's organization id and are listed per tenant.
    pub tenant_scoped: bool,
    pub fields: &'static [FieldSpec],
    pub required: &'static [&'static str],
    pub required_message: &'static str,
    pub search_fields: &'static [&'static str],
    pub filter_fields: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
    pub export_columns: &'static [Column],
    pub defaults: &'static [(&'static str, &'static str)],
    pub empty_message: &'static str,
    pub group_by: &'static str,
}

const STATUS_ACTIVE: &[&str] = &["active", "inactive"];

pub static COURSES: ResourceSchema = ResourceSchema {
    collection: "courses",
    label: "course",
    id_prefix: "crs",
    tenant_scoped: true,
    fields: &[
        text("name", "Name"),
        text("code", "Code"),
        text("category", "Category"),
        choice("status", "Status", &["active", "draft", "archived"]),
        number("duration_hours", "Duration (hours)"),
        number("price", "Price"),
        text("description", "Description"),
    ],
    required: &["name", "code"],
    required_message: "Name and code are required",
    search_fields: &["name", "code", "category"],
    filter_fields: &["status", "category"],
    foreign_keys: &[],
    export_columns: &[
        Column::new("code", "Code"),
        Column::new("name", "Name"),
        Column::new("category", "Category"),
        Column::new("status", "Status"),
        Column::new("duration_hours", "Duration (hours)"),
        Column::new("data_source", "Source"),
    ],
    defaults: &[("status", "active")],
    empty_message: "No courses yet. Create your first course to get started.",
    group_by: "status",
};

pub static SESSIONS: ResourceSchema = ResourceSchema {
    collection: "sessions",
    label: "session",
    id_prefix: "ses",
    tenant_scoped: true,
    fields: &[
        text("title", "Title"),
        reference("course_id", "Course", "courses"),
        reference("venue_id", "Venue", "venues"),
        reference("instructor_id", "Instructor", "instructors"),
        date("start_date", "Start date"),
        date("end_date", "End date"),
        choice(
            "status",
            "Status",
            &["scheduled", "in_progress", "completed", "cancelled"],
        ),
        number("capacity", "Capacity"),
    ],
    required: &["course_id", "start_date"],
    required_message: "Course and start date are required",
    search_fields: &["title", "course.name", "venue.name", "instructor.last_name"],
    filter_fields: &["status", "course_id", "venue_id", "instructor_id"],
    foreign_keys: &[
        ForeignKey::new("course_id", "courses", "course"),
        ForeignKey::new("venue_id", "venues", "venue"),
        ForeignKey::new("instructor_id", "instructors", "instructor"),
    ],
    export_columns: &[
        Column::new("title", "Title"),
        Column::new("course.name", "Course"),
        Column::new("venue.name", "Venue"),
        Column::new("instructor.last_name", "Instructor"),
        Column::new("start_date", "Start date"),
        Column::new("end_date", "End date"),
        Column::new("status", "Status"),
    ],
    defaults: &[("status", "scheduled")],
    empty_message: "No sessions scheduled. Schedule a session for one of your courses.",
    group_by: "status",
};

pub static LEARNERS: ResourceSchema = ResourceSchema {
    collection: "learners",
    label: "learner",
    id_prefix: "lrn",
    tenant_scoped: true,
    fields: &[
        text("first_name", "First name"),
        text("last_name", "Last name"),
        text("email", "Email"),
        text("phone", "Phone"),
        text("department", "Department"),
        text("company", "Company"),
        choice("status", "Status", STATUS_ACTIVE),
    ],
    required: &["first_name", "last_name"],
    required_message: "First and last name are required",
    search_fields: &["first_name", "last_name", "email", "department"],
    filter_fields: &["status", "department"],
    foreign_keys: &[],
    export_columns: &[
        Column::new("first_name", "First name"),
        Column::new("last_name", "Last name"),
        Column::new("email", "Email"),
        Column::new("department", "Department"),
        Column::new("status", "Status"),
    ],
    defaults: &[("status", "active")],
    empty_message: "No learners yet. Add a learner or sync from your LMS.",
    group_by: "department",
};

pub static INSTRUCTORS: ResourceSchema = ResourceSchema {
    collection: "instructors",
    label: "instructor",
    id_prefix: "ins",
    tenant_scoped: true,
    fields: &[
        text("first_name", "First name"),
        text("last_name", "Last name"),
        text("email", "Email"),
        text("phone", "Phone"),
        text("specialization", "Specialization"),
        choice("status", "Status", STATUS_ACTIVE),
    ],
    required: &["first_name", "last_name"],
    required_message: "First and last name are required",
    search_fields: &["first_name", "last_name", "email", "specialization"],
    filter_fields: &["status", "specialization"],
    foreign_keys: &[],
    export_columns: &[
        Column::new("first_name", "First name"),
        Column::new("last_name", "Last name"),
        Column::new("email", "Email"),
        Column::new("specialization", "Specialization"),
        Column::new("status", "Status"),
    ],
    defaults: &[("status", "active")],
    empty_message: "No instructors yet. Add your first instructor.",
    group_by: "specialization",
};

pub static VENUES: ResourceSchema = ResourceSchema {
    collection: "venues",
    label: "venue",
    id_prefix: "ven",
    tenant_scoped: true,
    fields: &[
        text("name", "Name"),
        text("address", "Address"),
        text("city", "City"),
        number("capacity", "Capacity"),
        choice("status", "Status", STATUS_ACTIVE),
    ],
    required: &["name"],
    required_message: "Name is required",
    search_fields: &["name", "address", "city"],
    filter_fields: &["status", "city"],
    foreign_keys: &[],
    export_columns: &[
        Column::new("name", "Name"),
        Column::new("address", "Address"),
        Column::new("city", "City"),
        Column::new("capacity", "Capacity"),
    ],
    defaults: &[("status", "active")],
    empty_message: "No venues yet. Add a venue to schedule sessions.",
    group_by: "city",
};

pub static SUPPLIERS: ResourceSchema = ResourceSchema {
    collection: "suppliers",
    label: "supplier",
    id_prefix: "sup",
    tenant_scoped: true,
    fields: &[
        text("name", "Name"),
        text("contact_name", "Contact"),
        text("email", "Email"),
        text("phone", "Phone"),
        text("category", "Category"),
        choice("status", "Status", STATUS_ACTIVE),
    ],
    required: &["name"],
    required_message: "Name is required",
    search_fields: &["name", "contact_name", "email", "category"],
    filter_fields: &["status", "category"],
    foreign_keys: &[],
    export_columns: &[
        Column::new("name", "Name"),
        Column::new("contact_name", "Contact"),
        Column::new("email", "Email"),
        Column::new("category", "Category"),
        Column::new("status", "Status"),
    ],
    defaults: &[("status", "active")],
    empty_message: "No suppliers yet. Add a training supplier.",
    group_by: "category",
};

pub static CERTIFICATES: ResourceSchema = ResourceSchema {
    collection: "certificates",
    label: "certificate",
    id_prefix: "crt",
    tenant_scoped: true,
    fields: &[
        reference("learner_id", "Learner", "learners"),
        reference("course_id", "Course", "courses"),
        reference("session_id", "Session", "sessions"),
        text("certificate_number", "Certificate number"),
        date("issue_date", "Issue date"),
        date("expiry_date", "Expiry date"),
        choice("status", "Status", &["valid", "expired", "revoked"]),
    ],
    required: &["learner_id", "course_id"],
    required_message: "Learner and course are required",
    search_fields: &[
        "certificate_number",
        "learner.first_name",
        "learner.last_name",
        "course.name",
    ],
    filter_fields: &["status", "course_id"],
    foreign_keys: &[
        ForeignKey::new("learner_id", "learners", "learner"),
        ForeignKey::new("course_id", "courses", "course"),
        ForeignKey::new("session_id", "sessions", "session"),
    ],
    export_columns: &[
        Column::new("certificate_number", "Certificate"),
        Column::new("learner.first_name", "First name"),
        Column::new("learner.last_name", "Last name"),
        Column::new("course.name", "Course"),
        Column::new("issue_date", "Issued"),
        Column::new("expiry_date", "Expires"),
        Column::new("status", "Status"),
    ],
    defaults: &[("status", "valid")],
    empty_message: "No certificates issued yet.",
    group_by: "status",
};

pub static ATTENDANCE: ResourceSchema = ResourceSchema {
    collection: "attendance",
    label: "attendance record",
    id_prefix: "att",
    tenant_scoped: true,
    fields: &[
        reference("session_id", "Session", "sessions"),
        reference("learner_id", "Learner", "learners"),
        choice("status", "Status", &["present", "absent", "late", "excused"]),
        date("date", "Date"),
        text("notes", "Notes"),
    ],
    required: &["session_id", "learner_id"],
    required_message: "Session and learner are required",
    search_fields: &["learner.first_name", "learner.last_name", "session.title", "notes"],
    filter_fields: &["status", "session_id"],
    foreign_keys: &[
        ForeignKey::new("session_id", "sessions", "session"),
        ForeignKey::new("learner_id", "learners", "learner"),
    ],
    export_columns: &[
        Column::new("session.title", "Session"),
        Column::new("learner.first_name", "First name"),
        Column::new("learner.last_name", "Last name"),
        Column::new("date", "Date"),
        Column::new("status", "Status"),
        Column::new("notes", "Notes"),
    ],
    defaults: &[("status", "present")],
    empty_message: "No attendance recorded. Take attendance from a session.",
    group_by: "status",
};

pub static ORGANIZATIONS: ResourceSchema = ResourceSchema {
    collection: "organizations",
    label: "organization",
    id_prefix: "org",
    tenant_scoped: false,
    fields: &[
        text("name", "Name"),
        text("slug", "Slug"),
        choice("plan", "Plan", &["free", "pro", "enterprise"]),
        choice("status", "Status", &["active", "trial", "suspended"]),
        text("billing_email", "Billing email"),
        number("seats", "Seats"),
    ],
    required: &["name"],
    required_message: "Name is required",
    search_fields: &["name", "slug", "billing_email"],
    filter_fields: &["plan", "status"],
    foreign_keys: &[],
    export_columns: &[
        Column::new("name", "Name"),
        Column::new("slug", "Slug"),
        Column::new("plan", "Plan"),
        Column::new("status", "Status"),
        Column::new("seats", "Seats"),
    ],
    defaults: &[("plan", "free"), ("status", "trial")],
    empty_message: "No organizations yet. Onboard your first customer.",
    group_by: "plan",
};

pub static USERS: ResourceSchema = ResourceSchema {
    collection: "users",
    label: "user",
    id_prefix: "usr",
    tenant_scoped: false,
    fields: &[
        text("email", "Email"),
        text("full_name", "Full name"),
        choice("role", "Role", &["superadmin", "admin", "manager", "viewer"]),
        reference("organization", "Organization", "organizations"),
        choice("status", "Status", STATUS_ACTIVE),
    ],
    required: &["email"],
    required_message: "Email is required",
    search_fields: &["email", "full_name", "org.name"],
    filter_fields: &["role", "status", "organization"],
    foreign_keys: &[ForeignKey::new("organization", "organizations", "org")],
    export_columns: &[
        Column::new("email", "Email"),
        Column::new("full_name", "Full name"),
        Column::new("role", "Role"),
        Column::new("org.name", "Organization"),
        Column::new("status", "Status"),
    ],
    defaults: &[("role", "viewer"), ("status", "active")],
    empty_message: "No users yet. Invite a user to an organization.",
    group_by: "role",
};

pub static INVOICES: ResourceSchema = ResourceSchema {
    collection: "invoices",
    label: "invoice",
    id_prefix: "inv",
    tenant_scoped: false,
    fields: &[
        reference("organization", "Organization", "organizations"),
        text("number", "Number"),
        number("amount", "Amount"),
        text("currency", "Currency"),
        choice("status", "Status", &["draft", "pending", "paid", "overdue"]),
        date("issued_at", "Issued"),
        date("due_date", "Due"),
    ],
    required: &["organization", "amount"],
    required_message: "Organization and amount are required",
    search_fields: &["number", "org.name"],
    filter_fields: &["status", "organization", "currency"],
    foreign_keys: &[ForeignKey::new("organization", "organizations", "org")],
    export_columns: &[
        Column::new("number", "Number"),
        Column::new("org.name", "Organization"),
        Column::new("amount", "Amount"),
        Column::new("currency", "Currency"),
        Column::new("status", "Status"),
        Column::new("due_date", "Due"),
    ],
    defaults: &[("currency", "EUR"), ("status", "draft")],
    empty_message: "No invoices yet.",
    group_by: "status",
};

pub static ALL: &[&ResourceSchema] = &[
    &COURSES,
    &SESSIONS,
    &LEARNERS,
    &INSTRUCTORS,
    &VENUES,
    &SUPPLIERS,
    &CERTIFICATES,
    &ATTENDANCE,
    &ORGANIZATIONS,
    &USERS,
    &INVOICES,
];

pub fn lookup(collection: &str) -> Option<&'static ResourceSchema> {
    ALL.iter().copied().find(|s| s.collection == collection)
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks the required set. A blank string, null or missing value counts as empty.
    pub fn check_required(&self, draft: &FieldMap) -> Result<(), String> {
        let missing = self.required.iter().any(|k| match draft.get(*k) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        });
        if missing {
            return Err(self.required_message.to_string());
        }
        Ok(())
    }

    /// Keeps only this resource's editable fields, coerced to their declared kind.
    /// Envelope keys are dropped silently; unknown keys are rejected.
    pub fn normalize_draft(&self, draft: &FieldMap) -> Result<FieldMap, String> {
        self.normalize_edit(draft, &FieldMap::new())
    }

    /// Like `normalize_draft`, but values equal to the stored row pass through
    /// unchecked. Synced rows may hold values outside this schema's options.
    pub fn normalize_edit(&self, draft: &FieldMap, stored: &FieldMap) -> Result<FieldMap, String> {
        let mut out = FieldMap::new();
        for (k, v) in draft {
            if RESERVED_KEYS.contains(&k.as_str()) {
                continue;
            }
            let Some(spec) = self.field(k) else {
                return Err(format!("unknown {} field: {}", self.label, k));
            };
            let value = if stored.get(k) == Some(v) {
                v.clone()
            } else {
                coerce(spec, v)?
            };
            out.insert(k.clone(), value);
        }
        Ok(out)
    }

    pub fn default_fields(&self) -> FieldMap {
        self.defaults
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    pub fn describe(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| {
                let (kind, extra) = match f.kind {
                    FieldKind::Text => ("text", Value::Null),
                    FieldKind::Number => ("number", Value::Null),
                    FieldKind::Date => ("date", Value::Null),
                    FieldKind::Choice(opts) => ("choice", json!(opts)),
                    FieldKind::Reference(c) => ("reference", json!(c)),
                };
                json!({
                    "name": f.name,
                    "label": f.label,
                    "kind": kind,
                    "options": if kind == "choice" { extra.clone() } else { Value::Null },
                    "collection": if kind == "reference" { extra } else { Value::Null },
                    "required": self.required.contains(&f.name),
                })
            })
            .collect();
        json!({
            "collection": self.collection,
            "label": self.label,
            "tenantScoped": self.tenant_scoped,
            "fields": fields,
            "searchFields": self.search_fields,
            "filterFields": self.filter_fields,
            "columns": self
                .export_columns
                .iter()
                .map(|c| json!({ "key": c.key, "label": c.label }))
                .collect::<Vec<_>>(),
            "foreignKeys": self
                .foreign_keys
                .iter()
                .map(|fk| {
                    json!({ "field": fk.field, "collection": fk.collection, "as": fk.as_name })
                })
                .collect::<Vec<_>>(),
        })
    }
}

fn coerce(spec: &FieldSpec, v: &Value) -> Result<Value, String> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    match spec.kind {
        FieldKind::Number => match v {
            Value::Number(_) => Ok(v.clone()),
            Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    return Ok(Value::from(i));
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("{} must be a number", spec.label))
            }
            _ => Err(format!("{} must be a number", spec.label)),
        },
        FieldKind::Choice(options) => {
            let s = v
                .as_str()
                .ok_or_else(|| format!("{} must be text", spec.label))?
                .trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            if !options.contains(&s) {
                return Err(format!(
                    "{} must be one of: {}",
                    spec.label,
                    options.join(", ")
                ));
            }
            Ok(Value::String(s.to_string()))
        }
        FieldKind::Date => {
            let s = v
                .as_str()
                .ok_or_else(|| format!("{} must be a date", spec.label))?
                .trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            if chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err()
                && chrono::DateTime::parse_from_rfc3339(s).is_err()
            {
                return Err(format!("{} must be YYYY-MM-DD", spec.label));
            }
            Ok(Value::String(s.to_string()))
        }
        FieldKind::Text | FieldKind::Reference(_) => match v {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err(format!("{} must be text", spec.label)),
        },
    }
}
