/// Organization every tenant-scoped read and write is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub organization_id: String,
    pub user_id: Option<String>,
}

impl TenantContext {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: None,
        }
    }
}
