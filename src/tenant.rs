//! Resolved tenant identity passed into every core operation.
//!
//! Authentication happens upstream; the core only ever sees a tenant id that
//! an external identity resolver already validated. Passing the context
//! explicitly keeps the pipeline free of hidden coupling to the auth layer.

/// Identity of the organization a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// Opaque organization identifier supplied by the identity resolver.
    pub org_id: String,
}

impl TenantContext {
    /// Wrap a pre-resolved organization id, rejecting blank input.
    pub fn new(org_id: impl Into<String>) -> Option<Self> {
        let org_id = org_id.into();
        let trimmed = org_id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                org_id: trimmed.to_string(),
            })
        }
    }
}
