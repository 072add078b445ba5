//! Audit trail types
//!
//! Audit entries are append-only: once written they are never changed or
//! removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::ActorId;

/// Action name written when a refund is requested
pub const ACTION_REQUEST_REFUND: &str = "request_refund";

/// Action name written when a refund is confirmed
pub const ACTION_PROCESS_REFUND: &str = "process_refund";

/// Action name written when sponsor funds are deposited
pub const ACTION_DEPOSIT_FUNDS: &str = "deposit_funds";

/// Resource type used for fund transaction entries
pub const RESOURCE_FUND_TRANSACTION: &str = "fund_transaction";

/// Role the actor held when the action was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Csr,
    Admin,
    System,
}

/// A single immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: ActorId,
    pub actor_role: Option<ActorRole>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// Arbitrary context: amounts, notes, request path/method/body
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an audit entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAuditEntry {
    pub actor_id: ActorId,
    pub actor_role: Option<ActorRole>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(actor_id: &str, action: &str) -> Self {
        NewAuditEntry {
            actor_id: actor_id.to_string(),
            action: action.to_string(),
            metadata: serde_json::Value::Null,
            ..Default::default()
        }
    }

    pub fn role(mut self, role: ActorRole) -> Self {
        self.actor_role = Some(role);
        self
    }

    pub fn resource(mut self, resource_type: &str, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Filters for reading the audit trail
///
/// Unset filters match everything. `limit` falls back to the configured
/// default (100 unless overridden).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub actor_id: Option<ActorId>,
    pub action: Option<String>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// Entries about one resource
    pub fn for_resource(resource_type: &str, resource_id: impl ToString) -> Self {
        AuditQuery {
            resource_type: Some(resource_type.to_string()),
            resource_id: Some(resource_id.to_string()),
            ..Default::default()
        }
    }

    /// Entries written by one actor for one action
    pub fn for_actor_action(actor_id: &str, action: &str) -> Self {
        AuditQuery {
            actor_id: Some(actor_id.to_string()),
            action: Some(action.to_string()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an entry passes every set filter (the limit is not applied here)
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        fn accepts(filter: &Option<String>, value: Option<&str>) -> bool {
            filter
                .as_deref()
                .map_or(true, |wanted| value == Some(wanted))
        }

        accepts(&self.resource_type, entry.resource_type.as_deref())
            && accepts(&self.resource_id, entry.resource_id.as_deref())
            && accepts(&self.actor_id, Some(entry.actor_id.as_str()))
            && accepts(&self.action, Some(entry.action.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn entry() -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            actor_id: "csr-1".to_string(),
            actor_role: Some(ActorRole::Csr),
            action: ACTION_REQUEST_REFUND.to_string(),
            resource_type: Some(RESOURCE_FUND_TRANSACTION.to_string()),
            resource_id: Some("tx-1".to_string()),
            metadata: json!({ "amount": "300.00" }),
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case::empty(AuditQuery::default(), true)]
    #[case::same_resource(AuditQuery::for_resource(RESOURCE_FUND_TRANSACTION, "tx-1"), true)]
    #[case::other_resource(AuditQuery::for_resource(RESOURCE_FUND_TRANSACTION, "tx-2"), false)]
    #[case::actor_action(AuditQuery::for_actor_action("csr-1", ACTION_REQUEST_REFUND), true)]
    #[case::other_action(AuditQuery::for_actor_action("csr-1", ACTION_PROCESS_REFUND), false)]
    #[case::other_actor(AuditQuery::for_actor_action("admin-1", ACTION_REQUEST_REFUND), false)]
    fn test_query_matches(#[case] query: AuditQuery, #[case] expected: bool) {
        assert_eq!(query.matches(&entry()), expected);
    }

    #[test]
    fn test_builder_sets_resource_and_role() {
        let input = NewAuditEntry::new("admin-1", ACTION_PROCESS_REFUND)
            .role(ActorRole::Admin)
            .resource(RESOURCE_FUND_TRANSACTION, 42)
            .metadata(json!({ "note": "ok" }));

        assert_eq!(input.actor_role, Some(ActorRole::Admin));
        assert_eq!(input.resource_type.as_deref(), Some(RESOURCE_FUND_TRANSACTION));
        assert_eq!(input.resource_id.as_deref(), Some("42"));
        assert_eq!(input.metadata["note"], "ok");
    }
}
