//! Ids of everything a run created, for best-effort teardown.

use client::{ApiSession, Exchange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown resource kind: {name}")]
    UnknownKind { name: String },

    #[error("Created {kind} has no id field: {body}")]
    MissingId { kind: ResourceKind, body: String },
}

/// Entity collections a scenario may create on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    DeletedInvoice,
    Invoice,
    RawMaterial,
    LocalProduct,
    MaterialPricing,
    InventoryItem,
    Customer,
    Supplier,
    Backup,
}

impl ResourceKind {
    /// Dependents come before what they reference.
    pub const TEARDOWN_ORDER: [ResourceKind; 9] = [
        ResourceKind::DeletedInvoice,
        ResourceKind::Invoice,
        ResourceKind::RawMaterial,
        ResourceKind::LocalProduct,
        ResourceKind::MaterialPricing,
        ResourceKind::InventoryItem,
        ResourceKind::Customer,
        ResourceKind::Supplier,
        ResourceKind::Backup,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::DeletedInvoice => "/deleted-invoices",
            ResourceKind::Invoice => "/invoices",
            ResourceKind::RawMaterial => "/raw-materials",
            ResourceKind::LocalProduct => "/local-products",
            ResourceKind::MaterialPricing => "/material-pricing",
            ResourceKind::InventoryItem => "/inventory",
            ResourceKind::Customer => "/customers",
            ResourceKind::Supplier => "/suppliers",
            ResourceKind::Backup => "/backup",
        }
    }

    /// Field of the create response that carries the new id.
    pub fn id_field(&self) -> &'static str {
        match self {
            ResourceKind::Backup => "backup_id",
            _ => "id",
        }
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection(), id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::DeletedInvoice => "deleted-invoice",
            ResourceKind::Invoice => "invoice",
            ResourceKind::RawMaterial => "raw-material",
            ResourceKind::LocalProduct => "local-product",
            ResourceKind::MaterialPricing => "material-pricing",
            ResourceKind::InventoryItem => "inventory-item",
            ResourceKind::Customer => "customer",
            ResourceKind::Supplier => "supplier",
            ResourceKind::Backup => "backup",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::TEARDOWN_ORDER
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| RegistryError::UnknownKind {
                name: s.to_string(),
            })
    }
}

/// What teardown did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub attempted: usize,
    pub deleted: usize,
    /// `kind/id: reason` for each delete that did not succeed.
    pub failed: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CreatedResources {
    ids: Mutex<BTreeMap<ResourceKind, Vec<String>>>,
}

impl CreatedResources {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ResourceKind, Vec<String>>> {
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, kind: ResourceKind, id: impl Into<String>) {
        let id = id.into();
        debug!(%kind, %id, "registered for teardown");
        self.lock().entry(kind).or_default().push(id);
    }

    /// Registers the id found in a create response body and returns it.
    pub fn register_from(&self, kind: ResourceKind, body: &Value) -> Result<String, RegistryError> {
        let id = body
            .get(kind.id_field())
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RegistryError::MissingId {
                kind,
                body: body.to_string(),
            })?
            .to_string();
        self.register(kind, id.clone());
        Ok(id)
    }

    /// Drops an id that a scenario already deleted itself.
    pub fn forget(&self, kind: ResourceKind, id: &str) {
        if let Some(ids) = self.lock().get_mut(&kind) {
            ids.retain(|known| known != id);
        }
    }

    pub fn ids(&self, kind: ResourceKind) -> Vec<String> {
        self.lock().get(&kind).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes every registered id once, dependents first.
    ///
    /// The registry is drained before the first delete, so calling this again
    /// does nothing. A 404 counts as deleted: the entity is gone either way.
    pub async fn cleanup(&self, session: &ApiSession) -> CleanupReport {
        let drained = std::mem::take(&mut *self.lock());
        let mut report = CleanupReport::default();

        for kind in ResourceKind::TEARDOWN_ORDER {
            let Some(ids) = drained.get(&kind) else {
                continue;
            };
            for id in ids {
                report.attempted += 1;
                match session.delete(kind.item_path(id)).await {
                    Exchange::Responded(response)
                        if response.is_success() || response.status == 404 =>
                    {
                        report.deleted += 1;
                    }
                    other => {
                        warn!("Cleanup of {} {} failed: {}", kind, id, other.summary());
                        report.failed.push(format!("{}/{}: {}", kind, id, other.summary()));
                    }
                }
            }
        }

        info!(
            "Cleanup finished: {}/{} deleted",
            report.deleted, report.attempted
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use client::{ApiRequest, ApiResponse, ClientError, ClientResult, Method, ResponseBody, Transport};
    use serde_json::json;
    use std::sync::Arc;

    /// Records every request; answers 500 for ids starting with "bad".
    #[derive(Default)]
    struct DeleteLog {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for DeleteLog {
        async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
            assert_eq!(request.method, Method::Delete);
            self.seen.lock().unwrap().push(request.path.clone());
            if request.path.ends_with("/down") {
                return Err(ClientError::Connect {
                    url: request.path,
                });
            }
            let status = if request.path.contains("/bad") { 500 } else { 200 };
            Ok(ApiResponse::new(status, ResponseBody::Json(json!({"message": "ok"}))))
        }

        fn base_url(&self) -> &str {
            "mock://api"
        }

        fn transport_name(&self) -> &'static str {
            "delete-log"
        }
    }

    #[test]
    fn test_register_from_body() {
        let created = CreatedResources::new();
        let id = created
            .register_from(ResourceKind::Customer, &json!({"id": "c-1", "name": "X"}))
            .unwrap();
        assert_eq!(id, "c-1");

        let id = created
            .register_from(ResourceKind::Backup, &json!({"backup_id": "b-1", "status": "in_progress"}))
            .unwrap();
        assert_eq!(id, "b-1");

        let err = created
            .register_from(ResourceKind::Invoice, &json!({"id": ""}))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingId { kind: ResourceKind::Invoice, .. }));
        assert_eq!(created.len(), 2);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ResourceKind::TEARDOWN_ORDER {
            assert_eq!(kind.name().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("widget".parse::<ResourceKind>().is_err());
        assert_eq!(ResourceKind::Backup.item_path("b-1"), "/backup/b-1");
    }

    #[test]
    fn test_forget() {
        let created = CreatedResources::new();
        created.register(ResourceKind::Customer, "c-1");
        created.register(ResourceKind::Customer, "c-2");
        created.forget(ResourceKind::Customer, "c-1");
        assert_eq!(created.ids(ResourceKind::Customer), vec!["c-2".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_attempts_each_id_once_in_dependency_order() {
        let transport = Arc::new(DeleteLog::default());
        let session = ApiSession::new(transport.clone());
        let created = CreatedResources::new();

        created.register(ResourceKind::Customer, "c-1");
        created.register(ResourceKind::InventoryItem, "bad-item");
        created.register(ResourceKind::RawMaterial, "down");
        created.register(ResourceKind::Invoice, "i-1");
        created.register(ResourceKind::Customer, "c-2");

        let report = created.cleanup(&session).await;

        let seen = transport.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "/invoices/i-1",
                "/raw-materials/down",
                "/inventory/bad-item",
                "/customers/c-1",
                "/customers/c-2",
            ]
        );
        assert_eq!(report.attempted, 5);
        assert_eq!(report.deleted, 3);
        assert_eq!(report.failed.len(), 2);
        assert!(!report.is_clean());
        assert!(created.is_empty());

        let again = created.cleanup(&session).await;
        assert_eq!(again.attempted, 0);
        assert_eq!(transport.seen.lock().unwrap().len(), 5);
    }
}
