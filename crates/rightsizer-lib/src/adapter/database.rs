//! Managed database instance adapter

use super::{require_instance_type, suffix_after, AppliedSizing, Eligibility, ResourceAdapter};
use crate::error::ProviderError;
use crate::models::{RawRecommendation, ResourceKind, SizingValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Status in which a database instance accepts modifications
pub const AVAILABLE_STATUS: &str = "available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInstanceDescription {
    pub db_instance_id: String,
    pub instance_class: String,
    pub status: String,
}

/// Database instance mutation API
#[async_trait]
pub trait DatabaseApi: Send + Sync {
    async fn describe_db_instance(
        &self,
        db_instance_id: &str,
    ) -> Result<Option<DbInstanceDescription>, ProviderError>;

    /// Request a class change; with `apply_immediately` false the provider
    /// applies it during the next maintenance window
    async fn modify_db_instance_class(
        &self,
        db_instance_id: &str,
        instance_class: &str,
        apply_immediately: bool,
    ) -> Result<(), ProviderError>;
}

pub struct DatabaseInstanceAdapter {
    api: Arc<dyn DatabaseApi>,
}

impl DatabaseInstanceAdapter {
    pub fn new(api: Arc<dyn DatabaseApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResourceAdapter for DatabaseInstanceAdapter {
    type State = DbInstanceDescription;

    fn kind(&self) -> ResourceKind {
        ResourceKind::DatabaseInstance
    }

    /// `arn:...:db:orders-db` yields `orders-db`
    fn extract_resource_id(&self, raw: &RawRecommendation) -> Option<String> {
        suffix_after(&raw.subject, ':')
    }

    async fn describe(&self, resource_id: &str) -> Result<Option<Self::State>, ProviderError> {
        self.api.describe_db_instance(resource_id).await
    }

    fn eligibility(&self, state: &Self::State) -> Eligibility {
        if state.status == AVAILABLE_STATUS {
            Eligibility::Eligible
        } else {
            Eligibility::Blocked {
                state: state.status.clone(),
            }
        }
    }

    async fn apply_sizing(
        &self,
        resource_id: &str,
        value: &SizingValue,
        _state: &Self::State,
    ) -> Result<AppliedSizing, ProviderError> {
        let instance_class = require_instance_type(self.kind(), value)?;

        self.api
            .modify_db_instance_class(resource_id, &instance_class, false)
            .await?;
        info!(
            db_instance_id = %resource_id,
            instance_class = %instance_class,
            "Scheduled instance class change for next maintenance window"
        );

        Ok(AppliedSizing {
            value: value.clone(),
            detail: format!(
                "scheduled update for DB instance {} to {}",
                resource_id, instance_class
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SpyDatabase {
        modified: Mutex<Vec<(String, String, bool)>>,
    }

    #[async_trait]
    impl DatabaseApi for SpyDatabase {
        async fn describe_db_instance(
            &self,
            db_instance_id: &str,
        ) -> Result<Option<DbInstanceDescription>, ProviderError> {
            Ok(Some(db(db_instance_id, AVAILABLE_STATUS)))
        }

        async fn modify_db_instance_class(
            &self,
            db_instance_id: &str,
            instance_class: &str,
            apply_immediately: bool,
        ) -> Result<(), ProviderError> {
            self.modified.lock().unwrap().push((
                db_instance_id.to_string(),
                instance_class.to_string(),
                apply_immediately,
            ));
            Ok(())
        }
    }

    fn db(id: &str, status: &str) -> DbInstanceDescription {
        DbInstanceDescription {
            db_instance_id: id.to_string(),
            instance_class: "db.t3.medium".to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_extract_id_from_arn() {
        let adapter = DatabaseInstanceAdapter::new(Arc::new(SpyDatabase::default()));
        let raw = RawRecommendation {
            subject: "arn:aws:rds:us-east-1:123456789012:db:db-1".to_string(),
            current_value: SizingValue::InstanceType("db.t3.medium".to_string()),
            ranked_options: vec![],
        };
        assert_eq!(adapter.extract_resource_id(&raw), Some("db-1".to_string()));
    }

    #[test]
    fn test_only_available_instances_are_eligible() {
        let adapter = DatabaseInstanceAdapter::new(Arc::new(SpyDatabase::default()));

        assert!(adapter.is_eligible(&db("db-1", "available")));
        assert_eq!(
            adapter.eligibility(&db("db-1", "backing-up")),
            Eligibility::Blocked {
                state: "backing-up".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_apply_defers_to_maintenance_window() {
        let spy = Arc::new(SpyDatabase::default());
        let adapter = DatabaseInstanceAdapter::new(spy.clone());

        let applied = adapter
            .apply_sizing(
                "db-1",
                &SizingValue::InstanceType("db.t3.large".to_string()),
                &db("db-1", AVAILABLE_STATUS),
            )
            .await
            .unwrap();

        assert!(applied.detail.contains("scheduled"));
        assert_eq!(
            *spy.modified.lock().unwrap(),
            vec![("db-1".to_string(), "db.t3.large".to_string(), false)]
        );
    }
}
