//! Recommendation source interface

use crate::error::ProviderError;
use crate::models::{RawRecommendation, ResourceKind};
use async_trait::async_trait;

/// Produces ranked sizing recommendations per resource kind
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// List every current recommendation for `kind`, options best first
    async fn list_recommendations(
        &self,
        kind: ResourceKind,
    ) -> Result<Vec<RawRecommendation>, ProviderError>;
}
