//! Insights service
//!
//! Ties a [`SurveyStore`] to the aggregation passes. Every call fetches a
//! fresh snapshot; nothing is cached between calls. Only the `recompute_*`
//! operations write, and only the client's recommended-category list.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::{resolve_all, resolve_client, AnswerTallies, Recommendation, SurveyTally};
use crate::clients::{answer_sheet, list_clients, AnswerSheet, ClientFilter, ClientSummary};
use crate::config::AgeBucketScheme;
use crate::error::{InsightsError, Result};
use crate::model::{ClientId, SurveyId};
use crate::snapshot::{load_snapshot, Snapshot};
use crate::statistics::StatisticsReport;
use crate::store::SurveyStore;

/// Outcome of a bulk recompute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeSummary {
    pub clients: usize,
    pub updated: usize,
    /// Clients that disappeared between the snapshot and the write
    pub vanished: Vec<ClientId>,
    /// Clients whose write-back failed
    pub failed: Vec<ClientId>,
    pub skipped_answers: usize,
    pub unresolved_answers: usize,
}

#[derive(Clone)]
pub struct InsightsService {
    store: Arc<dyn SurveyStore>,
    scheme: AgeBucketScheme,
}

impl InsightsService {
    pub fn new(store: Arc<dyn SurveyStore>, scheme: AgeBucketScheme) -> Self {
        Self { store, scheme }
    }

    pub fn scheme(&self) -> &AgeBucketScheme {
        &self.scheme
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        load_snapshot(self.store.as_ref()).await
    }

    // ── Reads ──

    pub async fn statistics(&self) -> Result<StatisticsReport> {
        let snapshot = self.snapshot().await?;
        Ok(StatisticsReport::build(&snapshot, &self.scheme))
    }

    pub async fn completed_surveys(&self) -> Result<BTreeMap<SurveyId, bool>> {
        let snapshot = self.snapshot().await?;
        Ok(crate::analytics::completed_surveys(&snapshot))
    }

    pub async fn survey_statistics(&self, survey_id: &SurveyId) -> Result<SurveyTally> {
        let snapshot = self.snapshot().await?;
        AnswerTallies::build(&snapshot)
            .for_survey(&snapshot, survey_id)
            .ok_or_else(|| InsightsError::NotFound {
                entity: "Survey",
                id: survey_id.to_string(),
            })
    }

    pub async fn clients(&self, filter: &ClientFilter) -> Result<Vec<ClientSummary>> {
        let snapshot = self.snapshot().await?;
        Ok(list_clients(&snapshot, &self.scheme, filter))
    }

    pub async fn answer_sheet(&self, client_id: &ClientId) -> Result<AnswerSheet> {
        let snapshot = self.snapshot().await?;
        answer_sheet(&snapshot, client_id)
            .ok_or_else(|| InsightsError::client_not_found(client_id.as_str()))
    }

    // ── Write-back ──

    /// Resolve one client and persist the ranked category list
    pub async fn recompute_client(&self, client_id: &ClientId) -> Result<Recommendation> {
        let snapshot = self.snapshot().await?;
        let client = snapshot
            .client(client_id)
            .ok_or_else(|| InsightsError::client_not_found(client_id.as_str()))?;

        let recommendation = resolve_client(&snapshot, client);
        let saved = self
            .store
            .save_client_recommendations(client_id, &recommendation.category_ids())
            .await
            .map_err(|source| InsightsError::WriteBack {
                client_id: client_id.to_string(),
                source,
            })?;
        if !saved {
            return Err(InsightsError::client_not_found(client_id.as_str()));
        }

        info!(
            "Recomputed recommendations for client {}: {} categories, {} skipped",
            client_id,
            recommendation.categories.len(),
            recommendation.skipped.len()
        );
        Ok(recommendation)
    }

    /// Resolve and persist every client. A failed write is recorded and the
    /// batch carries on.
    pub async fn recompute_all(&self) -> Result<RecomputeSummary> {
        let snapshot = self.snapshot().await?;
        let mut summary = RecomputeSummary {
            clients: snapshot.clients.len(),
            ..Default::default()
        };

        for recommendation in resolve_all(&snapshot) {
            summary.skipped_answers += recommendation.skipped.len();
            summary.unresolved_answers += recommendation.unresolved_count();

            match self
                .store
                .save_client_recommendations(&recommendation.client_id, &recommendation.category_ids())
                .await
            {
                Ok(true) => summary.updated += 1,
                Ok(false) => summary.vanished.push(recommendation.client_id),
                Err(e) => {
                    warn!(
                        "Failed to save recommendations for client {}: {:#}",
                        recommendation.client_id, e
                    );
                    summary.failed.push(recommendation.client_id);
                }
            }
        }

        info!(
            "Recomputed recommendations: {} of {} clients updated, {} failed",
            summary.updated,
            summary.clients,
            summary.failed.len()
        );
        Ok(summary)
    }
}
