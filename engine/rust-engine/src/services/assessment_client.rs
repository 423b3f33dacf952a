//! Collaborator seams: the assessment catalogue the engine fetches from and
//! the results service a frozen attempt is forwarded to.
//!
//! The HTTP implementations talk to the portal backend; the in-memory ones
//! back tests and headless embeddings.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::attempt::AttemptRecord;
use crate::models::question::Question;
use crate::models::score::ScoreBreakdown;
use crate::models::AssessmentManifest;

#[async_trait]
pub trait AssessmentSource: Send + Sync {
    async fn fetch_assessment(&self, assessment_id: &str) -> Result<AssessmentManifest>;

    /// Paged question loading: everything from `offset` onward, empty when
    /// the assessment has no more questions.
    async fn fetch_more_questions(
        &self,
        assessment_id: &str,
        offset: usize,
    ) -> Result<Vec<Question>>;
}

#[async_trait]
pub trait ResultsSink: Send + Sync {
    async fn submit_attempt(
        &self,
        record: &AttemptRecord,
        breakdown: &ScoreBreakdown,
    ) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct QuestionsPage {
    questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
struct SubmitAttemptRequest<'a> {
    record: &'a AttemptRecord,
    breakdown: &'a ScoreBreakdown,
}

#[derive(Debug, Deserialize)]
struct SubmitAttemptResponse {
    result_id: String,
}

pub struct HttpAssessmentSource {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAssessmentSource {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            timeout,
        }
    }
}

#[async_trait]
impl AssessmentSource for HttpAssessmentSource {
    async fn fetch_assessment(&self, assessment_id: &str) -> Result<AssessmentManifest> {
        let url = format!("{}/assessments/{}", self.base_url, assessment_id);
        tracing::debug!("Fetching assessment manifest: url={}", url);

        let response = self
            .http_client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call assessment service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Assessment service returned error {}: {}",
                status,
                error_text
            ));
        }

        let manifest: AssessmentManifest = response
            .json()
            .await
            .context("Failed to parse assessment manifest")?;

        tracing::info!(
            "Fetched assessment {}: {} questions, {}s",
            assessment_id,
            manifest.questions.len(),
            manifest.duration_seconds
        );

        Ok(manifest)
    }

    async fn fetch_more_questions(
        &self,
        assessment_id: &str,
        offset: usize,
    ) -> Result<Vec<Question>> {
        let url = format!(
            "{}/assessments/{}/questions?offset={}",
            self.base_url, assessment_id, offset
        );

        let response = self
            .http_client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call assessment service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Assessment service returned error {}: {}",
                status,
                error_text
            ));
        }

        let page: QuestionsPage = response
            .json()
            .await
            .context("Failed to parse question page")?;

        tracing::info!(
            "Fetched {} more questions for assessment {} at offset {}",
            page.questions.len(),
            assessment_id,
            offset
        );

        Ok(page.questions)
    }
}

pub struct HttpResultsSink {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpResultsSink {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            timeout,
        }
    }
}

#[async_trait]
impl ResultsSink for HttpResultsSink {
    async fn submit_attempt(
        &self,
        record: &AttemptRecord,
        breakdown: &ScoreBreakdown,
    ) -> Result<String> {
        let url = format!("{}/attempts", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&SubmitAttemptRequest { record, breakdown })
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call results service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Results service returned error {}: {}",
                status,
                error_text
            ));
        }

        let body: SubmitAttemptResponse = response
            .json()
            .await
            .context("Failed to parse results response")?;

        tracing::info!(
            "Attempt forwarded to results service: attempt={}, result={}",
            record.attempt_id,
            body.result_id
        );

        Ok(body.result_id)
    }
}

/// In-memory assessment catalogue: one manifest plus an optional extra page
/// for the paged-loading path.
pub struct StaticAssessmentSource {
    manifest: AssessmentManifest,
    additional_questions: Vec<Question>,
}

impl StaticAssessmentSource {
    pub fn new(manifest: AssessmentManifest) -> Self {
        Self {
            manifest,
            additional_questions: Vec::new(),
        }
    }

    pub fn with_additional_questions(mut self, questions: Vec<Question>) -> Self {
        self.additional_questions = questions;
        self
    }
}

#[async_trait]
impl AssessmentSource for StaticAssessmentSource {
    async fn fetch_assessment(&self, assessment_id: &str) -> Result<AssessmentManifest> {
        if assessment_id != self.manifest.assessment_id {
            return Err(anyhow!("Assessment {} not found", assessment_id));
        }
        Ok(self.manifest.clone())
    }

    async fn fetch_more_questions(
        &self,
        assessment_id: &str,
        offset: usize,
    ) -> Result<Vec<Question>> {
        if assessment_id != self.manifest.assessment_id {
            return Err(anyhow!("Assessment {} not found", assessment_id));
        }
        let skip = offset.saturating_sub(self.manifest.questions.len());
        Ok(self
            .additional_questions
            .iter()
            .skip(skip)
            .cloned()
            .collect())
    }
}

/// Collects frozen records instead of forwarding them; tests inspect what
/// was submitted.
pub struct MemoryResultsSink {
    submissions: Mutex<Vec<(AttemptRecord, ScoreBreakdown, String)>>,
}

impl MemoryResultsSink {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn submissions(&self) -> Vec<(AttemptRecord, ScoreBreakdown, String)> {
        self.submissions.lock().unwrap().clone()
    }
}

impl Default for MemoryResultsSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultsSink for MemoryResultsSink {
    async fn submit_attempt(
        &self,
        record: &AttemptRecord,
        breakdown: &ScoreBreakdown,
    ) -> Result<String> {
        let result_id = Uuid::new_v4().to_string();
        self.submissions
            .lock()
            .unwrap()
            .push((record.clone(), breakdown.clone(), result_id.clone()));
        Ok(result_id)
    }
}
