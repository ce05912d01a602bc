//! Enrollment calculation job of the applicants service.

use crate::api::{ApiClient, Service};
use crate::error::ApiError;
use crate::task::poller::JobBackend;
use crate::task::status::{StartResponse, StatusResponse, TaskHandle, TaskStatus};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const CALCULATE_PATH: &str = "/applicants/enrollment/calculate";
const STATUS_PATH: &str = "/applicants/enrollment/status";
const DOWNLOAD_PATH: &str = "/applicants/enrollment/download";

/// Server-side enrollment calculation, driven through the applicants service.
#[derive(Debug, Clone)]
pub struct EnrollmentJob {
    client: ApiClient,
}

impl EnrollmentJob {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Download the spreadsheet produced by a completed calculation into
    /// `dest_dir` and return the written path.
    ///
    /// `artifact` is either the `file_path` reported by the job or a bare file
    /// name. A partially written file is removed on failure.
    pub async fn download(&self, artifact: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let filename = artifact_file_name(artifact)?;
        let path = format!("{}/{}", DOWNLOAD_PATH, filename);

        let response = self
            .client
            .get_stream(Service::Applicants, &path, "Failed to download file")
            .await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(filename);

        match write_body(response, &target).await {
            Ok(bytes) => {
                info!("Downloaded {} ({} bytes)", target.display(), bytes);
                Ok(target)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&target).await {
                    warn!("Failed to remove partial download {}: {}", target.display(), cleanup);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl JobBackend for EnrollmentJob {
    async fn start(&self) -> Result<TaskHandle, ApiError> {
        let response: StartResponse = self
            .client
            .post_json(
                Service::Applicants,
                CALCULATE_PATH,
                None,
                "Failed to start enrollment calculation",
            )
            .await?;

        if response.task_id.is_empty() {
            return Err(ApiError::Decode("start response has an empty task_id".to_string()));
        }
        if let Some(ref message) = response.message {
            debug!("Start response: {}", message);
        }

        Ok(TaskHandle::new(response.task_id))
    }

    async fn status(&self, task: &TaskHandle) -> Result<TaskStatus, ApiError> {
        let path = format!("{}/{}", STATUS_PATH, task.id());
        let response: StatusResponse = self
            .client
            .get_json(
                Service::Applicants,
                &path,
                "Failed to get enrollment status",
            )
            .await?;
        Ok(response.into())
    }
}

/// File name part of an artifact reference (`/uploads/enrollment/x.xlsx` -> `x.xlsx`).
pub fn artifact_file_name(artifact: &str) -> Result<&str, ApiError> {
    let name = artifact.rsplit('/').next().unwrap_or("");
    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        return Err(ApiError::InvalidArtifact(artifact.to_string()));
    }
    Ok(name)
}

async fn write_body(response: reqwest::Response, target: &Path) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(target).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}
