use tracing::{error, info};
use uuid::Uuid;

use super::common;
use crate::core::{Config, ProcessingResult, ProvodkaError};
use crate::moysklad::MoySkladClient;
use crate::{archive, upd};

/// End-to-end processing of a УПД upload: validate → save temp file →
/// extract → parse → reconcile with MoySklad → create documents → cleanup.
pub struct UpdProcessor {
    config: Config,
    client: MoySkladClient,
}

impl UpdProcessor {
    pub fn new(config: Config) -> Result<Self, ProvodkaError> {
        let client = MoySkladClient::new(&config)?;
        Ok(Self { config, client })
    }

    /// Process one upload. Never returns an error: every failure is folded
    /// into a [`ProcessingResult`], and temp artifacts are cleaned up on
    /// every path.
    pub async fn process(&self, file_bytes: &[u8], filename: &str) -> ProcessingResult {
        info!(%filename, size = file_bytes.len(), "processing УПД upload");
        match self.run(file_bytes, filename).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, %filename, "УПД processing failed");
                ProcessingResult::failure(&e)
            }
        }
    }

    async fn run(
        &self,
        file_bytes: &[u8],
        filename: &str,
    ) -> Result<ProcessingResult, ProvodkaError> {
        common::validate_upload(file_bytes, filename, self.config.max_file_size)?;

        let request_id = format!("upd-{}", Uuid::new_v4());
        let temp_zip = common::save_temp_file(&self.config.temp_dir, &request_id, file_bytes)?;
        let extract_dir = self.config.temp_dir.join(&request_id);

        let outcome = self.ingest(file_bytes, &request_id).await;

        common::remove_temp_file(&temp_zip);
        common::remove_extraction_dir(&extract_dir);
        outcome
    }

    async fn ingest(
        &self,
        file_bytes: &[u8],
        request_id: &str,
    ) -> Result<ProcessingResult, ProvodkaError> {
        let extract_dir = archive::extract(file_bytes, &self.config.temp_dir, request_id)?;
        let document = upd::parse(&extract_dir)?;

        if !self.client.check_connection().await {
            return Err(ProvodkaError::RemoteApi(
                "MoySklad is unreachable or the API token is invalid".into(),
            ));
        }

        let header = &document.header;
        let outcome = self.client.create_upd_documents(&document).await?;
        let message = format!(
            "УПД № {} от {} синхронизирован: счет-фактура {}, отгрузка {}",
            header.number,
            header.date.format("%d.%m.%Y"),
            outcome.document_name,
            outcome.base_document_name,
        );
        Ok(ProcessingResult::success(
            outcome.document_id,
            Some(outcome.document_url),
            message,
            outcome.stats,
        ))
    }

    /// Reachability probe for the bot's status command.
    pub async fn check_remote_connection(&self) -> bool {
        self.client.check_connection().await
    }
}
