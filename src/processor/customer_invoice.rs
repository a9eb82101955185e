use tracing::{error, info};
use uuid::Uuid;

use super::common;
use crate::core::{Config, ProcessingResult, ProvodkaError};
use crate::moysklad::MoySkladClient;
use crate::{archive, commerceml};

/// End-to-end processing of a customer-invoice upload, mirroring
/// [`UpdProcessor`](super::UpdProcessor) with the CommerceML parser and the
/// customer order + счет pair on the MoySklad side.
pub struct CustomerInvoiceProcessor {
    config: Config,
    client: MoySkladClient,
}

impl CustomerInvoiceProcessor {
    pub fn new(config: Config) -> Result<Self, ProvodkaError> {
        let client = MoySkladClient::new(&config)?;
        Ok(Self { config, client })
    }

    /// Process one upload; failures become a failed [`ProcessingResult`] and
    /// temp artifacts are removed on every path.
    pub async fn process(&self, file_bytes: &[u8], filename: &str) -> ProcessingResult {
        info!(%filename, size = file_bytes.len(), "processing customer invoice upload");
        match self.run(file_bytes, filename).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, %filename, "customer invoice processing failed");
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

        let request_id = format!("invoice-{}", Uuid::new_v4());
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
        let header = commerceml::parse(&extract_dir)?;

        if !self.client.check_connection().await {
            return Err(ProvodkaError::RemoteApi(
                "MoySklad is unreachable or the API token is invalid".into(),
            ));
        }

        let outcome = self.client.create_customer_documents(&header).await?;
        let message = format!(
            "Счет покупателю № {} от {} синхронизирован: заказ {}, счет {}",
            header.number,
            header.date.format("%d.%m.%Y"),
            outcome.base_document_name,
            outcome.document_name,
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
