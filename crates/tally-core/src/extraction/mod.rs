//! Receipt extraction through a vision-capable chat-completions endpoint.
//!
//! [`ReceiptService`] is the entry point. It owns the configuration and an
//! [`ExtractionClient`], and turns every call into an [`ExtractionOutcome`]:
//! failures never escape as errors, they come back with `success == false`.

pub mod client;
pub mod context;
pub mod prompt;

pub use client::{ChatTransport, Extraction, ExtractionClient, HttpTransport, RawResponse};
pub use context::CallContext;
pub use prompt::build_extraction_prompt;

use tracing::{debug, info, warn};

use crate::error::{Result, TallyError, ValidationFailure};
use crate::image::{
    detect_mime_type, detect_mime_type_from_bytes, encode_base64, is_data_uri, to_data_uri,
    validate,
};
use crate::models::config::{API_KEY_ENV, ConfigPatch, ServiceConfig};
use crate::models::outcome::{ExtractionHints, ExtractionOutcome, ExtractionRequest, ImageInput};

/// Extraction service bound to one configuration.
#[derive(Debug)]
pub struct ReceiptService<T = HttpTransport> {
    config: ServiceConfig,
    client: ExtractionClient<T>,
}

impl ReceiptService<HttpTransport> {
    /// Create a service talking to the configured HTTPS endpoint.
    ///
    /// Unset fields take their defaults. Fails when no API key is configured
    /// and `OPENAI_API_KEY` is unset.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let config = config.with_defaults();
        let api_key = config.resolve_api_key().ok_or_else(|| {
            TallyError::Config(format!(
                "API key is required; set api_key in the configuration or {API_KEY_ENV}"
            ))
        })?;
        let client = ExtractionClient::from_config(&config, api_key)?;
        Ok(Self { config, client })
    }
}

impl<T: ChatTransport> ReceiptService<T> {
    /// Create a service over a custom transport.
    pub fn with_transport(config: ServiceConfig, transport: T) -> Self {
        let config = config.with_defaults();
        let client = ExtractionClient::with_transport(transport, &config);
        Self { config, client }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn client(&self) -> &ExtractionClient<T> {
        &self.client
    }

    /// Apply the present fields of `patch`.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<()> {
        let merged = self.config.merge(patch);
        self.client.reconfigure(&merged)?;
        self.config = merged;
        debug!("Configuration updated: model={}", self.config.vision_model);
        Ok(())
    }

    /// Extract a receipt described by `request`.
    pub async fn extract(&self, ctx: &CallContext, request: &ExtractionRequest) -> ExtractionOutcome {
        if request.image.is_empty() {
            let failure = ValidationFailure::new("image_data", "image data or URL is required");
            warn!("Rejected extraction request: {}", failure);
            return ExtractionOutcome::rejected(&failure);
        }

        let image_url = match &request.image {
            ImageInput::Url(url) => url.trim().to_string(),
            ImageInput::Base64(data) if is_data_uri(data) => data.clone(),
            ImageInput::Base64(data) => {
                let mime_type = detect_mime_type(data);
                debug!("Detected MIME type {} for base64 payload", mime_type);
                to_data_uri(data, mime_type)
            }
        };

        let prompt = build_extraction_prompt(request, &self.config);
        info!(
            "Extracting receipt with {} ({})",
            self.config.vision_model,
            match request.image {
                ImageInput::Url(_) => "url",
                ImageInput::Base64(_) => "base64",
            }
        );

        match self.client.extract(ctx, &image_url, &prompt).await {
            Ok(Extraction { record, raw_text }) => {
                info!(
                    "Extracted receipt: store={:?}, total={:.2} {}, {} items",
                    record.store_name,
                    record.total_amount,
                    record.currency,
                    record.items.len()
                );
                ExtractionOutcome::succeeded(record, raw_text)
            }
            Err(e) => {
                warn!("Receipt extraction failed: {}", e);
                ExtractionOutcome::failed(&e)
            }
        }
    }

    /// Extract from a base64 payload or `data:` URI.
    pub async fn extract_from_base64(
        &self,
        ctx: &CallContext,
        data: &str,
        hints: &ExtractionHints,
    ) -> ExtractionOutcome {
        let request = ExtractionRequest::new(ImageInput::Base64(data.to_string())).with_hints(hints);
        self.extract(ctx, &request).await
    }

    /// Extract from an image URL the endpoint can fetch.
    pub async fn extract_from_url(
        &self,
        ctx: &CallContext,
        url: &str,
        hints: &ExtractionHints,
    ) -> ExtractionOutcome {
        let request = ExtractionRequest::new(ImageInput::Url(url.to_string())).with_hints(hints);
        self.extract(ctx, &request).await
    }

    /// Extract from either a URL or a base64 payload.
    pub async fn extract_from_source(
        &self,
        ctx: &CallContext,
        source: &str,
        hints: &ExtractionHints,
    ) -> ExtractionOutcome {
        let request = ExtractionRequest::new(ImageInput::from_source(source)).with_hints(hints);
        self.extract(ctx, &request).await
    }

    /// Validate raw image bytes, then extract from them.
    pub async fn extract_from_bytes(
        &self,
        ctx: &CallContext,
        bytes: &[u8],
        hints: &ExtractionHints,
    ) -> ExtractionOutcome {
        if let Err(failure) = validate(bytes) {
            warn!("Image rejected: {}", failure);
            return ExtractionOutcome::rejected(&failure);
        }

        let mime_type = detect_mime_type_from_bytes(bytes);
        debug!("Encoding {} bytes of {}", bytes.len(), mime_type);
        let data_uri = to_data_uri(&encode_base64(bytes), mime_type);

        self.extract_from_base64(ctx, &data_uri, hints).await
    }
}
