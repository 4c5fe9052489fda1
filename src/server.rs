//! HTTP surface: `POST /api/convert` and `GET /health`.

use crate::config::UploadLimits;
use crate::converter::Converter;
use crate::types::*;
use actix_multipart::Multipart;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse, ResponseError};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ResponseError for ConversionError {
    fn status_code(&self) -> StatusCode {
        match self {
            ConversionError::MissingInput | ConversionError::UnsupportedFormat { .. } => {
                StatusCode::BAD_REQUEST
            }
            ConversionError::SizeLimit { .. } | ConversionError::TooManyFiles { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("❌ Conversion failed: {}", self);
        } else {
            log::warn!("Rejected conversion request: {}", self);
        }
        HttpResponse::build(status).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

/// Raw multipart form before validation.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<Bytes>,
    pub format: Option<String>,
}

/// Registers the conversion routes. The app must provide
/// `web::Data<Converter>` and `web::Data<UploadLimits>`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/convert", web::post().to(convert));
}

async fn health(limits: web::Data<UploadLimits>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "convertly",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": {
            "input_formats": ["PNG", "JPEG", "WebP"],
            "output_formats": TargetFormat::ALL,
            "pdf_page_sources": ["PNG", "JPEG"]
        },
        "limits": limits.get_ref(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn convert(
    payload: Multipart,
    converter: web::Data<Converter>,
    limits: web::Data<UploadLimits>,
) -> Result<HttpResponse, ConversionError> {
    let request_id = Uuid::new_v4();

    let form = read_form(payload, &limits).await?;
    log::info!(
        "🚀 [{}] Conversion request: {} file(s), format {:?}",
        request_id,
        form.files.len(),
        form.format
    );

    let request = ConversionRequest::new(form.files, form.format.as_deref())?;
    let converter = converter.into_inner();
    let result = web::block(move || converter.convert(&request))
        .await
        .map_err(|e| ConversionError::Blocking(e.to_string()))??;

    log::info!(
        "✅ [{}] Returning {} ({} bytes)",
        request_id,
        result.file_name(),
        result.content.len()
    );

    Ok(HttpResponse::Ok()
        .content_type(result.mime_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", result.file_name()),
        ))
        .body(result.content))
}

/// Collects every `file` part and the first `format` part; anything else
/// is drained and dropped.
pub async fn read_form(
    mut payload: Multipart,
    limits: &UploadLimits,
) -> Result<UploadForm, ConversionError> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ConversionError::Multipart(e.to_string()))?;
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_owned();

        if name == FILE_FIELD && form.files.len() >= limits.max_files {
            return Err(ConversionError::TooManyFiles {
                limit: limits.max_files,
            });
        }

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ConversionError::Multipart(e.to_string()))?;
            if data.len() + chunk.len() > limits.max_file_size {
                return Err(ConversionError::SizeLimit {
                    actual: (data.len() + chunk.len()) as u64,
                    limit: limits.max_file_size as u64,
                });
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            FILE_FIELD => form.files.push(data.freeze()),
            FORMAT_FIELD if form.format.is_none() => {
                form.format = Some(String::from_utf8_lossy(&data).into_owned());
            }
            other => log::debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(form)
}
