// src/handlers.rs
use crate::{AppState, errors::ScamGuardError, models::*};
use actix_multipart::{Field, Multipart};
use actix_web::{Error, HttpRequest, HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use log::{info, warn};
use uuid::Uuid;

pub const SESSION_HEADER: &str = "X-Session-Id";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/scan", web::post().to(scan))
            .route("/scan/upload", web::post().to(scan_upload))
            .route("/invoice", web::post().to(check_invoice))
            .route("/language-scan", web::post().to(language_scan))
            .route("/analysis/{analysis_id}", web::get().to(get_analysis))
            .route("/history", web::get().to(get_history))
            .route("/history", web::delete().to(clear_history)),
    )
    .route("/health", web::get().to(health_check));
}

fn session_id(req: &HttpRequest) -> Result<Option<Uuid>, ScamGuardError> {
    match req.headers().get(SESSION_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Some)
            .ok_or_else(|| {
                ScamGuardError::Validation(format!("{} must be a UUID", SESSION_HEADER))
            }),
    }
}

fn required_session_id(req: &HttpRequest) -> Result<Uuid, ScamGuardError> {
    session_id(req)?.ok_or_else(|| {
        ScamGuardError::Validation(format!("{} header is required", SESSION_HEADER))
    })
}

async fn record_scan(
    data: &AppState,
    session: Option<Uuid>,
    analysis: ScamAnalysis,
) -> Result<HttpResponse, ScamGuardError> {
    let session_id = session.unwrap_or_else(Uuid::new_v4);

    data.store.store_analysis(&analysis).await?;
    if let Err(e) = data
        .store
        .push_history(&session_id, &analysis.history_item(), data.history_limit)
        .await
    {
        // History is best-effort once the analysis is stored.
        warn!(
            "Failed to record history for session {}: {}",
            session_id, e
        );
    }

    info!(
        "Recorded {:?} scan {} for session {}",
        analysis.content_type, analysis.id, session_id
    );

    Ok(HttpResponse::Ok()
        .insert_header((SESSION_HEADER, session_id.to_string()))
        .json(ScanResponse {
            session_id,
            analysis,
        }))
}

pub async fn scan(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<ScanRequest>,
) -> Result<HttpResponse, Error> {
    let session = session_id(&req)?;
    let body = body.into_inner();

    let image = match body.image.as_deref().filter(|i| !i.trim().is_empty()) {
        Some(encoded) => {
            let raw = data.media_processor.decode_base64(encoded)?;
            Some(data.media_processor.prepare(&raw, false)?)
        }
        None => None,
    };

    let analysis = data
        .analyzer
        .analyze(AnalysisRequest::message(body.text, image))
        .await?;

    Ok(record_scan(&data, session, analysis).await?)
}

pub async fn scan_upload(
    req: HttpRequest,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = session_id(&req)?;
    let mut text = None;
    let mut image = None;

    while let Some(mut field) = payload.try_next().await? {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();

        match name.as_str() {
            "text" => {
                let raw = read_field(&mut field, data.max_upload_bytes).await?;
                let value = String::from_utf8(raw).map_err(|_| {
                    ScamGuardError::Validation("Text field must be valid UTF-8".to_string())
                })?;
                text = Some(value);
            }
            "image" => {
                let raw = read_field(&mut field, data.max_upload_bytes).await?;
                if !raw.is_empty() {
                    image = Some(data.media_processor.prepare(&raw, false)?);
                }
            }
            other => {
                warn!("Ignoring unexpected multipart field '{}'", other);
                read_field(&mut field, data.max_upload_bytes).await?;
            }
        }
    }

    let analysis = data
        .analyzer
        .analyze(AnalysisRequest::message(text, image))
        .await?;

    Ok(record_scan(&data, session, analysis).await?)
}

pub async fn check_invoice(
    req: HttpRequest,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = session_id(&req)?;
    let mut document = None;

    while let Some(mut field) = payload.try_next().await? {
        let raw = read_field(&mut field, data.max_upload_bytes).await?;
        if field.content_disposition().get_name() == Some("file") && !raw.is_empty() {
            document = Some(data.media_processor.prepare(&raw, true)?);
        }
    }

    let document = document.ok_or_else(|| {
        ScamGuardError::Validation("No content provided for analysis.".to_string())
    })?;

    let analysis = data
        .analyzer
        .analyze(AnalysisRequest::invoice(document))
        .await?;

    Ok(record_scan(&data, session, analysis).await?)
}

pub async fn language_scan(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<LanguageScanRequest>,
) -> Result<HttpResponse, Error> {
    let session = session_id(&req)?;
    let body = body.into_inner();

    if body.text.trim().is_empty() {
        return Err(
            ScamGuardError::Validation("No content provided for analysis.".to_string()).into(),
        );
    }

    // "Auto Detect" is what the language picker sends when nothing is chosen.
    let source_language = body
        .source_language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("auto detect"));

    let analysis = data
        .analyzer
        .analyze_multilingual(body.text, source_language)
        .await?;

    Ok(record_scan(&data, session, analysis).await?)
}

pub async fn get_analysis(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let analysis_id = path.into_inner();
    let analysis = data.store.get_analysis(&analysis_id).await?;

    Ok(HttpResponse::Ok().json(&analysis))
}

pub async fn get_history(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = required_session_id(&req)?;
    let items = data.store.history(&session_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "items": items,
        "count": items.len()
    })))
}

pub async fn clear_history(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = required_session_id(&req)?;
    data.store.clear_history(&session_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "scamguard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, Error> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.try_next().await? {
        if buf.len() + chunk.len() > limit {
            return Err(ScamGuardError::MediaProcessing(format!(
                "Upload exceeds the {} byte limit",
                limit
            ))
            .into());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.to_vec())
}
