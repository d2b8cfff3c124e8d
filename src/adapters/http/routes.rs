use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, rejection::FormRejection, Form, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::adapters::http::{
    error::{user_message, ApiError},
    pages,
    state::HttpState,
};
use crate::application::dto::{ErrorResponse, HealthResponse, PredictResponse, ThresholdsSavedResponse};
use crate::domain::{
    errors::{DomainError, DomainResult},
    thresholds::ThresholdUpdate,
    upload::{MAX_UPLOAD_BYTES, NO_FILE_MESSAGE},
};

/// Extrae el campo `file` de un formulario multipart.
async fn read_upload(multipart: Result<Multipart, MultipartRejection>) -> DomainResult<(String, Vec<u8>)> {
    let mut multipart = multipart.map_err(|e| DomainError::InvalidInput(format!("Invalid upload: {e}")))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DomainError::InvalidInput(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DomainError::InvalidInput(format!("Invalid upload: {e}")))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(DomainError::InvalidInput("File too large (max 16MB)".into()));
        }
        return Ok((name, bytes.to_vec()));
    }
    Err(DomainError::InvalidInput(NO_FILE_MESSAGE.into()))
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::ok())
}

pub async fn index() -> impl IntoResponse {
    Html(pages::index(None))
}

/// Subida desde la página: cualquier fallo se muestra como mensaje en la propia página.
pub async fn upload_page(
    State(st): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let outcome = match read_upload(multipart).await {
        Ok((name, bytes)) => st.diagnosis.diagnose_upload(&name, bytes, "/").await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(d) => Html(pages::result(&d)),
        Err(e) => Html(pages::index(Some(&user_message(&e)))),
    }
}

pub async fn api_predict(
    State(st): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let (name, bytes) = read_upload(multipart).await?;
    let diagnosis = st.diagnosis.diagnose_upload(&name, bytes, "/api/predict").await?;
    Ok(Json(diagnosis.into()))
}

pub async fn admin_page(State(st): State<HttpState>) -> impl IntoResponse {
    let cfg = st.thresholds.current().await;
    Html(pages::admin(&cfg, None, None))
}

pub async fn admin_submit(
    State(st): State<HttpState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> impl IntoResponse {
    let result = match form {
        Ok(Form(fields)) => match ThresholdUpdate::from_form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))) {
            Ok(update) => st.thresholds.update(update).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(DomainError::InvalidInput(e.to_string())),
    };
    match result {
        Ok(cfg) => Html(pages::admin(&cfg, Some("Saved"), None)),
        Err(e) => {
            let cfg = st.thresholds.current().await;
            Html(pages::admin(&cfg, None, Some(&user_message(&e))))
        }
    }
}

pub async fn get_thresholds(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.thresholds.current().await)
}

pub async fn set_thresholds(State(st): State<HttpState>, body: Bytes) -> impl IntoResponse {
    let no_body = || {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "No JSON body provided".into(),
            }),
        )
            .into_response()
    };

    if body.iter().all(u8::is_ascii_whitespace) {
        return no_body();
    }
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return ApiError(DomainError::InvalidInput(format!("Invalid JSON body: {e}"))).into_response();
        }
    };
    if value.is_null() || value.as_object().is_some_and(|o| o.is_empty()) {
        return no_body();
    }

    let update = match ThresholdUpdate::from_json(&value) {
        Ok(u) => u,
        Err(e) => return ApiError(e).into_response(),
    };
    match st.thresholds.update(update).await {
        Ok(cfg) => Json(ThresholdsSavedResponse::from(cfg)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn preview(State(st): State<HttpState>, Path(filename): Path<String>) -> impl IntoResponse {
    match st.preview.ensure_mask(&filename).await {
        Ok(mask) => Html(pages::preview(&filename, &mask)).into_response(),
        Err(DomainError::NotFound(_)) => (StatusCode::NOT_FOUND, "File not found").into_response(),
        // Como el resto de páginas HTML: 200 con el mensaje.
        Err(e) => {
            tracing::warn!("Vista previa de {filename} fallida: {e}");
            Html(pages::index(Some(&user_message(&e)))).into_response()
        }
    }
}
