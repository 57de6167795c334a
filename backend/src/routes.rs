use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::rt::time::timeout;
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{HealthResponse, HealthStatus, PredictionResponse};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::inference::{calculate_result, preprocess, InferenceError, ModelHandle};

const FILE_FIELD: &str = "file";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(handle_predict)))
        .service(web::resource("/api/predict").route(web::post().to(handle_predict)))
        .service(
            web::resource("/health")
                .route(web::get().to(health))
                .route(web::post().to(health)),
        );
}

async fn handle_predict(
    model: web::Data<ModelHandle>,
    config: web::Data<AppConfig>,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let request_id = Uuid::new_v4();

    match predict(request_id, &model, &config, payload).await {
        Ok(result) => {
            info!(
                "[{}] Prediction: {} ({:.4})",
                request_id, result.prediction, result.confidence
            );
            Ok(HttpResponse::Ok().json(result))
        }
        Err(e @ PredictError::Processing(_)) | Err(e @ PredictError::ModelUnavailable) => {
            error!("[{}] Prediction failed: {}", request_id, e);
            if config.expose_error_details {
                Err(e)
            } else {
                Err(e.sanitized())
            }
        }
        Err(e) => {
            warn!("[{}] Rejected upload: {}", request_id, e);
            Err(e)
        }
    }
}

async fn predict(
    request_id: Uuid,
    model: &ModelHandle,
    config: &AppConfig,
    payload: Multipart,
) -> Result<PredictionResponse, PredictError> {
    let classifier = model.classifier().ok_or(PredictError::ModelUnavailable)?;

    let image_data = read_upload(payload, config.max_upload_bytes).await?;
    info!("[{}] Received image of {} bytes", request_id, image_data.len());

    let job = web::block(move || -> Result<f32, PredictError> {
        let tensor = preprocess(&image_data)?;
        info!("[{}] Processed image shape: {:?}", request_id, tensor.shape());
        let score = classifier.infer(&tensor)?;
        info!("[{}] Raw model output: {}", request_id, score);
        if !score.is_finite() {
            return Err(InferenceError::Runtime(format!(
                "Model returned a non-finite score: {score}"
            ))
            .into());
        }
        Ok(score)
    });

    let score = match timeout(config.inference_timeout, job).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => return Err(PredictError::Processing(e.to_string())),
        Err(_) => {
            return Err(PredictError::Processing(format!(
                "Inference timed out after {}s",
                config.inference_timeout.as_secs_f32()
            )));
        }
    };

    Ok(calculate_result(score))
}

/// Buffers the first `file` part that carries a filename. Other parts are
/// drained and ignored.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, PredictError> {
    while let Some(mut field) = payload.try_next().await.map_err(intake_error)? {
        let filename = field
            .content_disposition()
            .filter(|cd| cd.get_name() == Some(FILE_FIELD))
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        match filename {
            Some(name) if name.is_empty() => return Err(PredictError::EmptyFilename),
            Some(_) => return read_field(&mut field, max_bytes).await,
            None => drain_field(&mut field).await?,
        }
    }

    Err(PredictError::MissingFilePart)
}

async fn read_field(field: &mut Field, max_bytes: usize) -> Result<Vec<u8>, PredictError> {
    let mut image_data = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(intake_error)? {
        if image_data.len() + chunk.len() > max_bytes {
            return Err(PredictError::UploadTooLarge);
        }
        image_data.extend_from_slice(&chunk);
    }
    Ok(image_data)
}

async fn drain_field(field: &mut Field) -> Result<(), PredictError> {
    while field.try_next().await.map_err(intake_error)?.is_some() {}
    Ok(())
}

/// A request that is not multipart at all simply has no file part.
fn intake_error(err: MultipartError) -> PredictError {
    match err {
        MultipartError::ContentTypeMissing
        | MultipartError::ContentTypeParse
        | MultipartError::ContentTypeIncompatible => PredictError::MissingFilePart,
        other => PredictError::MalformedUpload(other.to_string()),
    }
}

async fn health(model: web::Data<ModelHandle>) -> HttpResponse {
    let status = if model.is_loaded() {
        HealthStatus::Ok
    } else {
        HealthStatus::ModelNotLoaded
    };
    HttpResponse::Ok().json(HealthResponse { status })
}
