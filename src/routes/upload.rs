use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::AppError;
use crate::services::upload::{normalize_payload, ImageUploader, PayloadError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/uploadImage", web::post().to(upload_image));
}

#[derive(Debug, Deserialize)]
struct UploadInput {
    image: Option<String>,
}

async fn upload_image(
    uploader: web::Data<ImageUploader>,
    data: web::Json<UploadInput>,
) -> Result<HttpResponse, AppError> {
    let image = data.image.as_deref().unwrap_or_default();
    let payload = normalize_payload(image).map_err(|e| match e {
        PayloadError::Empty => AppError::bad_request("Image data is required"),
        PayloadError::NotBase64 => AppError::bad_request("Image must be valid base64 data"),
    })?;

    let url = uploader.upload(&payload).await?;
    log::info!("Image uploaded to {url}");
    Ok(HttpResponse::Ok().json(url))
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_app;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::json;

    #[actix_web::test]
    async fn missing_image_is_rejected() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::post()
            .uri("/api/uploadImage")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Image data is required");
    }

    #[actix_web::test]
    async fn non_base64_payload_is_rejected() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::post()
            .uri("/api/uploadImage")
            .set_json(json!({ "image": "data:image/png;base64,@@not base64@@" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unconfigured_host_is_a_server_error() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::post()
            .uri("/api/uploadImage")
            .set_json(json!({ "image": "data:image/png;base64,aGVsbG8=" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Image upload failed");
    }
}
