use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use serde_json::json;

use crate::config::Config;
use crate::error::{is_duplicate_key, AppError};
use crate::json::documents_to_json;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{
    parse_object_id, require_text, EditProfileInput, LoginInput, Otp, RegisterInput, Role,
    RoleUpdate, SendOtpInput, User, VerifyOtpInput,
};
use crate::services::auth::{
    generate_otp, hash_password, issue_token, verify_password, SESSION_COOKIE,
};
use crate::services::email::EmailService;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/send-otp", web::post().to(send_otp))
            .route("/verify-otp", web::post().to(verify_otp))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/users", web::get().to(list_users))
            .route("/users/{id}", web::delete().to(delete_user))
            .route("/users/{id}", web::put().to(update_user_role))
            .route("/edit-profile", web::patch().to(edit_profile)),
    );
}

async fn register(
    users: web::Data<Collection<User>>,
    data: web::Json<RegisterInput>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;
    let email = normalize_email(&data.email);

    if users.find_one(doc! { "email": email.as_str() }, None).await?.is_some() {
        return Err(AppError::bad_request("Email already registered"));
    }

    let now = DateTime::now();
    let user = User {
        id: ObjectId::new(),
        email,
        password: hash_password(&data.password)?,
        username: data.username.trim().to_string(),
        role: Role::User,
        profile_image: None,
        bio: None,
        profession: None,
        created_at: now,
        updated_at: now,
    };

    match users.insert_one(&user, None).await {
        Ok(_) => {
            log::info!("Registered user {}", user.id);
            Ok(HttpResponse::Created().json(json!({ "message": "User registered successfully" })))
        }
        // lost a race with a concurrent registration
        Err(e) if is_duplicate_key(&e) => Err(AppError::bad_request("Email already registered")),
        Err(e) => Err(e.into()),
    }
}

async fn send_otp(
    otps: web::Data<Collection<Otp>>,
    email_service: web::Data<EmailService>,
    data: web::Json<SendOtpInput>,
) -> Result<HttpResponse, AppError> {
    require_text(&data.email, "Email")?;
    let email = normalize_email(&data.email);

    let otp = Otp::issue(&email, generate_otp(), DateTime::now());
    // only the latest code for an address is valid
    otps.delete_many(doc! { "email": email.as_str() }, None).await?;
    otps.insert_one(&otp, None).await?;

    email_service.send_otp(&email, &otp.otp).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "OTP sent successfully" })))
}

async fn verify_otp(
    otps: web::Data<Collection<Otp>>,
    data: web::Json<VerifyOtpInput>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&data.email);
    let filter = doc! { "email": email.as_str(), "otp": data.otp.trim() };

    let record = otps.find_one(filter, None).await?;
    let record = match record {
        Some(record) if record.is_valid_at(DateTime::now()) => record,
        _ => return Err(AppError::bad_request("Invalid or expired OTP")),
    };

    // The delete is the single-use gate: of two concurrent verifications only one removes the row.
    let deleted = otps.delete_one(doc! { "_id": record.id }, None).await?;
    if deleted.deleted_count == 0 {
        return Err(AppError::bad_request("Invalid or expired OTP"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "OTP verified successfully" })))
}

async fn login(
    users: web::Data<Collection<User>>,
    config: web::Data<Config>,
    data: web::Json<LoginInput>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&data.email);
    let user = users
        .find_one(doc! { "email": email.as_str() }, None)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if !verify_password(&user.password, &data.password) {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = issue_token(&user.id.to_hex(), user.role, &config.jwt_secret)?;
    let cookie = Cookie::build(SESSION_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::hours(1))
        .secure(config.cookie_secure)
        .same_site(if config.cookie_secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .finish();

    Ok(HttpResponse::Ok().cookie(cookie).json(json!({
        "message": "Logged in successfully",
        "token": token,
        "user": user.public_json(),
    })))
}

async fn logout() -> HttpResponse {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "message": "Logged out successfully" }))
}

async fn list_users(
    users: web::Data<Collection<User>>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let options = FindOptions::builder()
        .projection(doc! { "_id": 1, "email": 1, "role": 1 })
        .sort(doc! { "createdAt": -1 })
        .build();
    let docs: Vec<Document> = users
        .clone_with_type::<Document>()
        .find(None, options)
        .await?
        .try_collect()
        .await?;

    Ok(HttpResponse::Ok().json(documents_to_json(docs)))
}

async fn delete_user(
    users: web::Data<Collection<User>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "user")?;
    let result = users.delete_one(doc! { "_id": id }, None).await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("User not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted successfully" })))
}

async fn update_user_role(
    users: web::Data<Collection<User>>,
    _admin: AdminUser,
    id: web::Path<String>,
    data: web::Json<RoleUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "user")?;
    let role = mongodb::bson::to_bson(&data.role)?;
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let user = users
        .find_one_and_update(
            doc! { "_id": id },
            doc! { "$set": { "role": role, "updatedAt": DateTime::now() } },
            options,
        )
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "User role updated successfully",
        "user": user.public_json(),
    })))
}

async fn edit_profile(
    users: web::Data<Collection<User>>,
    caller: AuthUser,
    data: web::Json<EditProfileInput>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    let user_id = data
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("User ID is required"))?;
    let id = parse_object_id(user_id, "user")?;
    caller.ensure_owner_or_admin(&id.to_hex())?;

    let mut fields = doc! { "updatedAt": DateTime::now() };
    if let Some(username) = data.username {
        require_text(&username, "Username")?;
        fields.insert("username", username.trim());
    }
    if let Some(profile_image) = data.profile_image {
        fields.insert("profileImage", profile_image);
    }
    if let Some(bio) = data.bio {
        fields.insert("bio", bio);
    }
    if let Some(profession) = data.profession {
        fields.insert("profession", profession);
    }

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let user = users
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": fields }, options)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "user": user.public_json(),
    })))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin_cookie, test_app, user_cookie};
    use actix_web::http::StatusCode;
    use actix_web::test;

    #[actix_web::test]
    async fn register_requires_all_fields() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": "", "password": "x", "username": "y" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn logout_clears_the_cookie() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .expect("removal cookie");
        assert_eq!(cookie.value(), "");
    }

    #[actix_web::test]
    async fn user_admin_routes_need_admin() {
        let app = test::init_service(test_app().await).await;

        let req = test::TestRequest::get().uri("/api/auth/users").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/auth/users")
            .cookie(user_cookie(&ObjectId::new().to_hex()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn role_update_rejects_unknown_roles() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::put()
            .uri(&format!("/api/auth/users/{}", ObjectId::new().to_hex()))
            .cookie(admin_cookie())
            .set_json(json!({ "role": "owner" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn edit_profile_checks_the_caller() {
        let app = test::init_service(test_app().await).await;
        let me = ObjectId::new().to_hex();

        let req = test::TestRequest::patch()
            .uri("/api/auth/edit-profile")
            .cookie(user_cookie(&me))
            .set_json(json!({ "bio": "hello" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::patch()
            .uri("/api/auth/edit-profile")
            .cookie(user_cookie(&me))
            .set_json(json!({ "userId": ObjectId::new().to_hex(), "bio": "hello" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
