use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::require_text;
use crate::error::AppError;

pub const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    /// Profile fields safe to return to clients; never includes the password hash.
    pub fn public_json(&self) -> Value {
        json!({
            "_id": self.id.to_hex(),
            "email": self.email,
            "username": self.username,
            "role": self.role,
            "profileImage": self.profile_image,
            "bio": self.bio,
            "profession": self.profession,
        })
    }
}

// JWT claims carried in the session cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl RegisterInput {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.email, "Email")?;
        if !self.email.contains('@') {
            return Err(AppError::bad_request("Invalid email address"));
        }
        require_text(&self.password, "Password")?;
        require_text(&self.username, "Username")
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditProfileInput {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub profession: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Otp {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub otp: String,
    pub expires_at: DateTime,
    pub created_at: DateTime,
}

impl Otp {
    pub fn issue(email: &str, code: String, now: DateTime) -> Self {
        let ttl_millis = OTP_TTL_MINUTES * 60 * 1000;
        Otp {
            id: ObjectId::new(),
            email: email.to_string(),
            otp: code,
            expires_at: DateTime::from_millis(now.timestamp_millis() + ttl_millis),
            created_at: now,
        }
    }

    pub fn is_valid_at(&self, now: DateTime) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
pub struct SendOtpInput {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpInput {
    pub email: String,
    pub otp: String,
}
