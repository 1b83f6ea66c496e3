use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::require_text;
use crate::error::AppError;

pub const MAX_HERO_IMAGES: usize = 4;

pub fn check_hero_images(images: &[String]) -> Result<(), AppError> {
    if images.len() > MAX_HERO_IMAGES {
        return Err(AppError::bad_request(format!(
            "Maximum {MAX_HERO_IMAGES} images allowed"
        )));
    }
    Ok(())
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub video_url: String,
    pub is_active: bool,
    pub order: i32,
    pub author: ObjectId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBanner {
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub author: String,
}

impl NewBanner {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.title, "Title")?;
        require_text(&self.video_url, "Video URL")
    }

    pub fn into_banner(self, author: ObjectId) -> Banner {
        let now = DateTime::now();
        Banner {
            id: ObjectId::new(),
            title: self.title,
            description: self.description,
            video_url: self.video_url,
            is_active: self.is_active,
            order: self.order,
            author,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl BannerPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            require_text(title, "Title")?;
        }
        if let Some(video_url) = &self.video_url {
            require_text(video_url, "Video URL")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hero {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub order: i32,
    pub author: ObjectId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHero {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub author: String,
}

impl NewHero {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.title, "Title")?;
        check_hero_images(&self.images)
    }

    pub fn into_hero(self, author: ObjectId) -> Hero {
        let now = DateTime::now();
        Hero {
            id: ObjectId::new(),
            title: self.title,
            subtitle: self.subtitle,
            description: self.description,
            images: self.images,
            is_active: self.is_active,
            order: self.order,
            author,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl HeroPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        match &self.images {
            Some(images) => check_hero_images(images),
            None => Ok(()),
        }
    }
}
