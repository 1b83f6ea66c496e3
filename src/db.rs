use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

use crate::config::Config;
use crate::models::{Cart, Coupon, Otp, Review, User};

pub const USERS: &str = "users";
pub const PRODUCTS: &str = "products";
pub const REVIEWS: &str = "reviews";
pub const BANNERS: &str = "banners";
pub const HEROES: &str = "heroes";
pub const CARTS: &str = "carts";
pub const ORDERS: &str = "orders";
pub const COUPONS: &str = "coupons";
pub const DEALS: &str = "deals";
pub const OTPS: &str = "otps";

pub async fn connect(config: &Config) -> mongodb::error::Result<Database> {
    let mut client_options = ClientOptions::parse(&config.database_url).await?;
    client_options.app_name = Some("jewelry-store".to_string());

    let client = Client::with_options(client_options)?;
    Ok(client.database(&config.database_name))
}

/// Creates the indexes the handlers rely on. Safe to run on every start.
pub async fn ensure_indexes(db: &Database) -> mongodb::error::Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<User>(USERS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    db.collection::<Coupon>(COUPONS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "code": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    db.collection::<Cart>(CARTS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    db.collection::<Review>(REVIEWS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "productId": 1, "userId": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    // Expired codes are also rejected by verify-otp; the TTL index only keeps the collection small.
    db.collection::<Otp>(OTPS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "expiresAt": 1 })
                .options(
                    IndexOptions::builder()
                        .expire_after(std::time::Duration::from_secs(0))
                        .build(),
                )
                .build(),
            None,
        )
        .await?;

    log::info!("MongoDB indexes are in place");
    Ok(())
}
