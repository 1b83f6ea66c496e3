//! Rendering of stored documents as API JSON.
//!
//! Documents go through BSON first so every model renders the same way:
//! ObjectIds become hex strings and datetimes become RFC 3339 strings instead
//! of MongoDB extended JSON wrappers.

use mongodb::bson::{self, Bson, Document};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    Ok(bson_to_json(bson::to_bson(value)?))
}

pub fn documents_to_json(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(|d| bson_to_json(Bson::Document(d))).collect())
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::Document(doc) => Value::Object(
            doc.into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect::<Map<String, Value>>(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};

    #[test]
    fn object_ids_and_dates_render_as_strings() {
        let id = ObjectId::new();
        let created = DateTime::from_millis(0);
        let value = bson_to_json(Bson::Document(doc! {
            "_id": id,
            "createdAt": created,
            "price": 12.5,
            "images": ["a.jpg", "b.jpg"],
            "author": { "_id": id, "email": "a@b.c" },
        }));

        assert_eq!(value["_id"], Value::String(id.to_hex()));
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
        assert_eq!(value["price"], 12.5);
        assert_eq!(value["images"][1], "b.jpg");
        assert_eq!(value["author"]["_id"], Value::String(id.to_hex()));
    }

    #[test]
    fn integers_stay_numbers() {
        let value = bson_to_json(Bson::Document(doc! { "order": 3_i32, "total": 10_i64 }));
        assert_eq!(value["order"], 3);
        assert_eq!(value["total"], 10);
    }
}
