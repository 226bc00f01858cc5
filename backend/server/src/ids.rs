//! Short, URL-safe identifiers for restaurants and reviews.
//!
//! A random v4 UUID rendered as unpadded URL-safe base64: 22 characters from
//! `[A-Za-z0-9_-]`, so ids never contain the key separator.
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use uuid::Uuid;

pub fn new_id() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}
