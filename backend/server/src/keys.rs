//! # Keys
//!
//! Every record lives in one shared Redis namespace. Keys are built as
//! `redisRestaurant:<kind>:<id>` so the kind segment keeps entity types apart.
//!
//! | kind | type | holds |
//! |---|---|---|
//! | `restaurants:{id}` | hash | restaurant fields |
//! | `reviews:{restaurant id}` | list | review ids, newest first |
//! | `review_details:{review id}` | hash | review fields |
//! | `cuisines` | set | every cuisine name |
//! | `cuisine:{name}` | set | restaurant ids |
//! | `restaurant_cuisines:{id}` | set | cuisine names |
//! | `restaurants_by_rating` | sorted set | restaurant id scored by avgStars |
//! | `weather:{id}` | string + TTL | cached provider payload |
//! | `restaurant_details:{id}` | JSON document | links and contact |

pub const KEY_PREFIX: &str = "redisRestaurant";
pub const KEY_SEPARATOR: &str = ":";

pub fn key_name(segments: &[&str]) -> String {
    let mut key = String::from(KEY_PREFIX);

    for segment in segments {
        key.push_str(KEY_SEPARATOR);
        key.push_str(segment);
    }

    key
}

pub fn restaurant_key(id: &str) -> String {
    key_name(&["restaurants", id])
}

pub fn reviews_key(restaurant_id: &str) -> String {
    key_name(&["reviews", restaurant_id])
}

pub fn review_details_key(review_id: &str) -> String {
    key_name(&["review_details", review_id])
}

pub fn cuisines_key() -> String {
    key_name(&["cuisines"])
}

pub fn cuisine_key(name: &str) -> String {
    key_name(&["cuisine", name])
}

pub fn restaurant_cuisines_key(id: &str) -> String {
    key_name(&["restaurant_cuisines", id])
}

pub fn restaurants_by_rating_key() -> String {
    key_name(&["restaurants_by_rating"])
}

pub fn weather_key(id: &str) -> String {
    key_name(&["weather", id])
}

pub fn restaurant_details_key(id: &str) -> String {
    key_name(&["restaurant_details", id])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn joins_segments_under_prefix() {
        assert_eq!(key_name(&["restaurants", "abc"]), "redisRestaurant:restaurants:abc");
        assert_eq!(cuisines_key(), "redisRestaurant:cuisines");
    }

    #[test]
    fn same_id_never_collides_across_kinds() {
        let id = "abc123";
        let keys = [
            restaurant_key(id),
            reviews_key(id),
            review_details_key(id),
            cuisine_key(id),
            restaurant_cuisines_key(id),
            weather_key(id),
            restaurant_details_key(id),
            cuisines_key(),
            restaurants_by_rating_key(),
        ];

        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }
}
