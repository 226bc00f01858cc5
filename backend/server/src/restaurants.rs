//! # Restaurants
//!
//! ## Storage
//! - Hash per restaurant: id, name, location, viewCount, totalStars, avgStars
//! - Cuisine membership kept symmetric across three sets: the global cuisine
//!   set, `cuisine:{name}` (ids) and `restaurant_cuisines:{id}` (names)
//! - Ranking: sorted set of ids scored by avgStars, seeded at 0 on creation
//!
//! ## Consistency
//! Creation fans out every write at once and waits for all of them. They are
//! not a transaction: if one fails the rest still land and nothing is rolled
//! back. The first error is returned after every write has settled.
use futures_util::future::join_all;
use tracing::info;

use crate::{
    error::AppError::{self, NotFound},
    guards::require_restaurant,
    ids::new_id,
    keys::{
        cuisine_key, cuisines_key, restaurant_cuisines_key, restaurant_details_key,
        restaurant_key, restaurants_by_rating_key,
    },
    models::{
        FIELD_ID, FIELD_LOCATION, FIELD_NAME, FIELD_VIEW_COUNT, NewRestaurant, PageQuery,
        Restaurant, RestaurantDetails,
    },
    store::{Store, StoreError, StoreResult},
    utils::page_window,
};

pub async fn create_restaurant(store: &dyn Store, restaurant: NewRestaurant) -> Result<String, AppError> {
    let id = new_id();
    let key = restaurant_key(&id);
    let ranking_key = restaurants_by_rating_key();

    let fields = [
        (FIELD_ID, id.clone()),
        (FIELD_NAME, restaurant.name),
        (FIELD_LOCATION, restaurant.location),
    ];

    let cuisine_writes = restaurant
        .cuisines
        .iter()
        .map(|cuisine| register_cuisine(store, &id, cuisine));

    let (hash, cuisines, ranking) = tokio::join!(
        store.hset(&key, &fields),
        join_all(cuisine_writes),
        store.zadd(&ranking_key, &id, 0.0),
    );

    hash?;
    cuisines.into_iter().collect::<StoreResult<()>>()?;
    ranking?;

    info!(restaurant_id = %id, "Restaurant created");
    Ok(id)
}

async fn register_cuisine(store: &dyn Store, restaurant_id: &str, cuisine: &str) -> StoreResult<()> {
    let all_key = cuisines_key();
    let members_key = cuisine_key(cuisine);
    let own_key = restaurant_cuisines_key(restaurant_id);

    let (all, members, own) = tokio::join!(
        store.sadd(&all_key, cuisine),
        store.sadd(&members_key, restaurant_id),
        store.sadd(&own_key, cuisine),
    );

    all?;
    members?;
    own?;
    Ok(())
}

/// Reads a restaurant and bumps its view counter.
///
/// The increment and the read run concurrently, so `viewCount` may or may not
/// include this visit.
pub async fn get_restaurant(store: &dyn Store, restaurant_id: Option<&str>) -> Result<Restaurant, AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;
    let key = restaurant_key(restaurant_id);
    let own_cuisines_key = restaurant_cuisines_key(restaurant_id);

    let (views, fields, cuisines) = tokio::join!(
        store.hincr(&key, FIELD_VIEW_COUNT, 1),
        store.hgetall(&key),
        store.smembers(&own_cuisines_key),
    );

    views?;
    let mut restaurant = Restaurant::from_fields(&key, fields?)?
        .ok_or_else(|| NotFound("Restaurant not found".into()))?;

    let mut cuisines = cuisines?;
    cuisines.sort();
    restaurant.cuisines = Some(cuisines);

    Ok(restaurant)
}

/// One page of the rating ranking, best first.
pub async fn list_restaurants(
    store: &dyn Store,
    query: PageQuery,
    max_limit: u64,
) -> Result<Vec<Restaurant>, AppError> {
    let (start, stop) = page_window(query, max_limit)?;
    let ids = store.zrevrange(&restaurants_by_rating_key(), start, stop).await?;

    let records = join_all(ids.iter().map(|id| load_restaurant(store, id))).await;

    let mut restaurants = Vec::with_capacity(records.len());
    for record in records {
        if let Some(restaurant) = record? {
            restaurants.push(restaurant);
        }
    }

    Ok(restaurants)
}

async fn load_restaurant(store: &dyn Store, id: &str) -> StoreResult<Option<Restaurant>> {
    let key = restaurant_key(id);
    Restaurant::from_fields(&key, store.hgetall(&key).await?)
}

pub async fn set_details(
    store: &dyn Store,
    restaurant_id: Option<&str>,
    details: &RestaurantDetails,
) -> Result<(), AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;

    let document = serde_json::to_value(details).map_err(StoreError::from)?;
    store.json_set(&restaurant_details_key(restaurant_id), &document).await?;

    info!(restaurant_id, "Restaurant details saved");
    Ok(())
}

pub async fn get_details(
    store: &dyn Store,
    restaurant_id: Option<&str>,
) -> Result<RestaurantDetails, AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;

    let document = store
        .json_get(&restaurant_details_key(restaurant_id))
        .await?
        .ok_or_else(|| NotFound("Restaurant details not found".into()))?;

    Ok(serde_json::from_value(document).map_err(StoreError::from)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::{
        memory::MemoryStore,
        models::{Contact, Link},
    };

    fn cafe(name: &str, cuisines: &[&str]) -> NewRestaurant {
        NewRestaurant {
            name: name.into(),
            location: "-74,40".into(),
            cuisines: cuisines.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn created_restaurant_reads_back() {
        let store = MemoryStore::new();
        let id = create_restaurant(&store, cafe("Cafe A", &["italian", "pizza"]))
            .await
            .unwrap();

        let restaurant = get_restaurant(&store, Some(id.as_str())).await.unwrap();

        assert_eq!(restaurant.id, id);
        assert_eq!(restaurant.name, "Cafe A");
        assert_eq!(restaurant.location, "-74,40");
        assert_eq!(
            restaurant.cuisines,
            Some(vec!["italian".to_string(), "pizza".to_string()])
        );
        assert_eq!(
            store.zscore(&restaurants_by_rating_key(), &id).await.unwrap(),
            Some(0.0)
        );
    }

    #[tokio::test]
    async fn cuisine_membership_is_symmetric() {
        let store = MemoryStore::new();
        let id = create_restaurant(&store, cafe("Cafe A", &["thai"])).await.unwrap();

        assert_eq!(store.smembers(&cuisine_key("thai")).await.unwrap(), [id.clone()]);
        assert_eq!(
            store.smembers(&restaurant_cuisines_key(&id)).await.unwrap(),
            ["thai"]
        );
        assert_eq!(store.smembers(&cuisines_key()).await.unwrap(), ["thai"]);
    }

    #[tokio::test]
    async fn every_read_counts_a_view() {
        let store = MemoryStore::new();
        let id = create_restaurant(&store, cafe("Cafe A", &["thai"])).await.unwrap();

        get_restaurant(&store, Some(id.as_str())).await.unwrap();
        get_restaurant(&store, Some(id.as_str())).await.unwrap();

        let views = store.hget(&restaurant_key(&id), FIELD_VIEW_COUNT).await.unwrap();
        assert_eq!(views.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn unknown_restaurant_is_not_found() {
        let store = MemoryStore::new();

        let result = get_restaurant(&store, Some("missing")).await;
        assert!(matches!(result, Err(NotFound(_))));
        assert!(!store.exists(&restaurant_key("missing")).await.unwrap());
    }

    #[tokio::test]
    async fn details_require_the_restaurant() {
        let store = MemoryStore::new();
        let details = RestaurantDetails {
            links: vec![Link {
                name: "menu".into(),
                url: "https://example.com/menu".into(),
            }],
            contact: Contact {
                phone: "555-0100".into(),
                email: "hello@example.com".into(),
            },
        };

        assert!(matches!(
            set_details(&store, Some("missing"), &details).await,
            Err(NotFound(_))
        ));

        let id = create_restaurant(&store, cafe("Cafe A", &["thai"])).await.unwrap();
        assert!(matches!(get_details(&store, Some(id.as_str())).await, Err(NotFound(_))));

        set_details(&store, Some(id.as_str()), &details).await.unwrap();
        assert_eq!(get_details(&store, Some(id.as_str())).await.unwrap(), details);
    }

    fn seed_ranking(scores: &[f64]) -> (MemoryStore, Vec<String>) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let store = MemoryStore::new();

        let ids = runtime.block_on(async {
            let mut ids = Vec::new();
            for score in scores {
                let id = create_restaurant(&store, cafe("Cafe", &["any"])).await.unwrap();
                store.zadd(&restaurants_by_rating_key(), &id, *score).await.unwrap();
                ids.push(id);
            }
            ids
        });

        (store, ids)
    }

    proptest! {
        #[test]
        fn pages_cover_the_ranking_exactly_once(
            scores in prop::collection::vec(0u8..=50, 0..40),
            limit in 1u64..8,
        ) {
            let scores: Vec<f64> = scores.into_iter().map(|s| f64::from(s) / 10.0).collect();
            let (store, ids) = seed_ranking(&scores);
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            let full = runtime
                .block_on(store.zrevrange(&restaurants_by_rating_key(), 0, -1))
                .unwrap();

            let mut paged = Vec::new();
            for page in 1.. {
                let query = PageQuery { page: Some(page), limit: Some(limit) };
                let restaurants = runtime.block_on(list_restaurants(&store, query, 100)).unwrap();
                if restaurants.is_empty() {
                    break;
                }
                paged.extend(restaurants.into_iter().map(|r| r.id));
            }

            prop_assert_eq!(&paged, &full);
            prop_assert_eq!(paged.len(), ids.len());

            let score_of: HashMap<&String, f64> = ids.iter().zip(scores.iter().copied()).collect();
            for pair in paged.windows(2) {
                prop_assert!(score_of[&pair[0]] >= score_of[&pair[1]]);
            }
        }
    }
}
