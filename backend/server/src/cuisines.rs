use futures_util::future::join_all;

use crate::{
    error::AppError,
    keys::{cuisine_key, cuisines_key, restaurant_key},
    models::FIELD_NAME,
    store::Store,
};

/// Every cuisine any restaurant has registered, alphabetically.
pub async fn list_cuisines(store: &dyn Store) -> Result<Vec<String>, AppError> {
    let mut cuisines = store.smembers(&cuisines_key()).await?;
    cuisines.sort();

    Ok(cuisines)
}

/// Names of the restaurants serving `cuisine`. Ids without a record are skipped.
pub async fn restaurants_by_cuisine(store: &dyn Store, cuisine: &str) -> Result<Vec<String>, AppError> {
    let ids = store.smembers(&cuisine_key(&cuisine.trim().to_lowercase())).await?;

    let names = join_all(
        ids.iter()
            .map(|id| async move { store.hget(&restaurant_key(id), FIELD_NAME).await }),
    )
    .await;

    let mut restaurants = Vec::with_capacity(names.len());
    for name in names {
        restaurants.extend(name?);
    }
    restaurants.sort();

    Ok(restaurants)
}
