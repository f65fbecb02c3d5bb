use std::future::Future;

use anyhow::Result;
use serde::de::DeserializeOwned;
use st_domain::{PaginatedResponse, PaginationInput};
use tracing::trace;

/// Pages through a `{data, meta}` endpoint until `meta.total` is covered,
/// starting at page 1 with a 20-row limit.
pub async fn fetch_all_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    F: FnMut(PaginationInput) -> Fut,
    Fut: Future<Output = Result<PaginatedResponse<T>>>,
{
    let mut current = PaginationInput::default();
    let mut all_data = Vec::new();
    let mut total_pages = 1;

    while current.page <= total_pages {
        let response = fetch_page(current).await?;
        total_pages = (response.meta.total as f32 / response.meta.limit as f32).ceil() as u32;
        trace!("downloaded page {} of {total_pages}", current.page);
        all_data.extend(response.data);
        current.page += 1;
    }

    Ok(all_data)
}
