use futures_river::{BoxError, CoordinatorConfig, OperationHandle, River};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn fetch_page(page: u32) -> Result<String, BoxError> {
  // Uneven latencies so pages finish out of order.
  let delay = 100 + (page * 37) % 400;
  tokio::time::sleep(Duration::from_millis(delay as u64)).await;
  Ok(format!("page {} ({} ms)", page, delay))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  let total_pages = 12u32;
  let window = 3;
  info!("--- Sliding Window Example (window: {}, pages: {}) ---", window, total_pages);

  let mut river = River::new(CoordinatorConfig::new("page_fetcher").with_maximum_capacity(window))?;
  river.set_call_count_to_indicate_full(total_pages as u64);
  let token = CancellationToken::new();

  for page in 0..total_pages {
    let full = river.submit(OperationHandle::spawn(fetch_page(page)), page)?;
    if full {
      for (body, page) in river.drain(&token).await? {
        info!("Received page {}: {}", page, body);
      }
    }
  }

  assert!(river.is_empty());
  info!("--- Sliding Window Example End ---");
  Ok(())
}
