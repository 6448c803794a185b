use futures_river::{BoxError, CoordinatorConfig, CoordinatorError, OperationError, OperationHandle, River};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,futures_river=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

fn river(name: &str, maximum_capacity: usize) -> River<OperationHandle<u32>, &'static str> {
  River::new(CoordinatorConfig::new(name).with_maximum_capacity(maximum_capacity)).unwrap()
}

fn delayed(value: u32, delay_ms: u64) -> OperationHandle<u32> {
  OperationHandle::spawn(async move {
    sleep(Duration::from_millis(delay_ms)).await;
    Ok::<_, BoxError>(value)
  })
}

fn never() -> OperationHandle<u32> {
  OperationHandle::spawn(std::future::pending::<Result<u32, BoxError>>())
}

#[tokio::test]
async fn test_drain_harvests_finished_and_keeps_blocked_tracked() {
  setup_tracing_for_test();
  let mut river = river("river_keeps_blocked", 2);
  let token = CancellationToken::new();

  river.submit(never(), "blocked").unwrap();
  assert!(river.submit(OperationHandle::completed(Ok(2)), "done").unwrap());

  let harvested = timeout(Duration::from_secs(2), river.drain(&token))
    .await
    .expect("drain must return once the first operation is done")
    .unwrap();
  assert_eq!(harvested, vec![(2, "done")]);
  assert_eq!(river.len(), 1);
  let tracked: Vec<&str> = river.list_all().map(|(_, metadata)| *metadata).collect();
  assert_eq!(tracked, vec!["blocked"]);
}

#[tokio::test]
async fn test_cancelled_drain_abandons_everything() {
  setup_tracing_for_test();
  let mut river = river("river_cancelled", 2);
  let token = CancellationToken::new();

  river.submit(never(), "blocked").unwrap();
  river.submit(OperationHandle::completed(Ok(2)), "done").unwrap();
  token.cancel();

  let result = river.drain(&token).await;
  assert!(matches!(result, Err(CoordinatorError::DrainCancelled)));
  assert!(result.unwrap_err().is_cancellation());
  assert!(river.is_empty());
}

#[tokio::test]
async fn test_cancellation_interrupts_wait_for_first() {
  setup_tracing_for_test();
  let mut river = river("river_cancel_while_waiting", 2);
  let token = CancellationToken::new();
  river.submit(never(), "blocked").unwrap();

  let canceller = token.clone();
  tokio::spawn(async move {
    sleep(Duration::from_millis(50)).await;
    canceller.cancel();
  });

  let result = timeout(Duration::from_secs(2), river.drain(&token))
    .await
    .expect("cancellation must unblock the drain");
  assert!(matches!(result, Err(CoordinatorError::DrainCancelled)));
  assert!(river.is_empty());
}

#[tokio::test]
async fn test_drain_leaves_slow_operations_in_flight() {
  setup_tracing_for_test();
  let mut river = river("river_sliding", 2);
  let token = CancellationToken::new();

  river.submit(delayed(1, 10), "fast").unwrap();
  assert!(river.submit(delayed(2, 500), "slow").unwrap());

  assert_eq!(river.drain(&token).await.unwrap(), vec![(1, "fast")]);
  assert_eq!(river.len(), 1);
  assert!(!river.is_full());

  // Room for one more while the slow one keeps running.
  assert!(river.submit(delayed(3, 10), "fast_again").unwrap());
  assert_eq!(river.drain(&token).await.unwrap(), vec![(3, "fast_again")]);

  assert_eq!(river.drain_all(&token).await.unwrap(), vec![(2, "slow")]);
  assert!(river.is_empty());
}

#[tokio::test]
async fn test_final_drain_empties_once_total_is_reached() {
  setup_tracing_for_test();
  let mut river = river("river_final_drain", 3);
  river.set_call_count_to_indicate_full(3);
  let token = CancellationToken::new();

  assert!(!river.submit(delayed(1, 10), "a").unwrap());
  assert!(!river.submit(delayed(2, 40), "b").unwrap());
  assert!(river.submit(delayed(3, 80), "c").unwrap());

  let harvested = river.drain(&token).await.unwrap();
  assert_eq!(harvested, vec![(1, "a"), (2, "b"), (3, "c")]);
  assert!(river.is_empty());
  // Full by count for the rest of its life.
  assert!(river.is_full());
  assert_eq!(river.call_count(), 3);
}

#[tokio::test]
async fn test_final_drain_reports_completion_order() {
  setup_tracing_for_test();
  let mut river = river("river_completion_order", 2);
  river.set_call_count_to_indicate_full(2);
  let token = CancellationToken::new();

  river.submit(delayed(1, 120), "slow").unwrap();
  river.submit(delayed(2, 5), "fast").unwrap();

  assert_eq!(river.drain(&token).await.unwrap(), vec![(2, "fast"), (1, "slow")]);
}

#[tokio::test]
async fn test_count_signal_spans_drains() {
  setup_tracing_for_test();
  let mut river = river("river_count_across_drains", 2);
  river.set_call_count_to_indicate_full(3);
  let token = CancellationToken::new();

  river.submit(OperationHandle::completed(Ok(1)), "a").unwrap();
  assert!(river.submit(OperationHandle::completed(Ok(2)), "b").unwrap());
  assert_eq!(river.drain(&token).await.unwrap().len(), 2);
  assert!(!river.is_full());

  assert!(river.submit(OperationHandle::completed(Ok(3)), "c").unwrap());
  assert_eq!(river.drain(&token).await.unwrap(), vec![(3, "c")]);
  assert!(river.is_full());

  river.set_call_count_to_indicate_full(0);
  assert!(!river.is_full());
}

#[tokio::test]
async fn test_failure_abandons_remaining_operations() {
  setup_tracing_for_test();
  let mut river = river("river_failure", 3);
  let token = CancellationToken::new();

  river.submit(never(), "blocked").unwrap();
  river
    .submit(OperationHandle::spawn(async { Err::<u32, _>("broken") }), "failing")
    .unwrap();

  let result = timeout(Duration::from_secs(2), river.drain(&token)).await.unwrap();
  assert!(matches!(result, Err(CoordinatorError::Operation(OperationError::Failed(_)))));
  assert!(river.is_empty());
}

#[tokio::test]
async fn test_drain_all_honours_cancellation() {
  setup_tracing_for_test();
  let mut river = river("river_drain_all_cancelled", 2);
  let token = CancellationToken::new();
  river.submit(OperationHandle::completed(Ok(1)), "a").unwrap();
  river.submit(never(), "blocked").unwrap();

  let canceller = token.clone();
  tokio::spawn(async move {
    sleep(Duration::from_millis(50)).await;
    canceller.cancel();
  });

  let result = timeout(Duration::from_secs(2), river.drain_all(&token)).await.unwrap();
  assert!(matches!(result, Err(CoordinatorError::DrainCancelled)));
  assert!(river.is_empty());
}

#[tokio::test]
async fn test_submit_past_capacity_is_rejected() {
  setup_tracing_for_test();
  let mut river = river("river_capacity", 1);
  assert!(river.submit(never(), "first").unwrap());
  assert!(matches!(
    river.submit(never(), "second"),
    Err(CoordinatorError::CapacityExceeded { capacity: 1 })
  ));
  assert_eq!(river.len(), 1);
  river.abort_all();
  assert!(river.is_empty());
}
