use futures_river::{BoxError, Interweaver, OperationHandle, PipelineConfig};
use std::time::{Duration, Instant};
use tracing::info;

async fn produce_chunk(index: u32) -> Result<Vec<u8>, BoxError> {
  tokio::time::sleep(Duration::from_millis(200)).await;
  Ok(vec![index as u8; 4])
}

async fn consume_chunk(chunk: Vec<u8>) {
  tokio::time::sleep(Duration::from_millis(200)).await;
  info!("Consumed chunk {:?}", chunk);
}

async fn run(level: f64, chunks: u32) -> Result<Duration, BoxError> {
  let started = Instant::now();
  let config = PipelineConfig::new("chunk_pipeline")
    .with_level(level)
    .with_forced_flush_after(chunks as u64);
  let mut interweaver = Interweaver::new(config)?;

  for index in 0..chunks {
    // Producing chunk n + 1 overlaps with consuming chunk n.
    for chunk in interweaver.submit(OperationHandle::spawn(produce_chunk(index))).await? {
      consume_chunk(chunk).await;
    }
  }
  if let Some(chunk) = interweaver.drain().await? {
    consume_chunk(chunk).await;
  }
  Ok(started.elapsed())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Pipelining Example ---");
  for level in [0.0, 0.5, 1.0] {
    let elapsed = run(level, 6).await?;
    info!("level {:.1}: 6 chunks in {:?}", level, elapsed);
  }
  info!("--- Pipelining Example End ---");
  Ok(())
}
