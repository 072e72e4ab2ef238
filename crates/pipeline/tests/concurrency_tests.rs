// Concurrency-bound and look-ahead properties.
//
// The part migrator must never run more than `concurrency` fetches at once,
// and the pipeline must not pull uploads from the source beyond the active
// set plus a small fixed look-ahead.

mod common;

use caravel_pipeline::{Collaborators, MigrationConfig, migrate};
use common::mocks::{
    FetchBehavior, RecordingCopier, ScriptedDestination, StubFetcher, counted_source,
    endless_source, single_part_uploads,
};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;

fn config(concurrency: usize) -> MigrationConfig {
    MigrationConfig {
        concurrency,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_hanging_fetches_cap_in_flight_and_source_pulls() {
    // Endless source, fetches that never complete, k = 3.
    let pulled = Arc::new(AtomicUsize::new(0));
    let fetcher = StubFetcher::new(FetchBehavior::Hang);
    let cancel = CancellationToken::new();

    let collaborators = Collaborators {
        fetcher: Arc::clone(&fetcher) as Arc<dyn caravel_pipeline::PartFetcher>,
        destination: ScriptedDestination::new(),
        copier: RecordingCopier::new(201),
    };
    let stream = migrate(
        endless_source(Arc::clone(&pulled)),
        collaborators,
        config(3),
        cancel.clone(),
    );

    let consumer = tokio::spawn(async move {
        let mut stream = Box::pin(stream);
        let mut outcomes = Vec::new();
        while let Some(item) = stream.next().await {
            outcomes.push(item);
        }
        outcomes
    });

    // Let the pipeline saturate.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(
        fetcher.max_in_flight.load(Ordering::SeqCst) <= 3,
        "in-flight fetches exceeded k: {}",
        fetcher.max_in_flight.load(Ordering::SeqCst)
    );
    // k in flight + one buffered part + the upload held by fan-out.
    assert!(
        pulled.load(Ordering::SeqCst) <= 5,
        "source over-pulled: {}",
        pulled.load(Ordering::SeqCst)
    );

    // Cancellation drains the hung fetches and ends the stream.
    cancel.cancel();
    let outcomes = timeout(Duration::from_secs(5), consumer)
        .await
        .expect("stream did not terminate after cancellation")
        .unwrap();
    assert!(outcomes.iter().all(|o| match o {
        Ok(outcome) => !outcome.is_success(),
        Err(_) => false,
    }));
}

#[tokio::test]
async fn test_finite_source_is_not_overpulled() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let fetcher = StubFetcher::new(FetchBehavior::Hang);
    let cancel = CancellationToken::new();

    let collaborators = Collaborators {
        fetcher: Arc::clone(&fetcher) as Arc<dyn caravel_pipeline::PartFetcher>,
        destination: ScriptedDestination::new(),
        copier: RecordingCopier::new(201),
    };
    let stream = migrate(
        counted_source(single_part_uploads(10), Arc::clone(&pulled)),
        collaborators,
        config(3),
        cancel.clone(),
    );
    let consumer = tokio::spawn(async move { Box::pin(stream).count().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        pulled.load(Ordering::SeqCst) <= 5,
        "source over-pulled: {}",
        pulled.load(Ordering::SeqCst)
    );

    cancel.cancel();
    timeout(Duration::from_secs(5), consumer)
        .await
        .expect("stream did not terminate")
        .unwrap();
}

#[tokio::test]
async fn test_slow_fetches_respect_worker_bound_and_all_complete() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let fetcher = StubFetcher::new(FetchBehavior::Delayed(Duration::from_millis(20), 10));

    let collaborators = Collaborators {
        fetcher: Arc::clone(&fetcher) as Arc<dyn caravel_pipeline::PartFetcher>,
        destination: ScriptedDestination::new(),
        copier: RecordingCopier::new(201),
    };
    let stream = migrate(
        counted_source(single_part_uploads(8), Arc::clone(&pulled)),
        collaborators,
        config(2),
        CancellationToken::new(),
    );

    let outcomes: Vec<_> = Box::pin(stream).collect().await;
    assert_eq!(outcomes.len(), 8);
    assert!(outcomes.iter().all(|o| o.as_ref().unwrap().is_success()));
    assert!(
        fetcher.max_in_flight.load(Ordering::SeqCst) <= 2,
        "worker bound violated: {}",
        fetcher.max_in_flight.load(Ordering::SeqCst)
    );
    assert_eq!(fetcher.started.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_zero_concurrency_is_raised_to_one() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let fetcher = StubFetcher::new(FetchBehavior::Body { content_length: 10 });

    let collaborators = Collaborators {
        fetcher: Arc::clone(&fetcher) as Arc<dyn caravel_pipeline::PartFetcher>,
        destination: ScriptedDestination::new(),
        copier: RecordingCopier::new(201),
    };
    let stream = migrate(
        counted_source(single_part_uploads(3), Arc::clone(&pulled)),
        collaborators,
        config(0),
        CancellationToken::new(),
    );

    let outcomes: Vec<_> = Box::pin(stream).collect().await;
    assert_eq!(outcomes.len(), 3);
    assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 1);
}
