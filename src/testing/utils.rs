use crate::error::{Result, TransformError};
use crate::transform::Transform;
use crate::types::RoundOutcome;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::TcpListener;

/// Bind an OS-assigned port on localhost.
pub(crate) async fn bind_os_port() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

/// Batches of distinct values: rank `r`'s items are `r * 1000 + i`.
pub(crate) fn tagged_batches(counts: &[usize]) -> Vec<Vec<i64>> {
    counts
        .iter()
        .enumerate()
        .map(|(rank, &count)| (0..count).map(|i| (rank * 1000 + i) as i64).collect())
        .collect()
}

/// Random batch lengths in `[0, max_len]`, reproducible from `seed`.
pub(crate) fn random_counts(peers: usize, max_len: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..peers).map(|_| rng.gen_range(0..=max_len)).collect()
}

/// Unwrap every outcome, panicking with the failing rank.
pub(crate) fn expect_all<O>(outcomes: Vec<Result<RoundOutcome<O>>>) -> Vec<RoundOutcome<O>> {
    outcomes
        .into_iter()
        .enumerate()
        .map(|(rank, outcome)| match outcome {
            Ok(outcome) => outcome,
            Err(e) => panic!("rank {} failed: {}", rank, e),
        })
        .collect()
}

/// Assert that each peer got back `transform` of its own batch, in order.
pub(crate) fn assert_round_trip_identity<I, O, F>(
    batches: &[Vec<I>],
    outcomes: &[RoundOutcome<O>],
    transform: &F,
) where
    O: PartialEq + std::fmt::Debug,
    F: Transform<I, O>,
{
    assert_eq!(batches.len(), outcomes.len());
    for (rank, (batch, outcome)) in batches.iter().zip(outcomes).enumerate() {
        assert_eq!(outcome.rank, rank);
        let expected: std::result::Result<Vec<O>, TransformError> =
            batch.iter().map(|item| transform.apply(item)).collect();
        assert_eq!(outcome.results, expected.unwrap(), "rank {} results", rank);
    }
}
