//! End-to-end round trips over TCP on OS-assigned localhost ports.

#[cfg(test)]
mod tests {
    use crate::collective::Communicator;
    use crate::config::{GroupConfig, ProtocolConfig, TransportConfig};
    use crate::error::{Error, NetworkError, Result};
    use crate::network::TcpTransport;
    use crate::rebalancing::run_round_trip;
    use crate::testing::utils::{assert_round_trip_identity, bind_os_port, expect_all, tagged_batches};
    use crate::transform::{DegreesSine, Square};
    use crate::types::RoundOutcome;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    fn group_config(rank: usize, size: usize, addr: std::net::SocketAddr) -> GroupConfig {
        GroupConfig::new(rank, size)
            .with_coordinator_addr(addr)
            .with_transport_config(
                TransportConfig::default()
                    .with_connect_timeout(Duration::from_secs(5))
                    .with_retry_delay(Duration::from_millis(20)),
            )
    }

    /// Start a TCP group on a fresh port and run the round trip on every
    /// peer with `batches[rank]`.
    async fn run_tcp_group(
        batches: Vec<Vec<i64>>,
        protocol: ProtocolConfig,
    ) -> Vec<Result<RoundOutcome<i64>>> {
        let size = batches.len();
        let listener = bind_os_port().await;
        let addr = listener.local_addr().unwrap();

        let mut handles: Vec<JoinHandle<Result<RoundOutcome<i64>>>> = Vec::with_capacity(size);
        let mut listener = Some(listener);
        for (rank, batch) in batches.into_iter().enumerate() {
            let config = group_config(rank, size, addr);
            let protocol = protocol.clone();
            let listener = if rank == 0 { listener.take() } else { None };
            handles.push(tokio::spawn(async move {
                let transport = match listener {
                    Some(listener) => TcpTransport::accept(listener, &config).await?,
                    None => TcpTransport::connect(&config).await?,
                };
                let comm = Communicator::new(transport);
                run_round_trip(&comm, &batch, &Square, &protocol).await
            }));
        }

        let mut outcomes = Vec::with_capacity(size);
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }
        outcomes
    }

    #[tokio::test]
    async fn test_tcp_round_trip() {
        let batches = tagged_batches(&[8, 1, 4]);

        let outcomes = expect_all(run_tcp_group(batches.clone(), ProtocolConfig::default()).await);

        let processed: Vec<usize> = outcomes.iter().map(|o| o.processed).collect();
        assert_eq!(processed, vec![5, 4, 4]);
        assert_round_trip_identity(&batches, &outcomes, &Square);
    }

    #[tokio::test]
    async fn test_tcp_round_trip_with_barriers_and_empty_peers() {
        let batches = tagged_batches(&[0, 5, 0, 0]);
        let protocol = ProtocolConfig::default().with_explicit_barriers(true);

        let outcomes = expect_all(run_tcp_group(batches.clone(), protocol).await);

        let processed: Vec<usize> = outcomes.iter().map(|o| o.processed).collect();
        assert_eq!(processed, vec![2, 1, 1, 1]);
        assert_round_trip_identity(&batches, &outcomes, &Square);
    }

    #[tokio::test]
    async fn test_tcp_float_results() {
        let listener = bind_os_port().await;
        let addr = listener.local_addr().unwrap();

        let coordinator = tokio::spawn(async move {
            let transport = TcpTransport::accept(listener, &group_config(0, 2, addr)).await?;
            let comm = Communicator::new(transport);
            run_round_trip(&comm, &[0, 30, 90, 180, 45], &DegreesSine, &ProtocolConfig::default())
                .await
        });
        let worker = tokio::spawn(async move {
            let transport = TcpTransport::connect(&group_config(1, 2, addr)).await?;
            let comm = Communicator::new(transport);
            run_round_trip(&comm, &[60], &DegreesSine, &ProtocolConfig::default()).await
        });

        let coordinator = coordinator.await.unwrap().unwrap();
        let worker = worker.await.unwrap().unwrap();

        assert_eq!(coordinator.processed, 3);
        assert_eq!(worker.processed, 3);
        assert_eq!(coordinator.results.len(), 5);
        assert!((coordinator.results[1] - 0.5).abs() < 1e-6);
        assert!((coordinator.results[2] - 1.0).abs() < 1e-6);
        assert!((worker.results[0] - 0.866_025_4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_group_size() {
        let listener = bind_os_port().await;
        let addr = listener.local_addr().unwrap();

        let coordinator =
            tokio::spawn(async move { TcpTransport::accept(listener, &group_config(0, 2, addr)).await });

        // Claims a group of three; the coordinator runs a group of two.
        let stray = TcpTransport::connect(&group_config(1, 3, addr)).await;
        assert!(matches!(stray, Err(Error::Network(NetworkError::Handshake(_)))));

        let worker = TcpTransport::connect(&group_config(1, 2, addr)).await.unwrap();
        let coordinator = coordinator.await.unwrap().unwrap();

        let coordinator = Communicator::new(coordinator);
        let worker = Communicator::new(worker);
        let (gathered, sent) = tokio::join!(coordinator.collect_scalar(4), worker.collect_scalar(7));
        assert_eq!(gathered.unwrap(), Some(vec![4, 7]));
        assert_eq!(sent.unwrap(), None);
    }
}
