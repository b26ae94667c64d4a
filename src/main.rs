//! Run one rebalancing round trip over random angle workloads.
//!
//! In-process group of four peers:
//!   RUST_LOG=info cargo run -- --local 4
//!
//! Three processes over TCP, coordinator on rank 0:
//!   RUST_LOG=info cargo run -- 0 3 127.0.0.1:7400
//!   RUST_LOG=info cargo run -- 1 3 127.0.0.1:7400
//!   RUST_LOG=info cargo run -- 2 3 127.0.0.1:7400

use regather::collective::Communicator;
use regather::config::{Config, GroupConfig};
use regather::network::{local_group, TcpTransport, Transport};
use regather::transform::{DegreesSine, Transform};
use regather::{run_round_trip, workload, Error, Rank, RoundOutcome};
use std::env;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

const USAGE: &str = "usage: regather --local [peers] | regather <rank> <size> [coordinator-addr]";

/// How this process takes part in a group.
#[derive(Debug, PartialEq)]
enum Launch {
    /// Every peer as a task of this process.
    Local { size: usize },
    /// One peer of a TCP group.
    Peer {
        rank: Rank,
        size: usize,
        addr: Option<SocketAddr>,
    },
}

fn parse_number(args: &[String], index: usize, name: &str) -> regather::Result<usize> {
    let raw = args
        .get(index)
        .ok_or_else(|| Error::Config(format!("missing {}; {}", name, USAGE)))?;
    raw.parse()
        .map_err(|e| Error::Config(format!("invalid {} {:?}: {}", name, raw, e)))
}

/// Parse the command line, program name included.
fn parse_args(args: &[String]) -> regather::Result<Launch> {
    if args.get(1).map(String::as_str) == Some("--local") {
        if args.len() > 3 {
            return Err(Error::Config(format!("unexpected argument {:?}; {}", args[3], USAGE)));
        }
        let size = match args.get(2) {
            Some(_) => parse_number(args, 2, "peer count")?,
            None => 4,
        };
        return Ok(Launch::Local { size });
    }

    if args.len() > 4 {
        return Err(Error::Config(format!("unexpected argument {:?}; {}", args[4], USAGE)));
    }
    let rank = parse_number(args, 1, "rank")?;
    let size = parse_number(args, 2, "size")?;
    let addr = args
        .get(3)
        .map(|raw| {
            raw.parse()
                .map_err(|e| Error::Config(format!("invalid coordinator address {:?}: {}", raw, e)))
        })
        .transpose()?;

    Ok(Launch::Peer { rank, size, addr })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "regather=info".to_string()))
        .init();

    let args: Vec<String> = env::args().collect();

    let (rank, size, addr) = match parse_args(&args)? {
        Launch::Local { size } => return run_local(size).await,
        Launch::Peer { rank, size, addr } => (rank, size, addr),
    };

    let mut group = GroupConfig::new(rank, size);
    if let Some(addr) = addr {
        group = group.with_coordinator_addr(addr);
    }
    let config = Config::new(rank, size).with_group_config(group);
    config.validate()?;

    println!(
        "Starting rank {} of {} (coordinator at {})",
        rank, size, config.group.coordinator_addr
    );

    let transport = TcpTransport::establish(&config.group).await?;
    run_peer(transport, &config).await?;
    Ok(())
}

async fn run_local(size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new(0, size);
    config.validate()?;

    println!("Starting in-process group of {} peers", size);

    let mut handles = Vec::with_capacity(size);
    for transport in local_group(size, config.group.coordinator) {
        let config = Config::new(transport.rank(), size);
        handles.push(tokio::spawn(async move { run_peer(transport, &config).await }));
    }

    let mut failed = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Peer failed");
                failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "Peer task panicked");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} peers failed", failed, size).into());
    }
    println!("All {} peers completed the round trip", size);
    Ok(())
}

async fn run_peer<T: Transport>(transport: T, config: &Config) -> regather::Result<RoundOutcome<f32>> {
    let rank = transport.rank();
    let comm = Communicator::new(transport);

    let batch = workload::generate(rank, &config.workload);
    info!(rank, items = batch.len(), angles = ?batch, "Generated workload");

    let outcome = run_round_trip(&comm, &batch, &DegreesSine, &config.protocol).await?;
    verify(rank, &batch, &outcome.results)?;

    if let Some(total) = outcome.total_items {
        info!(rank, total, "Group total");
    }
    for (phase, elapsed) in &outcome.phase_timings {
        info!(rank, phase = *phase, elapsed_us = elapsed.as_micros() as u64, "Phase timing");
    }
    info!(rank, results = ?outcome.results, "Final results");
    debug!(rank, metrics = %comm.metrics().render(), "Protocol metrics");
    Ok(outcome)
}

/// Check that every result matches the transform applied locally.
fn verify(rank: usize, batch: &[i32], results: &[f32]) -> regather::Result<()> {
    if batch.len() != results.len() {
        return Err(Error::Internal(format!(
            "rank {} got {} results for {} items",
            rank,
            results.len(),
            batch.len()
        )));
    }
    for (index, (item, result)) in batch.iter().zip(results).enumerate() {
        let expected = DegreesSine.apply(item).map_err(|source| Error::TransformFailed {
            rank,
            index,
            source,
        })?;
        if expected.to_bits() != result.to_bits() {
            return Err(Error::Internal(format!(
                "rank {} item {} ({}°): expected {}, got {}",
                rank, index, item, expected, result
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("regather")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_local() {
        assert_eq!(parse_args(&args(&["--local"])).unwrap(), Launch::Local { size: 4 });
        assert_eq!(parse_args(&args(&["--local", "7"])).unwrap(), Launch::Local { size: 7 });
        assert!(matches!(parse_args(&args(&["--local", "four"])), Err(Error::Config(_))));
        assert!(matches!(parse_args(&args(&["--local", "2", "3"])), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_peer() {
        assert_eq!(
            parse_args(&args(&["2", "3", "127.0.0.1:7400"])).unwrap(),
            Launch::Peer {
                rank: 2,
                size: 3,
                addr: Some("127.0.0.1:7400".parse().unwrap()),
            }
        );
        assert_eq!(
            parse_args(&args(&["0", "1"])).unwrap(),
            Launch::Peer { rank: 0, size: 1, addr: None }
        );
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        // A typo must not turn into rank 0 of a group of one.
        assert!(matches!(parse_args(&args(&["one", "3"])), Err(Error::Config(_))));
        assert!(matches!(parse_args(&args(&["1", "-3"])), Err(Error::Config(_))));
        assert!(matches!(parse_args(&args(&["1"])), Err(Error::Config(_))));
        assert!(matches!(parse_args(&args(&[])), Err(Error::Config(_))));
        assert!(matches!(
            parse_args(&args(&["1", "3", "localhost"])),
            Err(Error::Config(_))
        ));
    }
}
