use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use floodgate::{FailurePolicy, PoolConfig};

/// Runtime configuration for the `floodgate-server` binary.
///
/// Every flag can also be set through the environment variable named next to
/// it (a `.env` file in the working directory is loaded first). All values
/// are read once at startup; nothing is hot-reloadable.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "floodgate-server",
    version,
    about = "An HTTP service that admits requests into a bounded queue drained by a fixed worker pool"
)]
pub struct CliArgs {
    /// Number of workers draining the queue.
    ///
    /// Workers are lightweight Tokio tasks, so this can be far larger than
    /// the number of CPU cores.
    ///
    /// Environment variable: `POOL_SIZE`
    #[arg(long, env = "POOL_SIZE", default_value_t = 26_000)]
    pub pool_size: usize,

    /// Maximum number of admitted requests waiting for a worker.
    ///
    /// Once this many requests are queued, further requests are rejected
    /// immediately with `503 Service Unavailable`.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 28_000)]
    pub queue_capacity: usize,

    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Delay, in milliseconds, between a successful admission and the HTTP
    /// response. The response does not wait for the queued work itself.
    ///
    /// Environment variable: `RESPONSE_DELAY_MS`
    #[arg(long, env = "RESPONSE_DELAY_MS", default_value_t = 3_000)]
    pub response_delay_ms: u64,

    /// Simulated processing time per request, in milliseconds.
    ///
    /// Environment variable: `PROCESSING_DELAY_MS`
    #[arg(long, env = "PROCESSING_DELAY_MS", default_value_t = 3_000)]
    pub processing_delay_ms: u64,

    /// How long shutdown waits for workers to drain the queue, in seconds.
    /// `0` waits until every worker has finished.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,

    /// Total processing attempts per request. `1` disables retries: a
    /// failed request is logged and dropped.
    ///
    /// Environment variable: `MAX_ATTEMPTS`
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 1)]
    pub max_attempts: u32,

    /// Pause between processing attempts, in milliseconds. Only used when
    /// `MAX_ATTEMPTS` is greater than 1.
    ///
    /// Environment variable: `RETRY_BACKOFF_MS`
    #[arg(long, env = "RETRY_BACKOFF_MS", default_value_t = 100)]
    pub retry_backoff_ms: u64,

    /// Log overload rejections as warnings and count them in the error
    /// metric. When unset they are logged at debug level and only counted
    /// as rejections.
    ///
    /// Environment variable: `COUNT_REJECTIONS_AS_ERRORS`
    #[arg(long, env = "COUNT_REJECTIONS_AS_ERRORS", default_value_t = false)]
    pub count_rejections_as_errors: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub pool: PoolConfig,
    pub server_addr: String,
    pub response_delay: Duration,
    pub processing_delay: Duration,
    pub count_rejections_as_errors: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.pool_size == 0 {
            bail!("POOL_SIZE must be greater than 0");
        }

        if args.queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be greater than 0");
        }

        let failure_policy = match args.max_attempts {
            0 => bail!("MAX_ATTEMPTS must be at least 1"),
            1 => FailurePolicy::Drop,
            max_attempts => FailurePolicy::Retry {
                max_attempts,
                backoff: Duration::from_millis(args.retry_backoff_ms),
            },
        };

        let shutdown_timeout =
            (args.shutdown_timeout_secs > 0).then(|| Duration::from_secs(args.shutdown_timeout_secs));

        let pool = PoolConfig::new(args.pool_size, args.queue_capacity)
            .with_failure_policy(failure_policy)
            .with_shutdown_timeout(shutdown_timeout);
        pool.validate()?;

        Ok(Self {
            pool,
            server_addr: args.server_addr,
            response_delay: Duration::from_millis(args.response_delay_ms),
            processing_delay: Duration::from_millis(args.processing_delay_ms),
            count_rejections_as_errors: args.count_rejections_as_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            core::iter::once("floodgate-server").chain(extra.iter().copied()),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn explicit_flags_are_applied() {
        let config = parse(&[
            "--pool-size",
            "4",
            "--queue-capacity",
            "16",
            "--server-addr",
            "127.0.0.1:9000",
            "--response-delay-ms",
            "0",
            "--processing-delay-ms",
            "25",
            "--shutdown-timeout-secs",
            "5",
        ])
        .unwrap();

        assert_eq!(config.pool.pool_size, 4);
        assert_eq!(config.pool.queue_capacity, 16);
        assert_eq!(config.pool.failure_policy, FailurePolicy::Drop);
        assert_eq!(config.pool.shutdown_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.server_addr, "127.0.0.1:9000");
        assert_eq!(config.response_delay, Duration::ZERO);
        assert_eq!(config.processing_delay, Duration::from_millis(25));
        assert!(!config.count_rejections_as_errors);
    }

    #[test]
    fn retries_enabled_above_one_attempt() {
        let config = parse(&["--max-attempts", "3", "--retry-backoff-ms", "10"]).unwrap();
        assert_eq!(
            config.pool.failure_policy,
            FailurePolicy::Retry {
                max_attempts: 3,
                backoff: Duration::from_millis(10),
            }
        );
    }

    #[test]
    fn zero_shutdown_timeout_waits_forever() {
        let config = parse(&["--shutdown-timeout-secs", "0"]).unwrap();
        assert_eq!(config.pool.shutdown_timeout, None);
    }

    #[test]
    fn rejects_zero_values() {
        let err = parse(&["--pool-size", "0"]).unwrap_err();
        assert!(err.to_string().contains("POOL_SIZE"));

        let err = parse(&["--queue-capacity", "0"]).unwrap_err();
        assert!(err.to_string().contains("QUEUE_CAPACITY"));

        let err = parse(&["--max-attempts", "0"]).unwrap_err();
        assert!(err.to_string().contains("MAX_ATTEMPTS"));
    }
}
