use anyhow::bail;
use clap::Parser;

/// Runtime configuration for the `pointcloud-tonic-server` binary.
///
/// These settings control the labeling thresholds, per-session buffering, and
/// listener behavior of the clustering service. All values are parsed from
/// CLI arguments or environment variables, with defaults suitable for the
/// demonstrated data scale.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pointcloud-tonic-server",
    version,
    about = "A gRPC service for streaming point-cloud clustering"
)]
pub struct CliArgs {
    /// Percentile of the Z distribution above which a point is labeled DURA.
    ///
    /// Must lie in `[0, 100]` and be greater than or equal to the lower
    /// percentile.
    ///
    /// Environment variable: `UPPER_PERCENTILE`
    #[arg(long, env = "UPPER_PERCENTILE", default_value_t = 90.0)]
    pub upper_percentile: f64,

    /// Percentile of the Z distribution below which a point is labeled
    /// CORTICAL_SURFACE.
    ///
    /// Environment variable: `LOWER_PERCENTILE`
    #[arg(long, env = "LOWER_PERCENTILE", default_value_t = 10.0)]
    pub lower_percentile: f64,

    /// Maximum number of points accepted in a single chunk.
    ///
    /// Enforced server-side to prevent memory exhaustion from oversized
    /// chunks. Clients batching at the default chunk size stay far below
    /// this.
    ///
    /// Environment variable: `MAX_CHUNK_POINTS`
    #[arg(long, env = "MAX_CHUNK_POINTS", default_value_t = 10_000)]
    pub max_chunk_points: usize,

    /// Capacity of the response buffer between a session task and the gRPC
    /// stream.
    ///
    /// Lower values increase backpressure responsiveness; higher values
    /// enable deeper pipelining of labeled responses.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 64)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight sessions to drain during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/pointcloud-uds.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub upper_percentile: f64,
    pub lower_percentile: f64,
    pub max_chunk_points: usize,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: u64,
    pub server_addr: String,
    pub uds: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        for (name, p) in [
            ("UPPER_PERCENTILE", args.upper_percentile),
            ("LOWER_PERCENTILE", args.lower_percentile),
        ] {
            if !(0.0..=100.0).contains(&p) {
                bail!("{name} ({p}) must lie in [0, 100]");
            }
        }

        if args.upper_percentile < args.lower_percentile {
            bail!(
                "UPPER_PERCENTILE ({}) must be >= LOWER_PERCENTILE ({})",
                args.upper_percentile,
                args.lower_percentile
            );
        }

        if args.max_chunk_points == 0 {
            bail!("MAX_CHUNK_POINTS must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            upper_percentile: args.upper_percentile,
            lower_percentile: args.lower_percentile,
            max_chunk_points: args.max_chunk_points,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: args.shutdown_timeout,
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CliArgs {
        CliArgs {
            upper_percentile: 90.0,
            lower_percentile: 10.0,
            max_chunk_points: 10_000,
            stream_buffer_size: 64,
            shutdown_timeout: 3,
            server_addr: "0.0.0.0:50051".to_string(),
            uds: false,
        }
    }

    #[test]
    fn valid_args_pass() {
        assert!(ServerConfig::try_from(args()).is_ok());
    }

    #[test]
    fn percentile_out_of_range_is_rejected() {
        let mut bad = args();
        bad.upper_percentile = 100.5;
        assert!(ServerConfig::try_from(bad).is_err());

        let mut bad = args();
        bad.lower_percentile = -1.0;
        assert!(ServerConfig::try_from(bad).is_err());
    }

    #[test]
    fn inverted_percentiles_are_rejected() {
        let mut bad = args();
        bad.upper_percentile = 10.0;
        bad.lower_percentile = 90.0;
        assert!(ServerConfig::try_from(bad).is_err());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut bad = args();
        bad.max_chunk_points = 0;
        assert!(ServerConfig::try_from(bad).is_err());

        let mut bad = args();
        bad.stream_buffer_size = 0;
        assert!(ServerConfig::try_from(bad).is_err());
    }
}
