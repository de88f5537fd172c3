use anyhow::bail;
use clap::Parser;
use pointcloud_tonic_core::types::DEFAULT_CHUNK_SIZE;

/// Runtime configuration for the `pointcloud-tonic-client` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pointcloud-tonic-client",
    version,
    about = "Streams a point cloud to the clustering service and reports the labels"
)]
pub struct CliArgs {
    /// Server address, including scheme.
    ///
    /// Environment variable: `CLIENT_REMOTE_ADDR`
    #[arg(long, env = "CLIENT_REMOTE_ADDR", default_value_t = String::from("http://127.0.0.1:50051"))]
    pub addr: String,

    /// Path to the input PCD text file.
    ///
    /// Environment variable: `CLIENT_INPUT_FILE`
    #[arg(long, env = "CLIENT_INPUT_FILE")]
    pub input: String,

    /// Optional output file for `point_id<TAB>label` lines. Labels are only
    /// logged when omitted.
    ///
    /// Environment variable: `CLIENT_OUTPUT_FILE`
    #[arg(long, env = "CLIENT_OUTPUT_FILE")]
    pub output: Option<String>,

    /// Number of points per chunk message.
    ///
    /// Environment variable: `CLIENT_CHUNK_SIZE`
    #[arg(long, env = "CLIENT_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub addr: String,
    pub input: String,
    pub output: Option<String>,
    pub chunk_size: usize,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.chunk_size == 0 {
            bail!("CLIENT_CHUNK_SIZE must be greater than 0");
        }

        Ok(Self {
            addr: args.addr,
            input: args.input,
            output: args.output,
            chunk_size: args.chunk_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_chunk_size_is_rejected() {
        let args = CliArgs {
            addr: "http://127.0.0.1:50051".to_string(),
            input: "cloud.pcd".to_string(),
            output: None,
            chunk_size: 0,
        };
        assert!(ClientConfig::try_from(args).is_err());
    }
}
