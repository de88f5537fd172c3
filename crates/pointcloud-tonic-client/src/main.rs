use clap::Parser;
use pointcloud_tonic_client::config::{CliArgs, ClientConfig};
use pointcloud_tonic_client::{ClusterClient, LabelReport, PcdReader};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let input = BufReader::new(File::open(&config.input)?);
    tracing::info!("Streaming {} to {}", config.input, config.addr);

    let mut client = ClusterClient::connect(config.addr.clone(), config.chunk_size).await?;
    let mut stream = client.cluster_stream(points_from(input)).await?;

    let mut sink: Option<BufWriter<File>> = match &config.output {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let mut report = LabelReport::default();
    loop {
        match stream.message().await {
            Ok(Some(response)) => {
                report.add(&response);
                let label = pointcloud_stats::Label::from(response.label());
                match sink.as_mut() {
                    Some(out) => writeln!(out, "{}\t{}", response.point_id, label)?,
                    None => tracing::debug!("Point ID: {}, Label: {}", response.point_id, label),
                }
            }
            Ok(None) => break,
            Err(status) => anyhow::bail!("Stream failed: {status}"),
        }
    }

    if let Some(mut out) = sink {
        out.flush()?;
    }

    tracing::info!("Received {} labeled points", report.total);
    for line in report.to_string().lines() {
        tracing::info!("{line}");
    }

    Ok(())
}

/// Lazy point source over the input file; malformed lines are skipped inside
/// the reader, an I/O failure ends the stream early with an error log.
fn points_from<R: BufRead + Send + 'static>(
    reader: R,
) -> impl Iterator<Item = pointcloud_tonic_core::proto::Point> + Send + 'static {
    PcdReader::new(reader).map_while(|res| match res {
        Ok(point) => Some(point),
        Err(e) => {
            tracing::error!("Failed to read input: {e}");
            None
        }
    })
}
