//! Command-line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ecr_exporter_collector::{CollectorConfig, DEFAULT_SCHEDULE};
use ecr_exporter_metrics::ServerConfig;
use ecr_exporter_registry::RegistryConfig;

use crate::logging::LogFormat;

/// Exports AWS ECR repository, image and scan finding metrics to Prometheus
#[derive(Debug, Parser)]
#[command(name = "ecr-exporter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log output format
    #[arg(
        long,
        env = "AWS_ECR_EXPORTER_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Logfmt,
    )]
    pub log_format: LogFormat,

    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, env = "AWS_ECR_EXPORTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Address the metrics server listens on
    #[arg(long, env = "AWS_ECR_EXPORTER_WEB_HOST", default_value = "0.0.0.0")]
    pub web_host: IpAddr,

    /// Port the metrics server listens on
    #[arg(long, env = "AWS_ECR_EXPORTER_WEB_PORT", default_value_t = 9090)]
    pub web_port: u16,

    /// Path metrics are served on
    #[arg(long, env = "AWS_ECR_EXPORTER_WEB_METRICS_PATH", default_value = "/metrics")]
    pub web_metrics_path: String,

    /// Six-field cron expression (seconds first, UTC) for collection cycles
    #[arg(long, env = "AWS_ECR_EXPORTER_CRON_SCHEDULE", default_value = DEFAULT_SCHEDULE)]
    pub cron_schedule: String,

    /// Upstream requests allowed in a burst
    #[arg(long, env = "AWS_ECR_EXPORTER_RATE_LIMIT_BURSTS", default_value_t = 1)]
    pub rate_limit_bursts: u32,

    /// Sustained upstream requests per second
    #[arg(long, env = "AWS_ECR_EXPORTER_RATE_LIMIT_FREQUENCY", default_value_t = 2.0)]
    pub rate_limit_frequency: f64,

    /// How long scan findings for a digest are reused (e.g. 24h, 90m)
    #[arg(
        long,
        env = "AWS_ECR_EXPORTER_CACHE_TTL",
        default_value = "24h",
        value_parser = humantime::parse_duration,
    )]
    pub cache_ttl: Duration,

    /// Cap the image tags emitted per repository
    #[arg(long, env = "AWS_ECR_EXPORTER_LIMITS_IMAGE_TAGS_ENABLED")]
    pub limits_image_tags_enabled: bool,

    /// Image tags emitted per repository when the cap is enabled
    #[arg(long, env = "AWS_ECR_EXPORTER_LIMITS_IMAGE_TAGS_COUNT", default_value_t = 0)]
    pub limits_image_tags_count: usize,

    /// AWS region (defaults to the SDK provider chain)
    #[arg(long, env = "AWS_ECR_EXPORTER_AWS_REGION")]
    pub aws_region: Option<String>,

    /// Page size for ECR listing calls
    #[arg(
        long,
        env = "AWS_ECR_EXPORTER_PAGE_SIZE",
        value_parser = clap::value_parser!(i32).range(1..=1000),
    )]
    pub page_size: Option<i32>,

    /// How long to wait for in-flight collection on shutdown
    #[arg(
        long,
        env = "AWS_ECR_EXPORTER_SHUTDOWN_GRACE",
        default_value = "10s",
        value_parser = humantime::parse_duration,
    )]
    pub shutdown_grace: Duration,

    /// Run a single cycle, print the metrics to stdout and exit
    #[arg(long, env = "AWS_ECR_EXPORTER_ONCE")]
    pub once: bool,
}

impl Cli {
    /// Builds the collection pipeline configuration.
    pub fn collector_config(&self) -> Result<CollectorConfig> {
        let builder = CollectorConfig::builder()
            .rate_limit_frequency(self.rate_limit_frequency)
            .rate_limit_burst(self.rate_limit_bursts)
            .cache_ttl(self.cache_ttl);

        let builder = if self.limits_image_tags_enabled {
            builder.tag_limit(self.limits_image_tags_count)
        } else {
            builder.unlimited_tags()
        };

        let config = builder.build();
        config.validate().context("invalid collector configuration")?;
        Ok(config)
    }

    /// Builds the ECR client configuration.
    pub fn registry_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::new();
        if let Some(region) = &self.aws_region {
            config = config.with_region(region.clone());
        }
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        config
    }

    /// Builds the metrics server configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(
            SocketAddr::new(self.web_host, self.web_port),
            self.web_metrics_path.clone(),
        )
    }
}
