//! Command-line interface definitions for Awful News Rewriter.
//!
//! Every option can also be supplied through an environment variable, which is
//! how the service is usually configured inside a container. Values given here
//! override the YAML configuration file.

use clap::Parser;

/// Command-line arguments for the rewrite service.
///
/// # Examples
///
/// ```sh
/// # Defaults, no config file
/// awful_news_rewriter
///
/// # With a config file and a hosted provider
/// awful_news_rewriter -c ./config.yaml --provider-url https://api.openai.com/v1 --model gpt-4o-mini
///
/// # Running in Docker with a custom bridge
/// RUNNING_IN_CONTAINER=true HOST_GATEWAY_ALIAS=172.18.0.1 awful_news_rewriter
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "REWRITER_CONFIG")]
    pub config: Option<String>,

    /// Address to bind the HTTP server to
    #[arg(long, env = "REWRITER_HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(short, long, env = "REWRITER_PORT")]
    pub port: Option<u16>,

    /// Maximum number of tasks processed at the same time
    #[arg(long, env = "REWRITER_MAX_TASKS")]
    pub max_concurrent_tasks: Option<usize>,

    /// Base URL of the OpenAI-compatible rewrite provider
    #[arg(long, env = "REWRITE_BASE_URL")]
    pub provider_url: Option<String>,

    /// Model used for rewriting
    #[arg(long, env = "REWRITE_MODEL")]
    pub model: Option<String>,

    /// API key for the rewrite provider
    #[arg(long, env = "REWRITE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Force container mode on or off (auto-detected when omitted)
    #[arg(long, env = "RUNNING_IN_CONTAINER")]
    pub containerized: Option<bool>,

    /// Host used in place of loopback callback hosts when containerized
    #[arg(long, env = "HOST_GATEWAY_ALIAS")]
    pub gateway_alias: Option<String>,
}
