pub(crate) mod diff;
pub(crate) mod limits;
pub(crate) mod scan;

use guardian::github::{ClientOptions, GraphQlClient};

use crate::config::Config;

/// GraphQL client for the configured endpoint, pooled for `workers`.
pub(crate) fn build_client(
    config: &Config,
    workers: usize,
) -> Result<GraphQlClient, Box<dyn std::error::Error>> {
    let options = ClientOptions::new(config.github_token()?)
        .with_endpoint(config.github.graphql_url.clone())
        .with_workers(workers)
        .with_connection_multiplier(config.scan.connection_multiplier);
    Ok(GraphQlClient::new(options)?)
}
