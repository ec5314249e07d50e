// Client creation with custom user-agent support for kube 2.x
use crate::error::Result as CwResult;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};
use tracing::warn;

/// Environment variable that overrides the default user agent
pub const USER_AGENT_ENV: &str = "CLUSTERWATCH_USER_AGENT";

/// Push a `user-agent` header onto `config`.
///
/// Invalid header values are logged and skipped so the default agent is used.
pub fn add_user_agent_header(config: &mut Config, custom_user_agent: Option<&str>) {
    let user_agent = std::env::var(USER_AGENT_ENV)
        .ok()
        .or_else(|| custom_user_agent.map(str::to_string));

    if let Some(user_agent) = user_agent {
        match HeaderValue::from_str(&user_agent) {
            Ok(header_value) => config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value)),
            Err(e) => warn!("Ignoring invalid user agent {:?}: {}", user_agent, e),
        }
    }
}

/// Create a new k8s client to interact with k8s cluster api
///
/// # Errors
///
/// Will return `Err` if the kube config can not be inferred or the client
/// can not be built from it
pub async fn new(custom_user_agent: Option<&str>) -> CwResult<Client> {
    let mut config = Config::infer().await?;
    add_user_agent_header(&mut config, custom_user_agent);
    let client = Client::try_from(config)?;
    Ok(client)
}
