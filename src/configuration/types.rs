use serde::Deserialize;

/// Where to reach one server's management interface.
#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_address")]
    pub host: String,
    #[serde(default = "default_monitoring_port")]
    pub monitoring_port: u16,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: default_address(),
            monitoring_port: default_monitoring_port(),
        }
    }
}

fn default_address() -> String {
    String::from("localhost")
}

fn default_monitoring_port() -> u16 {
    7505
}
