//! Command-line and environment configuration.

use crate::cycle::SleepPolicy;
use crate::duration::parse_duration;
use crate::publish::{BrokerSettings, Topics};
use clap::Parser;
use std::time::Duration;

/// Runtime configuration, read once at startup.
///
/// Every flag can also be set through the environment variable named next to
/// it, or through a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Config {
    /// MQTT broker host name or IP address.
    #[arg(long, env = "MQTT_HOST")]
    pub mqtt_host: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    /// Username for brokers that require authentication.
    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "airthings-wave")]
    pub mqtt_client_id: String,

    /// Prefix for every published topic, e.g. `airthings/temperature`.
    #[arg(long, env = "TOPIC_NAMESPACE", default_value = "airthings")]
    pub topic_namespace: String,

    /// Bluetooth adapter to use, e.g. `hci1`. Defaults to the system default
    /// adapter.
    #[arg(long, env = "BLUETOOTH_ADAPTER")]
    pub adapter: Option<String>,

    /// How long to listen for advertisements in each cycle.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, env = "SCAN_WINDOW", default_value = "30s", value_parser = parse_duration)]
    pub scan_window: Duration,

    /// How long to wait for the network before giving up on publishing.
    #[arg(long, env = "NETWORK_WAIT", default_value = "30s", value_parser = parse_duration)]
    pub network_wait: Duration,

    #[arg(long, env = "NETWORK_POLL", default_value = "500ms", value_parser = parse_duration)]
    pub network_poll: Duration,

    /// Time allowed for the broker to accept a connection or to close one.
    #[arg(long, env = "BROKER_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub broker_timeout: Duration,

    /// Sleep after a failed cycle.
    #[arg(long, env = "RETRY_INTERVAL", default_value = "30s", value_parser = parse_duration)]
    pub retry_interval: Duration,

    /// Sleep after a successful cycle.
    #[arg(long, env = "CYCLE_INTERVAL", default_value = "1h", value_parser = parse_duration)]
    pub cycle_interval: Duration,

    /// Run a single cycle and exit with its status instead of looping.
    #[arg(long, env = "ONCE")]
    pub once: bool,
}

impl Config {
    pub fn broker_settings(&self) -> BrokerSettings {
        BrokerSettings {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            timeout: self.broker_timeout,
        }
    }

    pub fn topics(&self) -> Topics {
        Topics::new(self.topic_namespace.as_str())
    }

    pub fn sleep_policy(&self) -> SleepPolicy {
        SleepPolicy {
            retry_interval: self.retry_interval,
            cycle_interval: self.cycle_interval,
        }
    }
}
