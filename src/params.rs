use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "broker-bootstrap")]
pub struct Params {
    /// Path of the persisted INI configuration. Created with defaults on
    /// first run.
    #[arg(long, env = "BROKER_BOOTSTRAP_CONFIG", default_value = "./resources/settings.ini")]
    pub config: String,

    /// Name of the broker service/unit to detect and, if needed, start.
    #[arg(long, env = "BROKER_BOOTSTRAP_SERVICE", default_value = "mosquitto")]
    pub service: String,
}
