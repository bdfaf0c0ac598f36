use crate::configuration::Configuration;
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "clinic_schedule", about = "Clinic availability and booking schedule")]
pub struct Arguments {
    /// Base URL of the JSON-document backend
    #[arg(long, env = "SCHEDULE_BACKEND_URL", default_value = "http://127.0.0.1:3000")]
    backend_url: String,

    #[arg(long, env = "SCHEDULE_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Quiet period before toggled slots are saved
    #[arg(long, env = "SCHEDULE_FLUSH_DELAY_SECS", default_value_t = 120)]
    flush_delay_secs: u64,

    #[arg(long, env = "SCHEDULE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Port of the local document server
    #[arg(long, env = "SCHEDULE_PORT", default_value = "3000")]
    port: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print every date's slots with their booking state
    Show,
    /// Toggle one or more slots of a date and save
    Toggle {
        date: String,
        #[arg(required = true)]
        times: Vec<String>,
    },
    /// Read `toggle <date> <time>` lines from stdin; Ctrl-C saves and exits
    Watch,
    /// Request a booking for an open slot
    Book {
        date: String,
        time: String,
        name: String,
        phone: String,
    },
    /// Move a booking to another status
    Status { id: String, status: String },
    /// Run the local document server with an example schedule
    Serve {
        #[arg(long, default_value_t = 5)]
        days: i64,
    },
}

#[derive(Debug, Clone)]
pub struct ConfigurationHandler {
    arguments: Arguments,
}

impl ConfigurationHandler {
    /// Loads `.env` if present, then parses command line and environment.
    pub fn parse_arguments() -> Self {
        dotenvy::dotenv().ok();
        Self {
            arguments: Arguments::parse(),
        }
    }

    pub fn from_arguments(arguments: Arguments) -> Self {
        Self { arguments }
    }

    pub fn command(&self) -> &Command {
        &self.arguments.command
    }
}

impl Configuration for ConfigurationHandler {
    fn backend_url(&self) -> String {
        self.arguments.backend_url.clone()
    }

    fn auth_token(&self) -> Option<String> {
        self.arguments.auth_token.clone()
    }

    fn flush_delay(&self) -> Duration {
        Duration::from_secs(self.arguments.flush_delay_secs)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.arguments.request_timeout_secs)
    }

    fn port(&self) -> String {
        self.arguments.port.clone()
    }
}
