pub mod availability;
pub mod backend;
pub mod booking_desk;
pub mod configuration;
pub mod configuration_handler;
pub mod dev_server;
pub mod error;
pub mod local_documents;
pub mod overlay;
pub mod persistence;
pub mod rest_client;
pub mod schedule;
#[cfg(test)]
mod testutils;
pub mod time_format;
pub mod types;
