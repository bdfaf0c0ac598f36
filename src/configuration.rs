use std::time::Duration;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn backend_url(&self) -> String;
    fn auth_token(&self) -> Option<String>;
    fn flush_delay(&self) -> Duration;
    fn request_timeout(&self) -> Duration;
    fn port(&self) -> String;
}
