use std::sync::Arc;

use crate::api::KoboClient;
use crate::config::Config;
use crate::relay::Relay;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub client: KoboClient,
    pub relay: Option<Relay>,
}
