// Application state for HTTP handlers
use crate::application::reload::Reloader;
use crate::application::station_service::StationService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: StationService,
    pub reloader: Arc<Reloader>,
    pub compress_streams: bool,
}
