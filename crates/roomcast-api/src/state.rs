use std::sync::Arc;

use roomcast_db::Database;
use roomcast_gateway::{Dispatcher, RoomRelay};

use crate::files::FileService;

pub type AppState = Arc<AppStateInner>;

/// Everything the handlers need, built once at startup.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub relay: RoomRelay,
    pub files: FileService,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> AppState {
        Arc::new(Self {
            relay: RoomRelay::new(db.clone(), dispatcher),
            files: FileService::new(db.clone()),
            db,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.relay.dispatcher()
    }
}
