//! # Bridge Protocol Constants
//!
//! Wire-level values shared by producers, the bridge and viewers. These must
//! stay stable: the visualization frontend switches on the `what` strings and
//! producer scripts compare the status replies byte for byte.

/// Frame delimiter on the producer stream
pub const FRAME_DELIMITER: u8 = b'\0';

/// Envelope discriminator field
pub const WHAT_FIELD: &str = "what";

/// Target connection id field for targeted delivery
pub const CLIENT_FIELD: &str = "client";

/// Known `what` values
pub mod what {
    pub const GET_CLIENTS_ID: &str = "get_clientsID";
    pub const CLIENTS_ID: &str = "clientsID";
    pub const UPDATE_CAM: &str = "update_cam";
    pub const UPDATE_ORBITAL: &str = "update_orbital";
    pub const UPDATE_PATH: &str = "update_path";
    pub const UPDATE_OBJECTS: &str = "update_objects";
    pub const UPDATE_POSITIONS: &str = "update_positions";
    pub const UPDATE_MAP: &str = "update_map";
    /// Greeting sent to a viewer once it is registered
    pub const CONNECTED: &str = "connected";
}

/// Status strings written back to producers
pub mod status {
    pub const SUCCESS: &str = "Success";
    pub const NO_CONNECTED_SOCKETS: &str = "No connected sockets";
    pub const CLIENT_NOT_FOUND_PREFIX: &str = "Client not found: ";
}

/// Separator for the legacy plain-text clients list
pub const CLIENTS_LIST_SEPARATOR: &str = ";";

/// Default cap on a single buffered frame (1 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Read buffer size for producer sockets
pub const READ_CHUNK_SIZE: usize = 8192;
