pub mod areas;
pub mod bbox_error;
pub mod chunks;
pub mod resolve;
