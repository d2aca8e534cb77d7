pub mod cache;
pub mod config;
pub mod index;
pub mod input;
pub mod model;
pub mod multipolygon;
pub mod remote;
pub mod source;
pub mod util;
