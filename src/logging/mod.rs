pub mod logger;

pub use logger::{init_logger, remove_color_codes};
