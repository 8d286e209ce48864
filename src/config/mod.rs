//! Config module (modularized).
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{CONFIG_ENV, config_path, default_config_path, path_has_symlink_ancestor};
pub use types::{Config, DEFAULT_STALE_MINUTES, DifferKind, LogLevel};
pub use xml::{ConfigLoad, create_template_config, load_config, load_config_from_xml_path, parse_config_xml};

/// Built-in bases used when neither the config file nor the CLI names them.
pub const SOURCE_BASE_DEFAULT: &str = "/srv/tree_move/incoming";
pub const DEST_BASE_DEFAULT: &str = "/srv/tree_move/library";
