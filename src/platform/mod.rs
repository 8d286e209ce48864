//! Platform-specific helpers (Unix).
//! Secure creation of config/log files and directory probes, kept in one place
//! so callers never open sensitive files with default permissions.

mod common_unix;
mod temp;
mod unix;

pub use unix::{
    is_writable_probe, open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600,
    write_config_secure_new_0600,
};
