use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the per-account index databases. If not set
    /// then an in-memory index will be used.
    pub data_dir: Option<PathBuf>,
    /// Relay hints used when a share pointer carries none.
    pub default_relays: Vec<String>,
    /// Capacity of the change-notification buffer. Slow consumers
    /// lose the oldest entries once this fills.
    pub change_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_relays: vec![
                "wss://relay.damus.io".to_string(),
                "wss://nos.lol".to_string(),
            ],
            change_buffer: 256,
        }
    }
}
