/// Parses the config file path from command-line arguments
pub fn get_config_path(default: &str) -> String {
    std::env::args().nth(1).unwrap_or_else(|| default.to_string())
}
