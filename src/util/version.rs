pub const APP_NAME: &str = "Gunsmith Advisor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");

pub fn version_label() -> String {
    if let Some(tag) = GIT_TAG {
        tag.to_string()
    } else {
        format!("v{}", APP_VERSION)
    }
}

/// Stamped into every export so a record can be traced back to the build that wrote it.
pub fn generator_label() -> String {
    format!("{} {}", APP_NAME, version_label())
}
