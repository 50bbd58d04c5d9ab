use std::path::Path;

fn env_files(profile: &str) -> [&'static str; 3] {
    if profile == "production" {
        ["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        ["config/common.env", "config/dev.env", ".secrets.env"]
    }
}

/// What happened to one env file. Environment loading runs before the
/// tracing subscriber exists, so the caller logs these afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFile {
    Loaded(&'static str),
    Missing(&'static str),
}

/// Loads the env files for the active `ROCKET_PROFILE`. Later files override
/// earlier ones; missing files are skipped.
pub fn load_environment() -> Result<Vec<EnvFile>, dotenvy::Error> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

    env_files(&profile)
        .into_iter()
        .map(load_env_file)
        .collect()
}

fn load_env_file(path: &'static str) -> Result<EnvFile, dotenvy::Error> {
    if !Path::new(path).exists() {
        return Ok(EnvFile::Missing(path));
    }

    dotenvy::from_filename_override(path)?;
    Ok(EnvFile::Loaded(path))
}
