use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load layered settings: `<dir>/base.yaml` first, then `APP_`-prefixed
/// environment variables with `__` as the nesting separator.
///
/// `APP_GOOGLE__CLIENT_SECRET=...` overrides `google.client_secret`. Keys in
/// `list_keys` take space-separated lists, e.g. `APP_GOOGLE__SCOPES="openid email"`.
pub fn load_layered<T: DeserializeOwned>(
    configuration_directory: &Path,
    list_keys: &[&str],
) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let environment = list_keys.iter().fold(
        config::Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(" "),
        |environment, key| environment.with_list_parse_key(key),
    );

    let settings = Cfg::builder()
        .add_source(File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(environment)
        .build()?;

    Ok(settings.try_deserialize()?)
}
