use clap::Parser;

mod commandline;
mod defaults;
mod file;
mod primitives;

use commandline::{Args, Output};
use config::Environment;
use defaults::Defaults;

pub(crate) use commandline::Operation;
pub(crate) use file::{Buckets, ConfigFile as Configuration, OpenTelemetry, Tracing};
#[cfg(test)]
pub(crate) use file::VideoThumbnail;
pub(crate) use primitives::{Filesystem, LogFormat, ObjectStorage, Store, Targets};

/// Source for vod-rs configuration when embedding as a library
pub enum ConfigSource<P, T> {
    /// A File source for vod-rs configuration
    File { path: P },
    /// An in-memory source for vod-rs configuration
    Memory { values: T },
    /// No configuration
    Empty,
}

/// A resolved configuration together with the operation to perform
pub struct VodConfiguration {
    pub(crate) config: Configuration,
    pub(crate) operation: Operation,
}

impl<T> ConfigSource<std::path::PathBuf, T>
where
    T: serde::Serialize,
{
    /// Create a new memory source
    pub fn memory(values: T) -> Self {
        Self::Memory { values }
    }
}

impl<P> ConfigSource<P, ()>
where
    P: AsRef<std::path::Path>,
{
    /// Create a new file source
    pub fn file(path: P) -> Self {
        Self::File { path }
    }
}

impl ConfigSource<std::path::PathBuf, ()> {
    /// Create a new empty source
    pub fn empty() -> Self {
        Self::Empty
    }
}

pub(crate) fn configure_without_clap<P, T, Q>(
    source: ConfigSource<P, T>,
    save_to: Option<Q>,
) -> color_eyre::Result<VodConfiguration>
where
    P: AsRef<std::path::Path>,
    T: serde::Serialize,
    Q: AsRef<std::path::Path>,
{
    let config =
        config::Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = match source {
        ConfigSource::Empty => config,
        ConfigSource::File { path } => config.add_source(config::File::from(path.as_ref())),
        ConfigSource::Memory { values } => config.add_source(config::Config::try_from(&values)?),
    };

    let built = config
        .add_source(
            Environment::with_prefix("VOD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let operation = Operation::Run;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(VodConfiguration { config, operation })
}

pub(crate) fn configure() -> color_eyre::Result<VodConfiguration> {
    let Output {
        config_format,
        operation,
        save_to,
        config_file,
    } = Args::parse().into_output();

    let config =
        config::Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(
            Environment::with_prefix("VOD")
                .separator("__")
                .try_parsing(true),
        )
        .add_source(config::Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(VodConfiguration { config, operation })
}
