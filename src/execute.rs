use anyhow::{Context, Result};
use tracing::info;
use toolsetup::config::{Overrides, Settings, SettingsFile, SourceInputs};
use toolsetup::global::cache::{clean_cache, LocalCacheStore};
use toolsetup::global::utils::get_global_config_file;
use toolsetup::installer::Installer;
use toolsetup::registry::HttpMetadataSource;
use toolsetup::search_path::SearchPath;
use toolsetup::util::{http_client, HttpDownloader, SystemCommandRunner};
use crate::cli::{SettingsArgs, SetupCommand, SourceArgs, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    let settings = load_settings(&cli.settings)?;
    let inputs = source_inputs(&cli.source);

    let client = http_client()?;
    let metadata = HttpMetadataSource::new(&settings.metadata_url, client.clone());
    let downloader = HttpDownloader::new(client);
    let cache = LocalCacheStore::new(&settings.cache_dir);
    let runner = SystemCommandRunner;
    let installer = Installer::new(&settings, &metadata, &downloader, &cache, &runner);

    match cli.command.unwrap_or(SetupCommand::Install) {
        SetupCommand::Install => execute_install(&installer, &settings, &inputs),
        SetupCommand::Resolve => execute_resolve(&installer, &inputs),
        SetupCommand::CacheKey => execute_cache_key(&installer, &inputs),
        SetupCommand::CleanCache => {
            clean_cache(&cache)?;
            info!(root = %cache.root().display(), "Cache cleaned");
            Ok(())
        }
    }
}

fn load_settings(args: &SettingsArgs) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => SettingsFile::load(path)
            .with_context(|| format!("Could not read settings file {}", path.display()))?,
        None => SettingsFile::load_or_default(get_global_config_file()?)?,
    };
    let overrides = Overrides {
        tool_name: args.tool_name.clone(),
        metadata_url: args.metadata_url.clone(),
        cache_dir: args.cache_dir.clone(),
        temp_root: args.temp_root.clone(),
        path_file: args.path_file.clone(),
        output_file: args.output_file.clone(),
    };
    Ok(Settings::resolve(file, overrides)?)
}

fn source_inputs(args: &SourceArgs) -> SourceInputs {
    let tool_args = args.args.split_whitespace().map(str::to_string).collect();
    SourceInputs::new(&args.tool_version, args.execute).with_args(tool_args)
}

pub fn execute_install(installer: &Installer, settings: &Settings, inputs: &SourceInputs) -> Result<()> {
    let mut search_path = SearchPath::from_env();
    let result = installer.install(inputs, &mut search_path)?;
    info!(
        path = %result.install_path.display(),
        cache_hit = result.restored_from_cache,
        "Installed {} {}", result.tool_name, result.resolved_version
    );
    if let Some(output_file) = &settings.output_file {
        result.write_outputs(output_file)?;
    }
    if inputs.execute {
        let output = installer.invoke(&inputs.args, &search_path)?;
        if !output.is_empty() {
            println!("{}", output);
        }
    }
    Ok(())
}

pub fn execute_resolve(installer: &Installer, inputs: &SourceInputs) -> Result<()> {
    let plan = installer.plan(&inputs.version)?;
    println!("buildId: {}", plan.release.build_id);
    println!("version: {}", plan.release.version);
    println!("path: {}", plan.install_path.display());
    match plan.release.asset_for(&plan.target) {
        Ok(asset) => println!("url: {}", asset.url),
        Err(e) => println!("url: none ({e})"),
    }
    Ok(())
}

pub fn execute_cache_key(installer: &Installer, inputs: &SourceInputs) -> Result<()> {
    let plan = installer.plan(&inputs.version)?;
    println!("{}", plan.cache_key);
    Ok(())
}
