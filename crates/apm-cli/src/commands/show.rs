//! `apm show <name>`: a read-only Universe lookup. Not a Planner call —
//! nothing here touches Mark State.

use crate::app::App;
use crate::output::OutputFormat;
use apm_core::{Error, Result};
use serde::Serialize;

#[derive(Serialize)]
struct VersionView {
    version: String,
    installed: bool,
    download_size: u64,
    installed_size: u64,
    architecture: String,
    section: String,
}

#[derive(Serialize)]
struct PackageView {
    name: String,
    essential: bool,
    auto_installed: bool,
    installed_version: Option<String>,
    versions: Vec<VersionView>,
}

pub fn run(app: &App, name: &str) -> Result<()> {
    let universe = app.open_universe()?;
    let view = universe.view();

    let id = view
        .find(name)
        .ok_or_else(|| Error::package_not_found(name, "no package or provider with this name"))?;
    let package = view.package(id);

    let versions = package
        .versions
        .iter()
        .map(|&version_id| {
            let version = view.version(version_id);
            VersionView {
                version: version.version.clone(),
                installed: package.current_version == Some(version_id),
                download_size: version.download_size,
                installed_size: version.installed_size,
                architecture: version.architecture.clone(),
                section: version.section.clone(),
            }
        })
        .collect();

    let out = PackageView {
        name: package.name.clone(),
        essential: package.essential,
        auto_installed: package.auto_installed,
        installed_version: package
            .current_version
            .map(|id| view.version(id).version.clone()),
        versions,
    };

    match app.format {
        OutputFormat::Json => {
            println!("{}", apm_core::to_json_pretty(&out)?);
        }
        OutputFormat::Human => {
            crate::output::print_heading(&out.name, app.color);
            println!("essential: {}", out.essential);
            println!("auto-installed: {}", out.auto_installed);
            println!(
                "installed version: {}",
                out.installed_version.as_deref().unwrap_or("(none)")
            );
            for v in &out.versions {
                let marker = if v.installed { "*" } else { " " };
                println!(
                    "{marker} {} ({}, {} download, {} installed)",
                    v.version, v.architecture, v.download_size, v.installed_size
                );
            }
        }
    }

    Ok(())
}
