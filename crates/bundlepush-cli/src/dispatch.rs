use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bundlepush_core::PackageMetadata;
use bundlepush_runtime::{bundle_name, UpdateContext};
use bundlepush_security::sha256_file_hex;
use tracing::debug;

use crate::completion::write_completions_script;
use crate::render::{
    current_output_style, format_launch_lines, format_status_lines, print_section,
    render_status_line, LaunchReport, ModuleLaunch, ModuleStatus,
};
use crate::{load_config, Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();
    let Cli {
        config,
        root,
        command,
        ..
    } = cli;

    match command {
        Commands::Launch { module } => {
            let context = open_context(config.as_deref(), root, true)?;
            let report = run_launch(&context, module.as_deref())?;
            print_section(style, "launch");
            for line in format_launch_lines(&report, style) {
                println!("{line}");
            }
        }
        Commands::Ready { module } => {
            let context = open_context(config.as_deref(), root, false)?;
            context.notify_application_ready(&module)?;
            println!(
                "{}",
                render_status_line(style, "ok", &format!("{module}: update confirmed"))
            );
        }
        Commands::Status { module } => {
            let context = open_context(config.as_deref(), root, false)?;
            let names = match module {
                Some(name) => vec![name],
                None => context
                    .module_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            for name in names {
                print_section(style, &name);
                for line in format_status_lines(&collect_status(&context, &name)?) {
                    println!("{line}");
                }
            }
        }
        Commands::Install {
            module,
            bundle_dir,
            hash,
            label,
            mandatory,
        } => {
            let context = open_context(config.as_deref(), root, false)?;
            let metadata = run_install(
                &context,
                &module,
                &bundle_dir,
                hash,
                label,
                mandatory,
            )?;
            println!(
                "{}",
                render_status_line(
                    style,
                    "ok",
                    &format!(
                        "{module}: installed {} as pending update",
                        metadata.package_hash
                    )
                )
            );
        }
        Commands::Rollback { module } => {
            let context = open_context(config.as_deref(), root, false)?;
            let message = match context.rollback_current_package(&module)? {
                Some(hash) => format!("{module}: rolled back to {hash}"),
                None => format!("{module}: no previous package, running binary bundle"),
            };
            println!("{}", render_status_line(style, "warn", &message));
        }
        Commands::Clear { module } => {
            let context = open_context(config.as_deref(), root, false)?;
            context.clear_updates(&module)?;
            println!(
                "{}",
                render_status_line(style, "ok", &format!("{module}: updates cleared"))
            );
        }
        Commands::PackageFolder { module } => {
            let context = open_context(config.as_deref(), root, false)?;
            match context.package_folder(&module)? {
                Some(folder) => println!("{}", folder.display()),
                None => bail!("no package installed for module '{module}'"),
            }
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            write_completions_script(shell, &mut stdout)?;
        }
    }

    Ok(())
}

/// `restart` runs restart reconciliation, as a host start would. Every other
/// command edits storage in place.
pub(crate) fn open_context(
    config_path: Option<&Path>,
    root: Option<PathBuf>,
    restart: bool,
) -> Result<UpdateContext> {
    let config = load_config(config_path, root)?;
    let provider = config
        .identity_provider()
        .context("failed to select binary identity source")?;
    let opened = if restart {
        UpdateContext::open(config, provider)
    } else {
        UpdateContext::attach(config, provider)
    };
    opened.context("failed to open update context")
}

pub(crate) fn run_launch(context: &UpdateContext, module: Option<&str>) -> Result<LaunchReport> {
    let names: Vec<String> = match module {
        Some(name) => vec![name.to_string()],
        None => context
            .module_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    let mut modules = Vec::with_capacity(names.len());
    for name in names {
        let state = context.startup_state(&name)?;
        let bundle = context
            .resolve_bundle_for_module(&name)
            .with_context(|| format!("failed to resolve bundle for module '{name}'"))?;
        modules.push(ModuleLaunch {
            module: name,
            state,
            bundle,
        });
    }

    Ok(LaunchReport {
        modules,
        did_update: context.did_update(),
        is_running_binary_version: context.is_running_binary_version(),
        need_to_report_rollback: context.need_to_report_rollback(),
    })
}

pub(crate) fn collect_status(context: &UpdateContext, name: &str) -> Result<ModuleStatus> {
    let module = context.module(name)?;
    Ok(ModuleStatus {
        module: name.to_string(),
        current: module.packages().current_package_hash()?,
        previous: module.packages().previous_package_hash()?,
        pending: module.settings().pending_update()?,
        failed: module.settings().failed_updates()?,
    })
}

pub(crate) fn run_install(
    context: &UpdateContext,
    module: &str,
    bundle_dir: &Path,
    hash: Option<String>,
    label: Option<String>,
    mandatory: bool,
) -> Result<PackageMetadata> {
    let hash = match hash {
        Some(hash) => hash,
        None => {
            let bundle = bundle_dir.join(bundle_name(module));
            sha256_file_hex(&bundle)
                .with_context(|| format!("failed to hash bundle {}", bundle.display()))?
        }
    };
    debug!(module, %hash, dir = %bundle_dir.display(), "installing package");

    let identity = context.binary_identity()?;
    let mut metadata = PackageMetadata::new(hash)
        .with_binary(identity.version, identity.build_timestamp)
        .with_mandatory(mandatory);
    if let Some(label) = label {
        metadata = metadata.with_label(label);
    }

    context.install_package(module, &metadata, bundle_dir)?;
    Ok(metadata)
}
