use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use bundlepush_core::{PackageMetadata, PendingUpdateRecord};
use bundlepush_runtime::{LifecycleState, ResolvedBundle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModuleLaunch {
    pub(crate) module: String,
    pub(crate) state: LifecycleState,
    pub(crate) bundle: ResolvedBundle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LaunchReport {
    pub(crate) modules: Vec<ModuleLaunch>,
    pub(crate) did_update: bool,
    pub(crate) is_running_binary_version: bool,
    pub(crate) need_to_report_rollback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModuleStatus {
    pub(crate) module: String,
    pub(crate) current: Option<String>,
    pub(crate) previous: Option<String>,
    pub(crate) pending: Option<PendingUpdateRecord>,
    pub(crate) failed: Vec<PackageMetadata>,
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "err" => "[ERR]",
                _ => "[..]",
            };
            format!("{badge} {message}")
        }
    }
}

pub(crate) fn print_section(style: OutputStyle, title: &str) {
    if style == OutputStyle::Plain {
        return;
    }
    println!("{}", colorize(section_style(), &format!("== {title} ==")));
}

pub(crate) fn format_launch_lines(report: &LaunchReport, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.modules.len() + 3);
    for launch in &report.modules {
        let status = match (launch.state, launch.bundle.is_binary) {
            (LifecycleState::PendingCrashed, _) => "warn",
            (_, false) => "ok",
            (_, true) => "..",
        };
        let source = if launch.bundle.is_binary {
            "binary"
        } else {
            "update"
        };
        lines.push(render_status_line(
            style,
            status,
            &format!(
                "{}: {} bundle {} (state={})",
                launch.module,
                source,
                launch.bundle.path,
                lifecycle_label(launch.state)
            ),
        ));
    }
    lines.push(format!("did_update={}", report.did_update));
    lines.push(format!(
        "is_running_binary_version={}",
        report.is_running_binary_version
    ));
    lines.push(format!(
        "need_to_report_rollback={}",
        report.need_to_report_rollback
    ));
    lines
}

pub(crate) fn format_status_lines(status: &ModuleStatus) -> Vec<String> {
    let mut lines = vec![
        format!("module: {}", status.module),
        format!("current: {}", status.current.as_deref().unwrap_or("-")),
        format!("previous: {}", status.previous.as_deref().unwrap_or("-")),
    ];
    lines.push(match &status.pending {
        Some(pending) => format!(
            "pending: {} (loading={})",
            pending.hash,
            pending.is_loading
        ),
        None => "pending: -".to_string(),
    });
    if status.failed.is_empty() {
        lines.push("failed: -".to_string());
    } else {
        for failed in &status.failed {
            let label = failed.label().unwrap_or("unlabeled");
            lines.push(format!("failed: {} ({label})", failed.package_hash));
        }
    }
    lines
}

pub(crate) fn lifecycle_label(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::NoPendingUpdate => "no-pending-update",
        LifecycleState::PendingFirstRun => "pending-first-run",
        LifecycleState::PendingConfirmed => "pending-confirmed",
        LifecycleState::PendingCrashed => "rolled-back",
        LifecycleState::SupersededByBinary => "superseded-by-binary",
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
