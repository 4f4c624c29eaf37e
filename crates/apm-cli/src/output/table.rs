//! Human-readable `ChangeSet` rendering: a summary table plus a byte-size
//! footer line, in the shape `install`/`remove`/`dry-run` all share.

use apm_planner::ChangeSet;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

fn add_rows(table: &mut Table, label: &str, color: Color, names: &[String]) {
    for name in names {
        table.add_row(vec![Cell::new(label).fg(color), Cell::new(name)]);
    }
}

/// Renders `plan` as a table of per-package actions followed by a
/// download/install size summary. Returns an empty-but-valid table when
/// the plan changes nothing.
#[must_use]
pub fn render_change_set(plan: &ChangeSet) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Action", "Package"]);

    add_rows(&mut table, "install", Color::Green, &plan.new_installed);
    add_rows(&mut table, "upgrade", Color::Cyan, &plan.upgraded);
    add_rows(&mut table, "reinstall", Color::Yellow, &plan.reinstalled);
    add_rows(&mut table, "remove", Color::Red, &plan.removed);
    add_rows(&mut table, "auto-install", Color::Green, &plan.extra_installed);
    add_rows(&mut table, "auto-remove", Color::Red, &plan.extra_removed);

    let mut out = table.to_string();
    out.push('\n');
    out.push_str(&format!(
        "download: {}, install: {}\n",
        human_size(plan.download_size),
        human_size(plan.install_size)
    ));
    if !plan.not_upgraded.is_empty() {
        out.push_str(&format!("held back: {}\n", plan.not_upgraded.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_installs_and_footer() {
        let plan = ChangeSet {
            new_installed: vec!["vim".to_string()],
            download_size: 2048,
            install_size: 4096,
            ..Default::default()
        };
        let rendered = render_change_set(&plan);
        assert!(rendered.contains("vim"));
        assert!(rendered.contains("2.0 KiB"));
    }

    #[test]
    fn human_size_stays_in_bytes_under_a_kib() {
        assert_eq!(human_size(512), "512 B");
    }
}
