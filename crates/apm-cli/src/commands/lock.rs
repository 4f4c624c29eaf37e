//! `apm lock status` (C8, §6).

use crate::app::App;
use crate::cli::LockCommand;
use crate::output::OutputFormat;
use apm_core::Result;

pub fn run(app: &App, command: LockCommand) -> Result<()> {
    match command {
        LockCommand::Status => status(app),
    }
}

fn status(app: &App) -> Result<()> {
    let status = apm_lock::probe(app.lock_path())?;

    match app.format {
        OutputFormat::Json => {
            #[derive(serde::Serialize)]
            struct StatusView {
                locked: bool,
                can_acquire: bool,
                holder_pid: Option<u32>,
                holder_name: Option<String>,
            }
            let view = StatusView {
                locked: status.locked,
                can_acquire: status.can_acquire,
                holder_pid: status.holder_pid,
                holder_name: status.holder_name,
            };
            println!("{}", apm_core::to_json_pretty(&view)?);
        }
        OutputFormat::Human => {
            if status.locked {
                println!(
                    "locked (pid {}, holder {})",
                    status.holder_pid.map_or("?".to_string(), |p| p.to_string()),
                    status.holder_name.as_deref().unwrap_or("unknown")
                );
            } else {
                crate::output::print_heading("free", app.color);
            }
        }
    }

    Ok(())
}
