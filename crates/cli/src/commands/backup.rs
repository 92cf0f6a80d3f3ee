use nile_pipeline::{Crm, PipelineError};
use serde_json::json;

use super::Ctx;
use crate::BackupCommands;

pub(crate) async fn run(crm: &Crm, command: BackupCommands, ctx: &Ctx) -> Result<(), PipelineError> {
    match command {
        BackupCommands::Export { path } => {
            let summary = crm.export_backup(&path).await?;
            ctx.emit(&summary, || {
                format!(
                    "Backed up {} record(s) to {}\n",
                    summary.total(),
                    path.display()
                )
            });
        }
        BackupCommands::Restore { path } => {
            let summary = crm.restore_backup(&path).await?;
            ctx.emit(&summary, || {
                let mut text = format!(
                    "Restored backup from {} ({} record(s))\n",
                    summary.backup_date,
                    summary.total()
                );
                for (collection, count) in &summary.collections {
                    text.push_str(&format!("  {collection:<16} {count}\n"));
                }
                text
            });
        }
        BackupCommands::Csv { path } => {
            crm.export_tabular(&path).await?;
            ctx.emit(&json!({ "path": path.display().to_string() }), || {
                format!("Wrote {}\n", path.display())
            });
        }
    }
    Ok(())
}
