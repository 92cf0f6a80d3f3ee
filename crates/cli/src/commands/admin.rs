use std::path::Path;

use nile_pipeline::{Crm, PipelineError, SeedReport};
use serde_json::json;

use super::{reference_date, Ctx};
use crate::SettingsCommands;

pub(crate) fn cmd_init(data: &Path, seeded: &SeedReport, ctx: &Ctx) -> Result<(), PipelineError> {
    ctx.emit(
        &json!({
            "data": data.display().to_string(),
            "users_created": seeded.users_created,
            "settings_created": seeded.settings_created,
        }),
        || {
            format!(
                "Store ready at {} ({} user(s), {} setting(s) created)\n",
                data.display(),
                seeded.users_created,
                seeded.settings_created
            )
        },
    );
    Ok(())
}

pub(crate) async fn cmd_login(
    crm: &Crm,
    username: &str,
    password: &str,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    let user = crm
        .login(username, password)
        .await?
        .ok_or_else(|| PipelineError::Validation("invalid username or password".into()))?;
    ctx.emit(
        &json!({
            "id": user.id,
            "username": user.username,
            "full_name": user.full_name,
            "role": user.role,
        }),
        || format!("Welcome, {}\n", user.full_name),
    );
    Ok(())
}

pub(crate) async fn cmd_dashboard(
    crm: &Crm,
    today: Option<&str>,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    let today = reference_date(today)?;
    let summary = crm.dashboard(today).await?;
    ctx.emit(&summary, || {
        let rows = [
            ("Clients", summary.total_clients.to_string()),
            ("Pending offers", summary.pending_offers.to_string()),
            ("Active services", summary.active_services.to_string()),
            ("In execution", summary.in_execution.to_string()),
            ("Awaiting billing", summary.awaiting_billing.to_string()),
            ("Overdue accounts", summary.overdue_accounts.to_string()),
            ("Outstanding balance", summary.outstanding_balance.to_string()),
            ("Upcoming renewals", summary.upcoming_renewals.to_string()),
        ];
        rows.iter()
            .map(|(label, value)| format!("{label:<20} {value}\n"))
            .collect()
    });
    Ok(())
}

pub(crate) async fn cmd_settings(
    crm: &Crm,
    command: SettingsCommands,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    match command {
        SettingsCommands::Show => {
            let current = crm.settings().await?;
            ctx.emit(&current, || current.to_string());
        }
        SettingsCommands::Set { key, value } => {
            let row = crm.set_setting(&key, &value).await?;
            ctx.emit(&row, || format!("{} = {}\n", row.key, row.value));
        }
    }
    Ok(())
}
