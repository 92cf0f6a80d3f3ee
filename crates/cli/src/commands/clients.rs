use nile_pipeline::{ClientUpdate, Crm, NewClient, PipelineError};
use nile_storage::Client;

use super::{lines, or_dash, Ctx};
use crate::ClientCommands;

pub(crate) async fn run(crm: &Crm, command: ClientCommands, ctx: &Ctx) -> Result<(), PipelineError> {
    let directory = crm.clients();
    match command {
        ClientCommands::List => {
            let clients = directory.list().await?;
            ctx.emit(&clients, || lines(&clients, "No clients.", client_line));
        }
        ClientCommands::Show { id } => {
            let client = directory.get(id).await?;
            ctx.emit(&client, || client_card(&client));
        }
        ClientCommands::Add {
            name,
            code,
            address,
            manager,
            phone,
            intermediary,
            intermediary_phone,
        } => {
            let client = directory
                .add(NewClient {
                    company_code: code,
                    name,
                    address,
                    manager,
                    phone,
                    intermediary,
                    intermediary_phone,
                })
                .await?;
            ctx.emit(&client, || {
                format!("Added client {} ({})\n", client.name, client.company_code)
            });
        }
        ClientCommands::Update {
            id,
            name,
            address,
            manager,
            phone,
            intermediary,
            intermediary_phone,
        } => {
            let changes = ClientUpdate {
                name,
                address,
                manager,
                phone,
                intermediary,
                intermediary_phone,
            };
            if changes.is_empty() {
                return Err(PipelineError::Validation(
                    "nothing to update; pass at least one field".into(),
                ));
            }
            let client = directory.update(id, changes).await?;
            ctx.emit(&client, || format!("Updated client {}\n", client.id));
        }
        ClientCommands::Delete { id } => {
            directory.delete(id).await?;
            ctx.emit(&serde_json::json!({ "deleted": id }), || {
                format!("Deleted client {id}\n")
            });
        }
        ClientCommands::Search { term } => {
            let clients = directory.search(&term).await?;
            ctx.emit(&clients, || lines(&clients, "No matching clients.", client_line));
        }
    }
    Ok(())
}

fn client_line(c: &Client) -> String {
    format!(
        "{:>4}  {:<7} {:<28} {:<20} {}",
        c.id,
        c.company_code,
        c.name,
        or_dash(c.manager.as_deref()),
        or_dash(c.phone.as_deref())
    )
}

fn client_card(c: &Client) -> String {
    let rows = [
        ("Id", c.id.to_string()),
        ("Code", c.company_code.clone()),
        ("Name", c.name.clone()),
        ("Address", or_dash(c.address.as_deref()).to_string()),
        ("Manager", or_dash(c.manager.as_deref()).to_string()),
        ("Phone", or_dash(c.phone.as_deref()).to_string()),
        ("Intermediary", or_dash(c.intermediary.as_deref()).to_string()),
        (
            "Intermediary phone",
            or_dash(c.intermediary_phone.as_deref()).to_string(),
        ),
        ("Created", c.created_at.clone()),
        ("Updated", c.updated_at.clone()),
    ];
    rows.iter()
        .map(|(label, value)| format!("{label:<19} {value}\n"))
        .collect()
}
