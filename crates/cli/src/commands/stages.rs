//! Pipeline stage commands: listings and transitions for offers through
//! renewals.

use nile_pipeline::{Crm, Enriched, NewOffer, NewRenewal, PipelineError, Transition};
use nile_storage::{Account, Delivery, Execution, Offer, RejectedOffer, Renewal, Service};
use serde_json::json;

use super::{lines, or_dash, reference_date, Ctx};
use crate::{
    AccountCommands, DeliveryCommands, ExecutionCommands, OfferCommands, RejectedCommands,
    RenewalCommands, ServiceCommands,
};

pub(crate) async fn offers(crm: &Crm, command: OfferCommands, ctx: &Ctx) -> Result<(), PipelineError> {
    let pipeline = crm.pipeline();
    match command {
        OfferCommands::List => {
            let rows = pipeline.list_offers().await?;
            ctx.emit(&rows, || lines(&rows, "No pending offers.", offer_line));
        }
        OfferCommands::Add {
            client_id,
            title,
            amount,
            description,
            date,
            validity,
        } => {
            let offer = pipeline
                .add_offer(NewOffer {
                    client_id,
                    title,
                    description,
                    amount,
                    offer_date: date,
                    validity_period: validity,
                })
                .await?;
            ctx.emit(&offer, || {
                format!("Added offer {} for {}\n", offer.id, offer.amount)
            });
        }
        OfferCommands::Approve { id } => {
            let t = pipeline.approve_offer(id).await?;
            emit_transition(ctx, &t, "Approved offer", "service");
        }
        OfferCommands::Reject { id, reason } => {
            let t = pipeline.reject_offer(id, &reason).await?;
            emit_transition(ctx, &t, "Rejected offer", "rejected offer");
        }
    }
    Ok(())
}

pub(crate) async fn rejected(
    crm: &Crm,
    command: RejectedCommands,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    match command {
        RejectedCommands::List => {
            let rows = crm.pipeline().list_rejected_offers().await?;
            ctx.emit(&rows, || lines(&rows, "No rejected offers.", rejected_line));
        }
    }
    Ok(())
}

pub(crate) async fn services(
    crm: &Crm,
    command: ServiceCommands,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    match command {
        ServiceCommands::List => {
            let rows = crm.pipeline().list_services().await?;
            ctx.emit(&rows, || lines(&rows, "No approved services.", service_line));
        }
        ServiceCommands::Execute { id } => {
            let t = crm.pipeline().send_service_to_execution(id).await?;
            emit_transition(ctx, &t, "Sent service", "execution");
        }
    }
    Ok(())
}

pub(crate) async fn executions(
    crm: &Crm,
    command: ExecutionCommands,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    match command {
        ExecutionCommands::List => {
            let rows = crm.pipeline().list_executions().await?;
            ctx.emit(&rows, || lines(&rows, "Nothing in execution.", execution_line));
        }
        ExecutionCommands::Deliver { id } => {
            let t = crm.pipeline().mark_delivered(id).await?;
            emit_transition(ctx, &t, "Delivered execution", "delivery");
        }
    }
    Ok(())
}

pub(crate) async fn deliveries(
    crm: &Crm,
    command: DeliveryCommands,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    match command {
        DeliveryCommands::List => {
            let rows = crm.pipeline().list_deliveries().await?;
            ctx.emit(&rows, || lines(&rows, "No deliveries awaiting billing.", delivery_line));
        }
        DeliveryCommands::Bill { id } => {
            let t = crm.pipeline().move_to_accounts(id).await?;
            emit_transition(ctx, &t, "Billed delivery", "account");
        }
    }
    Ok(())
}

pub(crate) async fn accounts(
    crm: &Crm,
    command: AccountCommands,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    match command {
        AccountCommands::List => {
            let rows = crm.pipeline().list_accounts().await?;
            ctx.emit(&rows, || lines(&rows, "No accounts.", account_line));
        }
        AccountCommands::Pay { id } => {
            let account = crm.pipeline().record_payment(id).await?;
            ctx.emit(&account, || {
                format!(
                    "Account {} paid in full ({}, invoice {})\n",
                    account.id, account.paid_amount, account.invoice_number
                )
            });
        }
        AccountCommands::Refresh { today } => {
            let today = reference_date(today.as_deref())?;
            let changed = crm.pipeline().refresh_overdue(today).await?;
            ctx.emit(&json!({ "overdue_marked": changed }), || {
                format!("{changed} account(s) marked overdue\n")
            });
        }
    }
    Ok(())
}

pub(crate) async fn renewals(
    crm: &Crm,
    command: RenewalCommands,
    ctx: &Ctx,
) -> Result<(), PipelineError> {
    match command {
        RenewalCommands::List => {
            let rows = crm.pipeline().list_renewals().await?;
            ctx.emit(&rows, || lines(&rows, "No renewals.", renewal_line));
        }
        RenewalCommands::Add {
            client_id,
            service_title,
            amount,
            expiry,
            renewal_date,
            service_id,
        } => {
            let renewal = crm
                .pipeline()
                .add_renewal(NewRenewal {
                    client_id,
                    service_title,
                    original_service_id: service_id,
                    renewal_date,
                    expiry_date: expiry,
                    amount,
                })
                .await?;
            ctx.emit(&renewal, || {
                format!(
                    "Added renewal {} expiring {}\n",
                    renewal.id, renewal.expiry_date
                )
            });
        }
        RenewalCommands::Complete { id } => {
            let renewal = crm.pipeline().complete_renewal(id).await?;
            ctx.emit(&renewal, || format!("Renewal {} completed\n", renewal.id));
        }
        RenewalCommands::Refresh { today } => {
            let today = reference_date(today.as_deref())?;
            let lead_days = crm.settings().await?.renewal_notification_days;
            let changed = crm
                .pipeline()
                .refresh_renewal_urgency(today, lead_days)
                .await?;
            ctx.emit(&json!({ "urgent_marked": changed }), || {
                format!("{changed} renewal(s) marked urgent\n")
            });
        }
    }
    Ok(())
}

fn emit_transition(ctx: &Ctx, t: &Transition, verb: &str, target: &str) {
    ctx.emit(t, || {
        format!(
            "{verb} {} ({}) -> {target} {}\n",
            t.source_id, t.client_name, t.new_id
        )
    });
}

fn offer_line(o: &Enriched<Offer>) -> String {
    format!(
        "{:>4}  {:<7} {:<24} {:<28} {:>12}  {}",
        o.record.id, o.company_code, o.client_name, o.record.title, o.record.amount, o.record.offer_date
    )
}

fn rejected_line(r: &Enriched<RejectedOffer>) -> String {
    format!(
        "{:>4}  {:<7} {:<24} {:<28} {:>12}  {}  {}",
        r.record.id,
        r.company_code,
        r.client_name,
        r.record.title,
        r.record.amount,
        r.record.rejection_date,
        r.record.rejection_reason
    )
}

fn service_line(s: &Enriched<Service>) -> String {
    format!(
        "{:>4}  {:<7} {:<24} {:<28} {:>12}  {}",
        s.record.id,
        s.company_code,
        s.client_name,
        s.record.title,
        s.record.amount,
        or_dash(s.record.start_date.as_deref())
    )
}

fn execution_line(e: &Enriched<Execution>) -> String {
    format!(
        "{:>4}  {:<7} {:<24} {:<28} {:>12}  {}",
        e.record.id,
        e.company_code,
        e.client_name,
        e.record.title,
        e.record.amount,
        or_dash(e.record.start_date.as_deref())
    )
}

fn delivery_line(d: &Enriched<Delivery>) -> String {
    format!(
        "{:>4}  {:<7} {:<24} {:<28} {:>12}  {}",
        d.record.id, d.company_code, d.client_name, d.record.title, d.record.amount, d.record.delivery_date
    )
}

fn account_line(a: &Enriched<Account>) -> String {
    let status = serde_json::to_value(&a.record.payment_status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    format!(
        "{:>4}  {:<24} {:<24} {:>12} {:>12}  {:<8} {}",
        a.record.id,
        a.record.invoice_number,
        a.client_name,
        a.record.total_amount,
        a.record.remaining_amount,
        status,
        or_dash(a.record.due_date.as_deref())
    )
}

fn renewal_line(r: &Enriched<Renewal>) -> String {
    let status = serde_json::to_value(&r.record.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    format!(
        "{:>4}  {:<7} {:<24} {:<24} {:>12}  {}  {}",
        r.record.id,
        r.company_code,
        r.client_name,
        r.record.service_title,
        r.record.amount,
        r.record.expiry_date,
        status
    )
}
