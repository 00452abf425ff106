use anyhow::{bail, Context as _, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;
use futures_util::StreamExt;
use pass_engine::dashboard::Dashboard;
use pass_engine::service::RequestChange;
use pass_engine::DocumentStore;
use passes::{PassDraft, PassType, Role};
use serde_json::json;
use tracing::warn;

use super::{print_notices, table, Backend, Context};

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// `outing` or `home_visit`
    #[arg(long = "type", value_name = "TYPE")]
    pub pass_type: PassType,
    #[arg(long)]
    pub reason: String,
    /// Departure date (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,
    /// Return date, required for home visits
    #[arg(long)]
    pub return_date: Option<NaiveDate>,
    #[arg(long)]
    pub room: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
    /// Show requests you have already approved or declined
    #[arg(long)]
    pub history: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Exit after this many changes
    #[arg(long)]
    pub count: Option<usize>,
}

/// Print the dashboard's notices and fail the process if any was an error.
fn finish(dash: &mut Dashboard<dyn DocumentStore>) -> Result<()> {
    if print_notices(dash.take_notices()) {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn submit(ctx: &Context, args: SubmitArgs) -> Result<()> {
    let session = ctx.session()?;
    if session.role() != Role::Student {
        bail!("only students can submit pass requests");
    }
    let service = ctx.service().await?;
    let draft = PassDraft {
        pass_type: args.pass_type,
        reason: args.reason,
        date: args.date,
        return_date: args.return_date,
        room_number: args.room,
    };
    let request = service.submit(&session.user, draft, Utc::now()).await?;

    println!("Submitted {} request {}", request.pass_type, request.id);
    if request.pass_type.needs_hod() {
        match &request.assigned_hod {
            Some(hod) => println!("  HOD: {}", hod),
            None => println!("  HOD: unassigned"),
        }
    }
    match &request.assigned_warden {
        Some(warden) => println!("  warden: {}", warden),
        None => println!("  warden: unassigned"),
    }
    Ok(())
}

pub async fn list(ctx: &Context, args: ListArgs) -> Result<()> {
    let now = Utc::now();
    let service = ctx.service().await?;
    let mut dash = Dashboard::new(service.clone(), ctx.session()?);
    let policy = service.config().expiry;

    let items = if args.history {
        service.history(dash.user(), now).await?
    } else {
        dash.mount(now).await;
        dash.items().to_vec()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No requests");
    } else {
        println!("{}", table::render(&items, &policy, now));
    }
    finish(&mut dash)
}

pub async fn approve(ctx: &Context, id: &str) -> Result<()> {
    let mut dash = ctx.dashboard().await?;
    dash.approve(id, Utc::now()).await;
    finish(&mut dash)
}

pub async fn decline(ctx: &Context, id: &str, reason: Option<String>) -> Result<()> {
    let mut dash = ctx.dashboard().await?;
    dash.decline(id, reason, Utc::now()).await;
    finish(&mut dash)
}

pub async fn approve_all(ctx: &Context) -> Result<()> {
    let now = Utc::now();
    let mut dash = ctx.dashboard().await?;
    dash.refresh(now).await;
    dash.approve_all(now).await;
    finish(&mut dash)
}

pub async fn decline_all(ctx: &Context, reason: Option<String>) -> Result<()> {
    let now = Utc::now();
    let mut dash = ctx.dashboard().await?;
    dash.refresh(now).await;
    dash.decline_all(reason, now).await;
    finish(&mut dash)
}

pub async fn delete(ctx: &Context, id: &str) -> Result<()> {
    let mut dash = ctx.dashboard().await?;
    dash.delete(id).await;
    finish(&mut dash)
}

pub async fn sweep(ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let report = service.cleanup(Utc::now()).await.context("sweep failed")?;
    println!(
        "Scanned {}, deleted {}, failed {}, unreadable {}",
        report.scanned, report.deleted, report.failed, report.unreadable
    );
    Ok(())
}

pub async fn watch(ctx: &Context, args: WatchArgs) -> Result<()> {
    if ctx.backend() == Backend::File {
        warn!("the file backend only reports changes made by this process");
    }
    let service = ctx.service().await?;
    let mut changes = service.subscribe().await?;
    let mut seen = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            change = changes.next() => {
                let Some(change) = change else { return Ok(()) };
                let line = match change {
                    RequestChange::Upserted(request) => json!({"event": "upserted", "request": request}),
                    RequestChange::Removed { id } => json!({"event": "removed", "id": id}),
                };
                println!("{}", line);
                seen += 1;
                if args.count.is_some_and(|n| seen >= n) {
                    return Ok(());
                }
            }
        }
    }
}
