use chrono::{DateTime, Utc};
use passes::expiry::{DisplayState, ExpiryPolicy};
use passes::PassRequest;
use tabled::{settings::style::Style, Table, Tabled};

#[derive(Debug, Tabled)]
struct PassRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TYPE")]
    pass_type: String,
    #[tabled(rename = "STUDENT")]
    student: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "DATES")]
    dates: String,
    #[tabled(rename = "REASON")]
    reason: String,
    #[tabled(rename = "NOTE")]
    note: String,
}

fn hours(d: chrono::Duration) -> String {
    let h = d.num_hours();
    if h > 0 {
        format!("{}h", h)
    } else {
        format!("{}m", d.num_minutes().max(0))
    }
}

fn note(req: &PassRequest, policy: &ExpiryPolicy, now: DateTime<Utc>) -> String {
    match policy.display_state(req, now) {
        DisplayState::Urgent => format!("deleted in {}", hours(policy.time_until_deletion(req, now))),
        DisplayState::PassExpired => "pass expired".to_string(),
        DisplayState::Stale => "awaiting cleanup".to_string(),
        DisplayState::Active => match req.expires_at {
            Some(until) => format!("valid until {}", until.format("%Y-%m-%d %H:%M")),
            None => String::new(),
        },
    }
}

fn row(req: &PassRequest, policy: &ExpiryPolicy, now: DateTime<Utc>) -> PassRow {
    let dates = match (req.date, req.return_date) {
        (Some(from), Some(to)) => format!("{} .. {}", from, to),
        (Some(from), None) => from.to_string(),
        _ => "-".to_string(),
    };
    PassRow {
        id: req.id.clone(),
        pass_type: req.pass_type.to_string(),
        student: req
            .requester_name
            .clone()
            .unwrap_or_else(|| req.requester_id.clone()),
        status: req.status.to_string(),
        dates,
        reason: req.reason.clone(),
        note: note(req, policy, now),
    }
}

pub fn render(requests: &[PassRequest], policy: &ExpiryPolicy, now: DateTime<Utc>) -> String {
    let rows: Vec<PassRow> = requests.iter().map(|r| row(r, policy, now)).collect();
    Table::new(rows).with(Style::psql()).to_string()
}
