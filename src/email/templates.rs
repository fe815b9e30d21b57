use crate::db::models::{ReservationRequest, ReservationStatus, Restaurant};
use crate::email::EmailMessage;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn message(to: Vec<String>, subject: String, lines: &[String]) -> EmailMessage {
    let text = lines.join("\n\n");
    let html = lines
        .iter()
        .map(|l| format!("<p>{}</p>", escape_html(l)))
        .collect::<Vec<_>>()
        .join("\n");
    EmailMessage { to, subject, html, text }
}

pub fn claim_received(admin: &str, restaurant: &Restaurant, claimant_email: &str) -> EmailMessage {
    let mut lines = vec![
        format!("{} has requested to claim {} ({}).", claimant_email, restaurant.name, restaurant.number),
    ];
    if let Some(msg) = restaurant.claim_message.as_deref().filter(|m| !m.is_empty()) {
        lines.push(format!("Message: {}", msg));
    }
    lines.push("Review it from the admin claims queue.".to_string());
    message(
        vec![admin.to_string()],
        format!("New claim request: {}", restaurant.name),
        &lines,
    )
}

/// `trial_days` is `Some` only when approval opened a new trial.
pub fn claim_approved(
    to: &str,
    restaurant: &Restaurant,
    dashboard_url: &str,
    trial_days: Option<i64>,
) -> EmailMessage {
    let mut lines = vec![format!("Your claim for {} has been approved.", restaurant.name)];
    if let Some(days) = trial_days {
        lines.push(format!("Your {}-day Pro trial has started.", days));
    }
    lines.push(format!("Open your dashboard: {}", dashboard_url));
    message(
        vec![to.to_string()],
        format!("You now manage {} on BiteReserve", restaurant.name),
        &lines,
    )
}

pub fn claim_rejected(to: &str, restaurant: &Restaurant) -> EmailMessage {
    message(
        vec![to.to_string()],
        format!("Your claim for {}", restaurant.name),
        &[
            format!("We could not verify your claim for {}.", restaurant.name),
            "Reply to this email with proof of ownership and we will take another look.".to_string(),
        ],
    )
}

pub fn new_reservation(to: Vec<String>, restaurant: &Restaurant, reservation: &ReservationRequest) -> EmailMessage {
    let mut lines = vec![
        format!("New reservation request for {}.", restaurant.name),
        format!(
            "{} for {} on {}",
            reservation.guest_name,
            reservation.party_size,
            reservation.requested_for.format("%Y-%m-%d %H:%M UTC")
        ),
        format!("Email: {}", reservation.guest_email),
    ];
    if let Some(phone) = reservation.guest_phone.as_deref() {
        lines.push(format!("Phone: {}", phone));
    }
    if let Some(notes) = reservation.notes.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("Notes: {}", notes));
    }
    message(to, format!("Reservation request: {}", reservation.guest_name), &lines)
}

pub fn reservation_resolved(restaurant: &Restaurant, reservation: &ReservationRequest) -> EmailMessage {
    let outcome = match reservation.status {
        ReservationStatus::Confirmed => "confirmed",
        ReservationStatus::Declined => "declined",
        ReservationStatus::Pending => "received",
    };
    message(
        vec![reservation.guest_email.clone()],
        format!("Your reservation at {} was {}", restaurant.name, outcome),
        &[
            format!("Hi {},", reservation.guest_name),
            format!(
                "{} has {} your request for {} on {}.",
                restaurant.name,
                outcome,
                reservation.party_size,
                reservation.requested_for.format("%Y-%m-%d %H:%M UTC")
            ),
        ],
    )
}
