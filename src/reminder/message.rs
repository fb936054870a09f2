//! Reminder text and calendar event copy.

use crate::store::{Bill, BillDraft};

/// Urgency phrase shown at the top of a reminder.
pub fn urgency_phrase(days_until_due: i64) -> String {
    match days_until_due {
        d if d < 0 => {
            let overdue = d.unsigned_abs();
            let plural = if overdue == 1 { "" } else { "s" };
            format!("🔴 *OVERDUE by {overdue} day{plural}*")
        }
        0 => "🔴 *DUE TODAY*".to_owned(),
        1 => "🟡 *Due Tomorrow*".to_owned(),
        2 | 3 => format!("🟠 *Due in {days_until_due} days*"),
        _ => format!("🟢 Due in {days_until_due} days"),
    }
}

/// Dollar amount with two decimals.
pub fn format_amount(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Markdown reminder sent to chat channels.
pub fn format_reminder(bill: &Bill, days_until_due: i64) -> String {
    let mut text = format!(
        "💰 *Bill Reminder*\n\n{}\n\n*Vendor:* {}\n*Amount:* {}\n*Due Date:* {}\n",
        urgency_phrase(days_until_due),
        bill.vendor,
        format_amount(bill.amount),
        bill.due_date.format("%A, %B %-d, %Y"),
    );
    if let Some(method) = non_empty(&bill.payment_method) {
        text.push_str(&format!("*Payment:* {method}\n"));
    }
    if let Some(account) = non_empty(&bill.account_info) {
        text.push_str(&format!("*Account:* {account}\n"));
    }
    if let Some(notes) = non_empty(&bill.notes) {
        text.push_str(&format!("\n📝 {notes}"));
    }
    text
}

/// Plain-text description used for calendar events.
pub fn format_event_description(bill: &BillDraft) -> String {
    let mut desc = format!(
        "Bill Payment Due\n\nAmount: {}\n",
        format_amount(bill.amount)
    );
    if let Some(method) = non_empty(&bill.payment_method) {
        desc.push_str(&format!("Payment Method: {method}\n"));
    }
    if let Some(account) = non_empty(&bill.account_info) {
        desc.push_str(&format!("Account: {account}\n"));
    }
    if let Some(category) = bill.category {
        desc.push_str(&format!("Category: {}\n", category.as_str()));
    }
    if bill.recurring.is_recurring() {
        desc.push_str(&format!("Recurring: {}\n", bill.recurring.as_str()));
    }
    if let Some(notes) = non_empty(&bill.notes) {
        desc.push_str(&format!("\nNotes: {notes}"));
    }
    desc
}

/// Calendar event title.
pub fn format_event_summary(bill: &BillDraft) -> String {
    format!("💰 {} - {}", bill.vendor, format_amount(bill.amount))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
