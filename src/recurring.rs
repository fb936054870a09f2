//! Recurring-bill date arithmetic and roll-forward.
//!
//! Month and year steps clamp to the last day of the target month:
//! Jan 31 + 1 month is Feb 28 (Feb 29 in leap years), and Feb 29 + 1 year is
//! Feb 28.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::store::{Bill, BillDraft, BillStatus, Recurrence};

/// Next occurrence of `date` for the given cadence.
///
/// Returns `None` for [`Recurrence::None`] and when the result would fall
/// outside chrono's representable range.
pub fn advance(date: NaiveDate, recurrence: Recurrence) -> Option<NaiveDate> {
    match recurrence {
        Recurrence::None => None,
        Recurrence::Weekly => date.checked_add_days(Days::new(7)),
        Recurrence::Monthly => date.checked_add_months(Months::new(1)),
        Recurrence::Quarterly => date.checked_add_months(Months::new(3)),
        Recurrence::Annually => date.checked_add_months(Months::new(12)),
    }
}

/// `true` when an update from `previous` to `next` should create the next
/// occurrence of a recurring bill.
pub fn should_roll_forward(previous: BillStatus, next: &BillDraft) -> bool {
    previous != BillStatus::Paid && next.status == BillStatus::Paid && next.recurring.is_recurring()
}

/// Build the next occurrence of a bill that was just paid.
///
/// The copy keeps every editable field except the due date and status.
/// Calendar event and notification history are not carried over because
/// they live outside [`BillDraft`].
pub fn next_occurrence(paid: &BillDraft) -> Option<BillDraft> {
    let due_date = advance(paid.due_date, paid.recurring)?;
    Some(BillDraft {
        due_date,
        status: BillStatus::Pending,
        ..paid.clone()
    })
}

/// Every occurrence of a recurring bill that falls within `year`.
///
/// Non-recurring bills yield their own due date when it is in `year`.
pub fn occurrences_in_year(bill: &Bill, year: i32) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut date = bill.due_date;
    if date.year() > year {
        return out;
    }
    if !bill.recurring.is_recurring() {
        if date.year() == year {
            out.push(date);
        }
        return out;
    }

    // Each step keeps advancing from the clamped date, so a bill due on the
    // 31st drifts to the 28th after February. That matches what a chain of
    // paid roll-forwards produces.
    while date.year() < year {
        match advance(date, bill.recurring) {
            Some(next) => date = next,
            None => return out,
        }
    }
    while date.year() == year {
        out.push(date);
        match advance(date, bill.recurring) {
            Some(next) => date = next,
            None => break,
        }
    }
    out
}
