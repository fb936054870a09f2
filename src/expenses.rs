//! Annual expense projection.
//!
//! Buckets a year's bills by due month and projects recurring bills into the
//! future months they will recur in, so the year total reflects what is
//! still coming.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::recurring::occurrences_in_year;
use crate::store::{Bill, BillStatus};

/// A recurring bill's expected future occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedBill {
    /// Id of the bill the projection was made from.
    pub source_id: i64,
    pub vendor: String,
    pub amount: f64,
    pub due_date: NaiveDate,
}

/// Bills and totals for one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthExpenses {
    /// 1-based month number.
    pub month: u32,
    pub actual: Vec<Bill>,
    pub projected: Vec<ProjectedBill>,
    /// Sum of actual and projected amounts.
    pub total: f64,
    /// Sum of actual bills marked paid.
    pub paid: f64,
    /// Sum of everything not yet paid, projections included.
    pub pending: f64,
}

/// Twelve month buckets for `year`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseReport {
    pub year: i32,
    pub total: f64,
    pub months: Vec<MonthExpenses>,
}

/// Build the report for `year`. Only occurrences after `today` are projected.
pub fn project_year(bills: &[Bill], year: i32, today: NaiveDate) -> ExpenseReport {
    let mut months: Vec<MonthExpenses> = (1..=12)
        .map(|month| MonthExpenses {
            month,
            ..MonthExpenses::default()
        })
        .collect();

    for bill in bills.iter().filter(|b| b.due_date.year() == year) {
        months[month_index(bill.due_date)].actual.push(bill.clone());
    }

    for bill in bills.iter().filter(|b| b.recurring.is_recurring()) {
        for date in occurrences_in_year(bill, year) {
            if date <= today {
                continue;
            }
            let bucket = &mut months[month_index(date)];
            // A real bill from the same vendor already covers this month.
            if bucket.actual.iter().any(|a| a.vendor == bill.vendor) {
                continue;
            }
            bucket.projected.push(ProjectedBill {
                source_id: bill.id,
                vendor: bill.vendor.clone(),
                amount: bill.amount,
                due_date: date,
            });
        }
    }

    for m in &mut months {
        let actual_total: f64 = m.actual.iter().map(|b| b.amount).sum();
        let projected_total: f64 = m.projected.iter().map(|p| p.amount).sum();
        m.paid = m
            .actual
            .iter()
            .filter(|b| b.status == BillStatus::Paid)
            .map(|b| b.amount)
            .sum();
        m.total = actual_total + projected_total;
        m.pending = m.total - m.paid;
    }

    ExpenseReport {
        year,
        total: months.iter().map(|m| m.total).sum(),
        months,
    }
}

fn month_index(date: NaiveDate) -> usize {
    date.month0() as usize
}
