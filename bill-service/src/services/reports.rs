//! Paid/unpaid summary over live bills.

use crate::models::Bill;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Paid,
    Unpaid,
}

impl StatusFilter {
    fn admits(self, bill: &Bill) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Paid => bill.is_paid,
            StatusFilter::Unpaid => !bill.is_paid,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "paid" => Ok(StatusFilter::Paid),
            "unpaid" => Ok(StatusFilter::Unpaid),
            other => Err(format!(
                "Invalid status '{}', expected all, paid or unpaid",
                other
            )),
        }
    }
}

/// Inclusive date range plus status filter.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: StatusFilter,
}

impl ReportFilter {
    fn in_range(&self, bill: &Bill) -> bool {
        self.from.map_or(true, |from| bill.date >= from)
            && self.to.map_or(true, |to| bill.date <= to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillSummary {
    pub bill_count: usize,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub paid_total: Decimal,
    pub unpaid_total: Decimal,
    pub grand_total: Decimal,
    pub filtered_count: usize,
    pub filtered_total: Decimal,
}

/// Paid/unpaid figures cover the date range only; `filtered_*` also apply the
/// status filter.
pub fn summarize(bills: &[Bill], filter: &ReportFilter) -> BillSummary {
    let mut summary = BillSummary::default();

    for bill in bills
        .iter()
        .filter(|b| !b.is_deleted && filter.in_range(b))
    {
        summary.bill_count += 1;
        if bill.is_paid {
            summary.paid_count += 1;
            summary.paid_total += bill.total;
        } else {
            summary.unpaid_count += 1;
            summary.unpaid_total += bill.total;
        }
        if filter.status.admits(bill) {
            summary.filtered_count += 1;
            summary.filtered_total += bill.total;
        }
    }

    summary.grand_total = summary.paid_total + summary.unpaid_total;
    summary
}
