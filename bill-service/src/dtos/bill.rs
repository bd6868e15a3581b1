use chrono::NaiveDate;
use serde::Deserialize;
use service_core::error::AppError;

use super::blank_as_none;
use crate::services::reports::{ReportFilter, StatusFilter};

/// Query string of `GET /reports/summary`.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<String>,
}

impl SummaryQuery {
    pub fn into_filter(self) -> Result<ReportFilter, AppError> {
        let status = match self.status.as_deref() {
            Some(s) => s
                .parse::<StatusFilter>()
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?,
            None => StatusFilter::All,
        };
        Ok(ReportFilter {
            from: parse_query_date("from", self.from.as_deref())?,
            to: parse_query_date("to", self.to.as_deref())?,
            status,
        })
    }
}

fn parse_query_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!(
                "Invalid '{}' date, expected YYYY-MM-DD",
                name
            ))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_means_everything() {
        let filter = SummaryQuery::default().into_filter().unwrap();
        assert_eq!(filter.from, None);
        assert_eq!(filter.status, StatusFilter::All);
    }

    #[test]
    fn bad_values_are_rejected() {
        let query = SummaryQuery {
            from: Some("2025/01/01".into()),
            ..Default::default()
        };
        assert_eq!(
            query.into_filter().unwrap_err().message(),
            "Invalid 'from' date, expected YYYY-MM-DD"
        );

        let query = SummaryQuery {
            status: Some("late".into()),
            ..Default::default()
        };
        assert!(query.into_filter().is_err());
    }
}
