use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use kopilka_repo::category_repo::Category;
use kopilka_repo::transaction_repo::{Filter, TransactionType};
use serde::Deserialize;

use crate::error::ApiError;

/// Raw filter parameters as they arrive from the query string. Empty
/// strings count as absent (HTML selects submit empty values).
#[derive(Deserialize, Clone, Default, Debug)]
pub struct FilterParams {
    pub period: Option<String>,
    pub category_id: Option<String>,
    pub transaction_type: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Period {
    Today,
    ThisWeek,
    ThisMonth,
    Last3Months,
    ThisYear,
    AllTime,
}

impl Period {
    fn parse(s: &str) -> Option<Period> {
        match s {
            "today" => Some(Period::Today),
            "this_week" => Some(Period::ThisWeek),
            "this_month" => Some(Period::ThisMonth),
            "last_3_months" => Some(Period::Last3Months),
            "this_year" => Some(Period::ThisYear),
            "all_time" => Some(Period::AllTime),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Today => "сегодня",
            Period::ThisWeek => "за эту неделю",
            Period::ThisMonth => "за этот месяц",
            Period::Last3Months => "за последние 3 месяца",
            Period::ThisYear => "за этот год",
            Period::AllTime => "за все время",
        }
    }

    /// Date range as `[from, until)` relative to `today`. `until` is always
    /// the start of tomorrow; `all_time` has no bounds at all.
    pub fn date_range(&self, today: NaiveDate) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let from = match self {
            Period::Today => today,
            Period::ThisWeek => {
                today - Duration::days(today.weekday().num_days_from_monday() as i64)
            }
            Period::ThisMonth => today.with_day(1).unwrap(),
            Period::Last3Months => today - Duration::days(90),
            Period::ThisYear => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap(),
            Period::AllTime => return (None, None),
        };
        let tomorrow = today.succ_opt().unwrap();
        (
            Some(from.and_hms_opt(0, 0, 0).unwrap()),
            Some(tomorrow.and_hms_opt(0, 0, 0).unwrap()),
        )
    }
}

pub struct ResolvedFilter {
    pub filter: Filter,
    /// Human-readable list of applied filters, fragments joined with " • ".
    pub description: String,
}

const DESCRIPTION_SEPARATOR: &str = " • ";
const NO_FILTERS: &str = "без фильтров";

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Turns raw parameters into a per-user query restriction plus the applied
/// filter description. An unrecognised period is ignored; a nonexistent
/// category or unknown type is a validation error.
pub fn resolve_filter(
    params: &FilterParams,
    categories: &[Category],
    today: NaiveDate,
) -> Result<ResolvedFilter, ApiError> {
    let mut filter = Filter::NONE;
    let mut fragments: Vec<String> = Vec::new();

    if let Some(period) = non_empty(&params.period).and_then(Period::parse) {
        let (from, until) = period.date_range(today);
        filter.from = from;
        filter.until = until;
        fragments.push(period.label().to_owned());
    }

    if let Some(raw_category_id) = non_empty(&params.category_id) {
        let category_id: i32 = raw_category_id
            .parse()
            .map_err(|_| ApiError::validation("Категория не найдена"))?;
        let category = categories
            .iter()
            .find(|c| c.id == category_id)
            .ok_or_else(|| ApiError::validation("Категория не найдена"))?;
        filter.category_id = Some(category_id);
        fragments.push(category.name.clone());
    }

    if let Some(transaction_type) = non_empty(&params.transaction_type) {
        match transaction_type {
            "all" => fragments.push("Все".to_owned()),
            "income" => {
                filter.transaction_type = Some(TransactionType::Income);
                fragments.push("Доходы".to_owned());
            }
            "expense" => {
                filter.transaction_type = Some(TransactionType::Expense);
                fragments.push("Расходы".to_owned());
            }
            _ => return Err(ApiError::validation("Тип должен быть income или expense")),
        }
    }

    let description = if fragments.is_empty() {
        NO_FILTERS.to_owned()
    } else {
        fragments.join(DESCRIPTION_SEPARATOR)
    };

    Ok(ResolvedFilter {
        filter,
        description,
    })
}
