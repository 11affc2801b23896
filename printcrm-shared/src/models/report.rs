/// Dashboard aggregates
///
/// Figures behind the report cards: revenue, pending payments, order
/// counts, customer counts, average order value and the balance still owed
/// on undelivered orders. Period-bound figures are filtered on
/// `created_at`; the balance and active-customer count are always all-time.
///
/// When a period is chosen the card figures are repeated for the period
/// before it (yesterday, last week, the month or year before) with the
/// percentage change. The revenue trend always covers the trailing
/// [`REVENUE_TREND_MONTHS`] months; product performance follows the chosen
/// period.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::text_enum;

/// Length of the monthly revenue series, current month included
pub const REVENUE_TREND_MONTHS: u32 = 12;

/// Number of product types listed under product performance
pub const TOP_PRODUCTS_LIMIT: i64 = 5;

text_enum! {
    /// Reporting window, always computed in UTC
    pub enum ReportPeriod {
        Today => "today",
        ThisWeek => "this_week",
        ThisMonth => "this_month",
        LastMonth => "last_month",
        ThisYear => "this_year",
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

impl ReportPeriod {
    /// Half-open `[start, end)` window containing `now`
    ///
    /// Weeks start on Monday. `end` is None for windows that run up to now.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        let today = now.date_naive();

        match self {
            ReportPeriod::Today => (midnight(today), None),
            ReportPeriod::ThisWeek => {
                let offset = i64::from(today.weekday().num_days_from_monday());
                (midnight(today - Duration::days(offset)), None)
            }
            ReportPeriod::ThisMonth => (midnight(first_of_month(today.year(), today.month())), None),
            ReportPeriod::LastMonth => {
                let (year, month) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                (
                    midnight(first_of_month(year, month)),
                    Some(midnight(first_of_month(today.year(), today.month()))),
                )
            }
            ReportPeriod::ThisYear => (midnight(first_of_month(today.year(), 1)), None),
        }
    }

    /// The whole period immediately before the one containing `now`
    ///
    /// Ends where [`bounds`](Self::bounds) starts, so a running month is
    /// compared with the full month before it.
    pub fn previous_bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let (start, _) = self.bounds(now);
        let first_day = start.date_naive();

        let previous = match self {
            ReportPeriod::Today => first_day - Duration::days(1),
            ReportPeriod::ThisWeek => first_day - Duration::weeks(1),
            ReportPeriod::ThisMonth | ReportPeriod::LastMonth => months_before(first_day, 1),
            ReportPeriod::ThisYear => months_before(first_day, 12),
        };

        (midnight(previous), start)
    }
}

/// First day of each of the `count` months ending with the month of `now`,
/// oldest first
fn trailing_months(now: DateTime<Utc>, count: u32) -> Vec<NaiveDate> {
    let current = first_of_month(now.year(), now.month());
    (0..count)
        .rev()
        .map(|back| months_before(current, back))
        .collect()
}

/// Change from `previous` to `current` in percent, one decimal
///
/// None when there is nothing to compare against.
pub fn percent_change(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    let change = (current - previous) as f64 / previous as f64 * 100.0;
    Some((change * 10.0).round() / 10.0)
}

fn share_percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

/// Completed-payment revenue of one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// First day of the month
    pub month: NaiveDate,
    pub revenue_cents: i64,
}

/// Orders of one product type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductShare {
    pub product_type: String,
    pub orders: i64,

    /// Share of all orders in the period, one decimal
    pub share_percent: f64,
}

/// Card figures for the period before the requested one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousPeriod {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,

    pub total_revenue_cents: i64,
    pub total_orders: i64,
    pub new_customers: i64,
    pub average_order_value_cents: i64,

    pub revenue_change_percent: Option<f64>,
    pub orders_change_percent: Option<f64>,
    pub new_customers_change_percent: Option<f64>,
    pub average_order_value_change_percent: Option<f64>,
}

/// Report card figures for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// None means all time
    pub period: Option<ReportPeriod>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,

    /// Sum of completed payments
    pub total_revenue_cents: i64,
    pub pending_payments_cents: i64,
    pub pending_payments_count: i64,

    pub total_orders: i64,
    pub orders_by_status: BTreeMap<String, i64>,
    pub average_order_value_cents: i64,

    pub active_customers: i64,
    pub new_customers: i64,

    /// Order totals minus advances over orders not yet delivered
    pub outstanding_balance_cents: i64,

    /// None for all-time summaries
    pub previous: Option<PreviousPeriod>,

    /// Trailing months, oldest first, zero-filled
    pub revenue_by_month: Vec<MonthlyRevenue>,

    /// Most ordered product types in the period
    pub top_products: Vec<ProductShare>,
}

#[derive(sqlx::FromRow)]
struct PaymentTotals {
    revenue: i64,
    pending_amount: i64,
    pending_count: i64,
}

#[derive(sqlx::FromRow)]
struct StatusCount {
    status: String,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct CustomerCounts {
    active: i64,
    new_in_period: i64,
}

#[derive(sqlx::FromRow)]
struct WindowTotals {
    revenue: i64,
    orders: i64,
    order_value: i64,
    new_customers: i64,
}

#[derive(sqlx::FromRow)]
struct MonthRow {
    month: NaiveDate,
    revenue: i64,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    product_type: String,
    orders: i64,
}

impl DashboardSummary {
    /// Computes all figures for `user_id`, optionally limited to `period`
    pub async fn for_user(
        pool: &PgPool,
        user_id: Uuid,
        period: Option<ReportPeriod>,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let (start, end) = match period {
            Some(p) => {
                let (start, end) = p.bounds(now);
                (Some(start), end)
            }
            None => (None, None),
        };

        let payments = sqlx::query_as::<_, PaymentTotals>(
            r#"
            SELECT
                COALESCE(SUM(p.amount_cents) FILTER (WHERE p.status = 'completed'), 0)::BIGINT AS revenue,
                COALESCE(SUM(p.amount_cents) FILTER (WHERE p.status = 'pending'), 0)::BIGINT AS pending_amount,
                COUNT(*) FILTER (WHERE p.status = 'pending') AS pending_count
            FROM payments p
            JOIN orders o ON o.id = p.order_id
            JOIN customers c ON c.id = o.customer_id
            WHERE c.user_id = $1
              AND ($2::timestamptz IS NULL OR p.created_at >= $2)
              AND ($3::timestamptz IS NULL OR p.created_at < $3)
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        let statuses = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT o.status, COUNT(*) AS count
            FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE c.user_id = $1
              AND ($2::timestamptz IS NULL OR o.created_at >= $2)
              AND ($3::timestamptz IS NULL OR o.created_at < $3)
            GROUP BY o.status
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

        let (order_value_total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(o.total_amount_cents), 0)::BIGINT
            FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE c.user_id = $1
              AND ($2::timestamptz IS NULL OR o.created_at >= $2)
              AND ($3::timestamptz IS NULL OR o.created_at < $3)
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        let customers = sqlx::query_as::<_, CustomerCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'active') AS active,
                COUNT(*) FILTER (
                    WHERE ($2::timestamptz IS NULL OR created_at >= $2)
                      AND ($3::timestamptz IS NULL OR created_at < $3)
                ) AS new_in_period
            FROM customers
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        let (outstanding,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(GREATEST(o.total_amount_cents - o.advance_paid_cents, 0)), 0)::BIGINT
            FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE c.user_id = $1 AND o.status <> 'delivered'
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let orders_by_status: BTreeMap<String, i64> = statuses
            .into_iter()
            .map(|row| (row.status, row.count))
            .collect();
        let total_orders = orders_by_status.values().sum();
        let average_order_value_cents = average(order_value_total, total_orders);

        let previous = match period {
            Some(p) => {
                let (prev_start, prev_end) = p.previous_bounds(now);
                let totals = window_totals(pool, user_id, prev_start, prev_end).await?;
                let prev_average = average(totals.order_value, totals.orders);

                Some(PreviousPeriod {
                    period_start: prev_start,
                    period_end: prev_end,
                    total_revenue_cents: totals.revenue,
                    total_orders: totals.orders,
                    new_customers: totals.new_customers,
                    average_order_value_cents: prev_average,
                    revenue_change_percent: percent_change(payments.revenue, totals.revenue),
                    orders_change_percent: percent_change(total_orders, totals.orders),
                    new_customers_change_percent: percent_change(
                        customers.new_in_period,
                        totals.new_customers,
                    ),
                    average_order_value_change_percent: percent_change(
                        average_order_value_cents,
                        prev_average,
                    ),
                })
            }
            None => None,
        };

        let revenue_by_month = monthly_revenue(pool, user_id, now).await?;
        let top_products = top_products(pool, user_id, start, end, total_orders).await?;

        tracing::debug!(
            user_id = %user_id,
            period = ?period,
            total_orders,
            "Dashboard summary computed"
        );

        Ok(Self {
            period,
            period_start: start,
            period_end: end,
            total_revenue_cents: payments.revenue,
            pending_payments_cents: payments.pending_amount,
            pending_payments_count: payments.pending_count,
            total_orders,
            orders_by_status,
            average_order_value_cents,
            active_customers: customers.active,
            new_customers: customers.new_in_period,
            outstanding_balance_cents: outstanding,
            previous,
            revenue_by_month,
            top_products,
        })
    }
}

/// Card totals over the closed window `[start, end)`
async fn window_totals(
    pool: &PgPool,
    user_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<WindowTotals, sqlx::Error> {
    sqlx::query_as::<_, WindowTotals>(
        r#"
        SELECT
            (SELECT COALESCE(SUM(p.amount_cents), 0)::BIGINT
               FROM payments p
               JOIN orders o ON o.id = p.order_id
               JOIN customers c ON c.id = o.customer_id
              WHERE c.user_id = $1 AND p.status = 'completed'
                AND p.created_at >= $2 AND p.created_at < $3) AS revenue,
            (SELECT COUNT(*)
               FROM orders o
               JOIN customers c ON c.id = o.customer_id
              WHERE c.user_id = $1
                AND o.created_at >= $2 AND o.created_at < $3) AS orders,
            (SELECT COALESCE(SUM(o.total_amount_cents), 0)::BIGINT
               FROM orders o
               JOIN customers c ON c.id = o.customer_id
              WHERE c.user_id = $1
                AND o.created_at >= $2 AND o.created_at < $3) AS order_value,
            (SELECT COUNT(*)
               FROM customers
              WHERE user_id = $1
                AND created_at >= $2 AND created_at < $3) AS new_customers
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
}

/// Completed revenue per UTC calendar month over the trailing window
async fn monthly_revenue(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<MonthlyRevenue>, sqlx::Error> {
    let months = trailing_months(now, REVENUE_TREND_MONTHS);
    let Some(&first) = months.first() else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query_as::<_, MonthRow>(
        r#"
        SELECT
            date_trunc('month', p.created_at AT TIME ZONE 'UTC')::date AS month,
            COALESCE(SUM(p.amount_cents), 0)::BIGINT AS revenue
        FROM payments p
        JOIN orders o ON o.id = p.order_id
        JOIN customers c ON c.id = o.customer_id
        WHERE c.user_id = $1
          AND p.status = 'completed'
          AND p.created_at >= $2
        GROUP BY 1
        "#,
    )
    .bind(user_id)
    .bind(midnight(first))
    .fetch_all(pool)
    .await?;

    let by_month: BTreeMap<NaiveDate, i64> =
        rows.into_iter().map(|row| (row.month, row.revenue)).collect();

    Ok(months
        .into_iter()
        .map(|month| MonthlyRevenue {
            month,
            revenue_cents: by_month.get(&month).copied().unwrap_or(0),
        })
        .collect())
}

/// Most ordered product types in the window, with their share of
/// `total_orders`
async fn top_products(
    pool: &PgPool,
    user_id: Uuid,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    total_orders: i64,
) -> Result<Vec<ProductShare>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT o.product_type, COUNT(*) AS orders
        FROM orders o
        JOIN customers c ON c.id = o.customer_id
        WHERE c.user_id = $1
          AND ($2::timestamptz IS NULL OR o.created_at >= $2)
          AND ($3::timestamptz IS NULL OR o.created_at < $3)
        GROUP BY o.product_type
        ORDER BY orders DESC, o.product_type
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .bind(TOP_PRODUCTS_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ProductShare {
            share_percent: share_percent(row.orders, total_orders),
            product_type: row.product_type,
            orders: row.orders,
        })
        .collect())
}

/// Integer average, zero when there is nothing to average
fn average(total: i64, count: i64) -> i64 {
    if count == 0 {
        0
    } else {
        total / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn test_today_starts_at_midnight() {
        let (start, end) = ReportPeriod::Today.bounds(at(2024, 6, 12, 15));
        assert_eq!(start, at(2024, 6, 12, 0) - Duration::minutes(30));
        assert!(end.is_none());
    }

    #[test]
    fn test_week_starts_monday() {
        // 2024-06-12 is a Wednesday
        let (start, _) = ReportPeriod::ThisWeek.bounds(at(2024, 6, 12, 9));
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());

        let (start, _) = ReportPeriod::ThisWeek.bounds(at(2024, 6, 10, 9));
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }

    #[test]
    fn test_last_month_is_closed_window() {
        let (start, end) = ReportPeriod::LastMonth.bounds(at(2024, 6, 12, 9));
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(end.unwrap().date_naive(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_last_month_wraps_year() {
        let (start, end) = ReportPeriod::LastMonth.bounds(at(2025, 1, 3, 9));
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end.unwrap().date_naive(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_month_and_year_starts() {
        let now = at(2024, 6, 12, 9);
        let (month, _) = ReportPeriod::ThisMonth.bounds(now);
        let (year, _) = ReportPeriod::ThisYear.bounds(now);

        assert_eq!(month.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(year.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_period_parses_query_values() {
        assert_eq!("this_week".parse::<ReportPeriod>().unwrap(), ReportPeriod::ThisWeek);
        assert!("fortnight".parse::<ReportPeriod>().is_err());
    }

    #[test]
    fn test_previous_day_and_week() {
        let now = at(2024, 6, 12, 15);

        let (start, end) = ReportPeriod::Today.previous_bounds(now);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
        assert_eq!(end, ReportPeriod::Today.bounds(now).0);

        let (start, end) = ReportPeriod::ThisWeek.previous_bounds(now);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }

    #[test]
    fn test_previous_month_is_whole_month() {
        let (start, end) = ReportPeriod::ThisMonth.previous_bounds(at(2024, 3, 31, 9));
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let (start, end) = ReportPeriod::LastMonth.previous_bounds(at(2025, 1, 3, 9));
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
    }

    #[test]
    fn test_previous_year() {
        let (start, end) = ReportPeriod::ThisYear.previous_bounds(at(2024, 6, 12, 9));
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_trailing_months_cross_year() {
        let months = trailing_months(at(2024, 2, 20, 9), 4);
        let expected: Vec<NaiveDate> = [(2023, 11), (2023, 12), (2024, 1), (2024, 2)]
            .iter()
            .map(|&(y, m)| NaiveDate::from_ymd_opt(y, m, 1).unwrap())
            .collect();
        assert_eq!(months, expected);
        assert_eq!(trailing_months(at(2024, 2, 20, 9), REVENUE_TREND_MONTHS).len(), 12);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(11_250, 10_000), Some(12.5));
        assert_eq!(percent_change(979, 1_000), Some(-2.1));
        assert_eq!(percent_change(500, 0), None);
        assert_eq!(percent_change(0, 400), Some(-100.0));
    }

    #[test]
    fn test_share_percent() {
        assert_eq!(share_percent(1, 3), 33.3);
        assert_eq!(share_percent(2, 2), 100.0);
        assert_eq!(share_percent(0, 0), 0.0);
    }

    #[test]
    fn test_average_handles_zero() {
        assert_eq!(average(0, 0), 0);
        assert_eq!(average(1_000, 3), 333);
    }
}
