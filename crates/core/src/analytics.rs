//! Sales aggregates computed on demand from a store's order history.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::types::Order;

/// Maximum number of entries reported in [`SalesAnalytics::top_products`].
pub const TOP_PRODUCTS_LIMIT: usize = 5;

const MONTH_LABELS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("revenue total overflowed the decimal range")]
    RevenueOverflow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalytics {
    pub total_revenue: Decimal,
    pub sales_count: u64,
    pub average_order_value: Decimal,
    pub daily_series: Vec<DailySales>,
    pub top_products: Vec<TopProduct>,
}

/// Revenue booked on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    pub date: NaiveDate,
    /// Short chart label such as `05 mar`.
    pub name: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub count: u64,
}

/// Aggregates revenue figures over `orders`.
///
/// Cancelled orders are skipped. Days are bucketed in `timezone`.
pub fn compute_analytics(
    orders: &[Order],
    timezone: Tz,
) -> Result<SalesAnalytics, AnalyticsError> {
    let sales: Vec<&Order> = orders
        .iter()
        .filter(|order| order.status.counts_as_sale())
        .collect();

    let total_revenue = sales.iter().try_fold(Decimal::ZERO, |sum, order| {
        sum.checked_add(order.total).ok_or(AnalyticsError::RevenueOverflow)
    })?;
    let sales_count = sales.len() as u64;
    let average_order_value = if sales_count == 0 {
        Decimal::ZERO
    } else {
        total_revenue / Decimal::from(sales_count)
    };

    Ok(SalesAnalytics {
        total_revenue,
        sales_count,
        average_order_value,
        daily_series: daily_series(&sales, timezone)?,
        top_products: top_products(&sales),
    })
}

fn daily_series(orders: &[&Order], timezone: Tz) -> Result<Vec<DailySales>, AnalyticsError> {
    let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for order in orders {
        let day = order.created_at.with_timezone(&timezone).date_naive();
        let total = by_day.entry(day).or_default();
        *total = total
            .checked_add(order.total)
            .ok_or(AnalyticsError::RevenueOverflow)?;
    }

    Ok(by_day
        .into_iter()
        .map(|(date, total)| DailySales {
            date,
            name: day_label(date),
            total,
        })
        .collect())
}

fn top_products(orders: &[&Order]) -> Vec<TopProduct> {
    let mut ranking: Vec<TopProduct> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for item in orders.iter().flat_map(|order| order.items.iter()) {
        match positions.get(item.product_id.as_str()) {
            Some(&index) => ranking[index].count += u64::from(item.quantity),
            None => {
                positions.insert(item.product_id.as_str(), ranking.len());
                ranking.push(TopProduct {
                    product_id: item.product_id.clone(),
                    name: item.product.name.clone(),
                    count: u64::from(item.quantity),
                });
            }
        }
    }

    // Stable: equal counts keep first-encountered order.
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking.truncate(TOP_PRODUCTS_LIMIT);
    ranking
}

/// Formats a day as `DD mon` with Spanish month abbreviations.
pub fn day_label(date: NaiveDate) -> String {
    let month = MONTH_LABELS[date.month0() as usize];
    format!("{:02} {month}", date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItem, OrderStatus, Product};
    use chrono::{DateTime, Utc};
    use std::str::FromStr;

    fn at(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn product(id: &str, price: &str) -> Product {
        Product {
            id: id.to_string(),
            store_id: "s-1".to_string(),
            name: format!("Product {}", id.to_uppercase()),
            description: None,
            price: Decimal::from_str(price).unwrap(),
            image: None,
            is_active: true,
            created_at: at("2024-01-01T00:00:00Z"),
            updated_at: at("2024-01-01T00:00:00Z"),
        }
    }

    fn order(
        id: &str,
        created_at: &str,
        status: OrderStatus,
        lines: &[(&str, &str, u32)],
    ) -> Order {
        let items: Vec<OrderItem> = lines
            .iter()
            .enumerate()
            .map(|(index, (product_id, price, quantity))| OrderItem {
                id: format!("{id}-item-{index}"),
                order_id: id.to_string(),
                product_id: product_id.to_string(),
                quantity: *quantity,
                price: Decimal::from_str(price).unwrap(),
                product: product(product_id, price),
            })
            .collect();
        let total = items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum();
        Order {
            id: id.to_string(),
            store_id: "s-1".to_string(),
            customer_name: "Ana".to_string(),
            customer_email: "ana@example.com".to_string(),
            customer_phone: None,
            notes: None,
            total,
            status,
            created_at: at(created_at),
            updated_at: at(created_at),
            items,
        }
    }

    #[test]
    fn empty_history_has_zero_average() {
        let analytics = compute_analytics(&[], Tz::UTC).unwrap();
        assert_eq!(analytics.total_revenue, Decimal::ZERO);
        assert_eq!(analytics.sales_count, 0);
        assert_eq!(analytics.average_order_value, Decimal::ZERO);
        assert!(analytics.daily_series.is_empty());
        assert!(analytics.top_products.is_empty());
    }

    #[test]
    fn only_cancelled_orders_behave_like_empty_history() {
        let orders = vec![order(
            "o-1",
            "2024-03-05T10:00:00Z",
            OrderStatus::Cancelled,
            &[("a", "10", 1)],
        )];
        let analytics = compute_analytics(&orders, Tz::UTC).unwrap();
        assert_eq!(analytics.sales_count, 0);
        assert_eq!(analytics.average_order_value, Decimal::ZERO);
        assert!(analytics.top_products.is_empty());
    }

    #[test]
    fn single_order_scenario() {
        let orders = vec![order(
            "o-1",
            "2024-03-05T10:00:00Z",
            OrderStatus::Pending,
            &[("a", "10", 2), ("b", "5", 1)],
        )];

        let analytics = compute_analytics(&orders, Tz::UTC).unwrap();
        assert_eq!(analytics.total_revenue, Decimal::from(25));
        assert_eq!(analytics.sales_count, 1);
        assert_eq!(analytics.average_order_value, Decimal::from(25));
        assert_eq!(analytics.top_products.len(), 2);
        assert_eq!(analytics.top_products[0].name, "Product A");
        assert_eq!(analytics.top_products[0].count, 2);
        assert_eq!(analytics.top_products[1].name, "Product B");
        assert_eq!(analytics.top_products[1].count, 1);
        assert_eq!(analytics.daily_series.len(), 1);
        assert_eq!(analytics.daily_series[0].name, "05 mar");
    }

    #[test]
    fn daily_series_is_sorted_by_date_regardless_of_input_order() {
        let orders = vec![
            order("o-3", "2024-03-07T09:00:00Z", OrderStatus::Delivered, &[("a", "1", 1)]),
            order("o-1", "2024-03-05T09:00:00Z", OrderStatus::Pending, &[("a", "2", 1)]),
            order("o-4", "2024-03-07T18:00:00Z", OrderStatus::Confirmed, &[("a", "3", 1)]),
            order("o-2", "2024-02-28T09:00:00Z", OrderStatus::Pending, &[("a", "4", 1)]),
        ];

        let series = compute_analytics(&orders, Tz::UTC).unwrap().daily_series;
        let days: Vec<(String, Decimal)> = series
            .iter()
            .map(|day| (day.date.to_string(), day.total))
            .collect();
        assert_eq!(
            days,
            vec![
                ("2024-02-28".to_string(), Decimal::from(4)),
                ("2024-03-05".to_string(), Decimal::from(2)),
                ("2024-03-07".to_string(), Decimal::from(4)),
            ]
        );
    }

    #[test]
    fn days_are_bucketed_in_the_report_timezone() {
        let orders = vec![order(
            "o-1",
            "2024-03-05T23:30:00Z",
            OrderStatus::Pending,
            &[("a", "10", 1)],
        )];

        let utc = compute_analytics(&orders, Tz::UTC).unwrap().daily_series;
        assert_eq!(utc[0].name, "05 mar");

        let madrid = compute_analytics(&orders, Tz::Europe__Madrid)
            .unwrap()
            .daily_series;
        assert_eq!(madrid[0].name, "06 mar");
    }

    #[test]
    fn top_products_are_capped_and_ties_keep_encounter_order() {
        let orders = vec![
            order(
                "o-1",
                "2024-03-05T10:00:00Z",
                OrderStatus::Pending,
                &[("c", "1", 1), ("a", "1", 1), ("f", "1", 1)],
            ),
            order(
                "o-2",
                "2024-03-06T10:00:00Z",
                OrderStatus::Pending,
                &[("b", "1", 3), ("d", "1", 1), ("e", "1", 1), ("a", "1", 1)],
            ),
        ];

        let top = compute_analytics(&orders, Tz::UTC).unwrap().top_products;
        let ids: Vec<&str> = top.iter().map(|entry| entry.product_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c", "f", "d"]);
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].count, 2);
    }

    #[test]
    fn cancelled_orders_do_not_count_towards_top_products() {
        let orders = vec![
            order("o-1", "2024-03-05T10:00:00Z", OrderStatus::Cancelled, &[("a", "1", 9)]),
            order("o-2", "2024-03-05T11:00:00Z", OrderStatus::Pending, &[("b", "1", 1)]),
        ];

        let analytics = compute_analytics(&orders, Tz::UTC).unwrap();
        assert_eq!(analytics.total_revenue, Decimal::from(1));
        assert_eq!(analytics.top_products.len(), 1);
        assert_eq!(analytics.top_products[0].product_id, "b");
    }

    #[test]
    fn average_divides_revenue_by_sales_count() {
        let orders = vec![
            order("o-1", "2024-03-05T10:00:00Z", OrderStatus::Pending, &[("a", "10", 1)]),
            order("o-2", "2024-03-05T11:00:00Z", OrderStatus::Pending, &[("a", "10", 1)]),
            order("o-3", "2024-03-05T12:00:00Z", OrderStatus::Pending, &[("b", "5", 1)]),
        ];
        let analytics = compute_analytics(&orders, Tz::UTC).unwrap();
        assert_eq!(analytics.sales_count, 3);
        assert_eq!(
            analytics.average_order_value.round_dp(2),
            Decimal::from_str("8.33").unwrap()
        );
    }

    #[test]
    fn revenue_beyond_the_decimal_range_is_an_error() {
        let huge = Decimal::from_str("50000000000000000000000000000").unwrap();
        let mut first = order("o-1", "2024-03-05T10:00:00Z", OrderStatus::Pending, &[]);
        first.total = huge;
        let mut second = order("o-2", "2024-03-06T10:00:00Z", OrderStatus::Pending, &[]);
        second.total = huge;

        assert_eq!(
            compute_analytics(&[first.clone(), second.clone()], Tz::UTC),
            Err(AnalyticsError::RevenueOverflow)
        );

        second.created_at = first.created_at;
        assert_eq!(
            daily_series(&[&first, &second], Tz::UTC),
            Err(AnalyticsError::RevenueOverflow)
        );
    }

    #[test]
    fn labels_use_spanish_month_abbreviations() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        assert_eq!(day_label(date), "01 sept");
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(day_label(date), "31 ene");
    }
}
