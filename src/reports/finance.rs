//! Financial summary over the transaction ledger.

use serde::Serialize;
use sqlx::SqlitePool;

use super::{percentage, round2};
use crate::db::{CategoryTotal, FinancialTransaction, MonthlyTotal, TransactionQuery};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
    /// Net profit as a percentage of revenue; 0 without revenue
    pub profit_margin: f64,
    pub by_category: Vec<CategoryTotal>,
    pub monthly: Vec<MonthlyTotal>,
}

impl FinancialSummary {
    pub fn from_totals(
        revenue: f64,
        expenses: f64,
        by_category: Vec<CategoryTotal>,
        monthly: Vec<MonthlyTotal>,
    ) -> Self {
        let net = revenue - expenses;
        let by_category = by_category
            .into_iter()
            .map(|c| CategoryTotal {
                total: round2(c.total),
                ..c
            })
            .collect();
        let monthly = monthly
            .into_iter()
            .map(|m| MonthlyTotal {
                revenue: round2(m.revenue),
                expenses: round2(m.expenses),
                ..m
            })
            .collect();
        Self {
            total_revenue: round2(revenue),
            total_expenses: round2(expenses),
            net_profit: round2(net),
            profit_margin: percentage(net, revenue),
            by_category,
            monthly,
        }
    }
}

/// Summarize the transactions matching `query` (kind, category, date range, work order)
pub async fn financial_summary(
    pool: &SqlitePool,
    query: &TransactionQuery,
) -> Result<FinancialSummary, sqlx::Error> {
    let (revenue, expenses) = FinancialTransaction::totals(pool, query).await?;
    let by_category = FinancialTransaction::by_category(pool, query).await?;
    let monthly = FinancialTransaction::monthly(pool, query).await?;

    Ok(FinancialSummary::from_totals(revenue, expenses, by_category, monthly))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, CreateTransactionRequest, TransactionKind};

    #[test]
    fn test_margin() {
        let s = FinancialSummary::from_totals(2000.0, 1500.0, vec![], vec![]);
        assert_eq!(s.net_profit, 500.0);
        assert_eq!(s.profit_margin, 25.0);

        let s = FinancialSummary::from_totals(
            0.1 + 0.2,
            0.0,
            vec![CategoryTotal {
                category: "parts".into(),
                kind: "expense".into(),
                total: 10.0 / 3.0,
            }],
            vec![MonthlyTotal {
                month: "2024-03".into(),
                revenue: 0.1 + 0.2,
                expenses: 2.0 / 3.0,
            }],
        );
        assert_eq!(s.total_revenue, 0.3);
        assert_eq!(s.by_category[0].total, 3.33);
        assert_eq!(s.monthly[0].revenue, 0.3);
        assert_eq!(s.monthly[0].expenses, 0.67);

        let loss = FinancialSummary::from_totals(0.0, 300.0, vec![], vec![]);
        assert_eq!(loss.net_profit, -300.0);
        assert_eq!(loss.profit_margin, 0.0);
    }

    #[tokio::test]
    async fn test_summary_respects_range() {
        let pool = init_memory().await.unwrap();
        for (kind, amount, date) in [
            (TransactionKind::Revenue, 400.0, "2024-03-02"),
            (TransactionKind::Expense, 100.0, "2024-03-09"),
            (TransactionKind::Revenue, 999.0, "2024-04-01"),
        ] {
            FinancialTransaction::create(
                &pool,
                &CreateTransactionRequest {
                    kind,
                    category: "general".into(),
                    amount,
                    description: None,
                    transaction_date: Some(date.into()),
                    work_order_id: None,
                    payment_method: None,
                },
            )
            .await
            .unwrap();
        }

        let march = financial_summary(
            &pool,
            &TransactionQuery {
                from: Some("2024-03-01".into()),
                to: Some("2024-03-31".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(march.total_revenue, 400.0);
        assert_eq!(march.total_expenses, 100.0);
        assert_eq!(march.profit_margin, 75.0);
        assert_eq!(march.monthly.len(), 1);
        assert_eq!(march.monthly[0].month, "2024-03");
        assert_eq!(march.by_category.len(), 2);
    }
}
