//! Flat export of ledger transactions as CSV or JSON.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::db::FinancialTransaction;

/// Exportable columns, in default order
pub const EXPORT_FIELDS: &[&str] = &[
    "id",
    "kind",
    "category",
    "amount",
    "description",
    "transactionDate",
    "workOrderId",
    "paymentMethod",
    "createdAt",
    "updatedAt",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Unsupported export format '{0}'. Must be one of: csv, json")]
    UnknownFormat(String),
    #[error("Unknown export field '{0}'")]
    UnknownField(String),
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Export buffer error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Parse a comma-separated field list. `None` or blank selects every field.
pub fn parse_fields(fields: Option<&str>) -> Result<Vec<&'static str>, ExportError> {
    let Some(list) = fields.map(str::trim).filter(|l| !l.is_empty()) else {
        return Ok(EXPORT_FIELDS.to_vec());
    };

    let mut selected = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let field = EXPORT_FIELDS
            .iter()
            .find(|f| **f == name)
            .ok_or_else(|| ExportError::UnknownField(name.to_string()))?;
        if !selected.contains(field) {
            selected.push(*field);
        }
    }
    Ok(selected)
}

fn field_value(tx: &FinancialTransaction, field: &str) -> Value {
    match field {
        "id" => tx.id.into(),
        "kind" => tx.kind.clone().into(),
        "category" => tx.category.clone().into(),
        "amount" => tx.amount.into(),
        "description" => tx.description.clone().into(),
        "transactionDate" => tx.transaction_date.clone().into(),
        "workOrderId" => tx.work_order_id.into(),
        "paymentMethod" => tx.payment_method.clone().into(),
        "createdAt" => tx.created_at.clone().into(),
        "updatedAt" => tx.updated_at.clone().into(),
        _ => Value::Null,
    }
}

/// CSV cell text; nulls become empty cells
fn cell(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Encode the selected fields of each transaction
pub fn export_transactions(
    transactions: &[FinancialTransaction],
    format: ExportFormat,
    fields: &[&str],
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(fields)?;
            for tx in transactions {
                writer.write_record(fields.iter().map(|f| cell(field_value(tx, f))))?;
            }
            writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
        }
        ExportFormat::Json => {
            let rows: Vec<Map<String, Value>> = transactions
                .iter()
                .map(|tx| {
                    fields
                        .iter()
                        .map(|f| (f.to_string(), field_value(tx, f)))
                        .collect()
                })
                .collect();
            Ok(serde_json::to_vec_pretty(&rows)?)
        }
    }
}

/// Attachment name, e.g. `transactions-2024-03-01.csv`
pub fn export_filename(format: ExportFormat, date: NaiveDate) -> String {
    format!("transactions-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FinancialTransaction> {
        vec![
            FinancialTransaction {
                id: 1,
                kind: "revenue".into(),
                category: "services".into(),
                amount: 1250.5,
                description: Some("Install, phase 1".into()),
                transaction_date: "2024-03-01".into(),
                work_order_id: Some(4),
                payment_method: None,
                created_at: "2024-03-01T09:00:00Z".into(),
                updated_at: "2024-03-01T09:00:00Z".into(),
            },
            FinancialTransaction {
                id: 2,
                kind: "expense".into(),
                category: "parts".into(),
                amount: 80.0,
                description: None,
                transaction_date: "2024-03-02".into(),
                work_order_id: None,
                payment_method: Some("card".into()),
                created_at: "2024-03-02T09:00:00Z".into(),
                updated_at: "2024-03-02T09:00:00Z".into(),
            },
        ]
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(parse_fields(None).unwrap().len(), EXPORT_FIELDS.len());
        assert_eq!(parse_fields(Some("  ")).unwrap().len(), EXPORT_FIELDS.len());
        assert_eq!(
            parse_fields(Some("amount, kind,amount")).unwrap(),
            vec!["amount", "kind"]
        );
        assert!(matches!(
            parse_fields(Some("amount,password")),
            Err(ExportError::UnknownField(f)) if f == "password"
        ));
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    }

    #[test]
    fn test_csv_export_quotes_and_blanks() {
        let bytes = export_transactions(
            &sample(),
            ExportFormat::Csv,
            &["id", "description", "amount", "paymentMethod"],
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,description,amount,paymentMethod");
        assert_eq!(lines[1], "1,\"Install, phase 1\",1250.5,");
        assert_eq!(lines[2], "2,,80.0,card");
    }

    #[test]
    fn test_json_export_keeps_types() {
        let bytes = export_transactions(&sample(), ExportFormat::Json, &["id", "workOrderId"]).unwrap();
        let rows: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["workOrderId"], 4);
        assert!(rows[1]["workOrderId"].is_null());
        assert!(rows[0].get("amount").is_none());
    }

    #[test]
    fn test_json_export_keeps_requested_order() {
        let bytes =
            export_transactions(&sample(), ExportFormat::Json, &["kind", "amount", "id"]).unwrap();
        let rows: Vec<Map<String, Value>> = serde_json::from_slice(&bytes).unwrap();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["kind", "amount", "id"]);

        let text = String::from_utf8(bytes).unwrap();
        let kind = text.find("\"kind\"").unwrap();
        let amount = text.find("\"amount\"").unwrap();
        let id = text.find("\"id\"").unwrap();
        assert!(kind < amount && amount < id);
    }

    #[test]
    fn test_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(export_filename(ExportFormat::Json, date), "transactions-2024-03-01.json");
    }
}
