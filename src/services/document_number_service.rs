use crate::db::DbConn;
use crate::error::AppResult;
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use tiberius::Query;

/// The document families that carry minted human-readable numbers.
///
/// Business documents use an uppercase three-letter month (GRN/2025/JUL/20/1);
/// lot numbers keep the zero-padded numeric month (LOT/2025/07/20/1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Grn,
    SalesOrder,
    SalesChallan,
    PurchaseOrder,
    JobOrder,
    Lot,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Grn => "GRN",
            DocumentKind::SalesOrder => "SO",
            DocumentKind::SalesChallan => "SC",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::JobOrder => "JO",
            DocumentKind::Lot => "LOT",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            DocumentKind::Grn => "goods_receipts",
            DocumentKind::SalesOrder => "sales_orders",
            DocumentKind::SalesChallan => "sales_challans",
            DocumentKind::PurchaseOrder => "purchase_orders",
            DocumentKind::JobOrder => "job_orders",
            DocumentKind::Lot => "inventory_lots",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            DocumentKind::Grn => "grn_number",
            DocumentKind::SalesOrder => "so_number",
            DocumentKind::SalesChallan => "sc_number",
            DocumentKind::PurchaseOrder => "po_number",
            DocumentKind::JobOrder => "jo_number",
            DocumentKind::Lot => "lot_number",
        }
    }

    fn uses_month_abbreviation(&self) -> bool {
        !matches!(self, DocumentKind::Lot)
    }
}

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Date-scoped number prefix, without the trailing sequence component.
/// E.g. "GRN/2025/JUL/20" or "LOT/2025/07/20".
pub fn date_prefix(kind: DocumentKind, date: NaiveDate) -> String {
    if kind.uses_month_abbreviation() {
        format!(
            "{}/{}/{}/{:02}",
            kind.prefix(),
            date.year(),
            MONTH_ABBREVIATIONS[date.month0() as usize],
            date.day()
        )
    } else {
        format!(
            "{}/{}/{:02}/{:02}",
            kind.prefix(),
            date.year(),
            date.month(),
            date.day()
        )
    }
}

/// Smallest positive integer not yet used under the given date prefix.
///
/// Gap-filling is deliberate: deleting a document frees its number for the
/// next mint on the same day. Malformed numbers under the prefix are ignored.
pub fn next_in_sequence<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    date_prefix: &str,
) -> i32 {
    let used: HashSet<i32> = existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(date_prefix))
        .filter_map(|rest| rest.strip_prefix('/'))
        .filter(|tail| !tail.contains('/'))
        .filter_map(|tail| tail.parse::<i32>().ok())
        .filter(|n| *n > 0)
        .collect();

    let mut candidate = 1;
    while used.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

/// Mint the next document number for `kind` on `date`.
///
/// Runs on the caller's connection so the scan participates in the caller's
/// transaction; the UPDLOCK/HOLDLOCK range lock serializes same-day mints
/// against each other. The unique index on the number column remains the
/// safety net: a race that slips through surfaces as a uniqueness conflict
/// at insert time, and the retry layer re-runs the operation with a fresh
/// mint.
pub async fn mint(conn: &mut DbConn, kind: DocumentKind, date: NaiveDate) -> AppResult<String> {
    let prefix = date_prefix(kind, date);

    let sql = format!(
        "SELECT {column} FROM {table} WITH (UPDLOCK, HOLDLOCK) WHERE {column} LIKE @P1",
        column = kind.column(),
        table = kind.table(),
    );

    let pattern = format!("{}/%", prefix);
    let mut query = Query::new(sql);
    query.bind(pattern.as_str());

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let existing: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get::<&str, _>(0).map(|s| s.to_string()))
        .collect();

    let sequence = next_in_sequence(existing.iter().map(|s| s.as_str()), &prefix);
    let number = format!("{}/{}", prefix, sequence);

    tracing::debug!(
        kind = ?kind,
        number = %number,
        existing_today = existing.len(),
        "Minted document number"
    );

    Ok(number)
}
