//! Comma-separated report encoding.
//!
//! Output files are plain CSV with a header row taken from the row
//! struct's field declaration order (serde serialization order).

use serde::Serialize;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Encode rows to a CSV body with a header row.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        stock_code: String,
        price: f64,
        bid_volume: i64,
    }

    #[test]
    fn header_follows_field_declaration_order() {
        let rows = vec![Row {
            stock_code: "BBCA".into(),
            price: 1000.0,
            bid_volume: 500,
        }];
        let csv = to_csv(&rows).expect("encode");
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("stock_code,price,bid_volume"));
        assert_eq!(lines.next(), Some("BBCA,1000.0,500"));
    }

    #[test]
    fn empty_row_set_encodes_to_empty_body() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(to_csv(&rows).expect("encode"), "");
    }
}
