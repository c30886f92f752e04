use crate::domain::model::{Chunk, FieldValue, Record, KNOWN_FIELDS};
use crate::utils::error::{EtlError, Result};
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 金額加 10%
fn amount_multiplier() -> BigDecimal {
    BigDecimal::new(110i64.into(), 2)
}

/// 純函式：只保留已知欄位並正規化 date 與 amount，可在多個 worker 上同時執行
pub fn transform(chunk: Chunk) -> Result<Chunk> {
    let Chunk { index, records } = chunk;
    let records = records
        .into_iter()
        .map(transform_record)
        .collect::<Result<Vec<_>>>()?;

    Ok(Chunk::new(index, records))
}

pub fn transform_record(record: Record) -> Result<Record> {
    record
        .into_fields()
        .into_iter()
        .filter(|(name, _)| KNOWN_FIELDS.contains(&name.as_str()))
        .map(|(name, value)| -> Result<(String, FieldValue)> {
            let value = match name.as_str() {
                "date" => normalize_date(value)?,
                "amount" => scale_amount(value)?,
                _ => value,
            };
            Ok((name, value))
        })
        .collect()
}

fn normalize_date(value: FieldValue) -> Result<FieldValue> {
    match value {
        FieldValue::Text(raw) => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map(FieldValue::Date)
            .map_err(|_| EtlError::DateFormatError { value: raw }),
        other => Ok(other),
    }
}

fn scale_amount(value: FieldValue) -> Result<FieldValue> {
    let amount = match value {
        FieldValue::Text(raw) => BigDecimal::from_str(raw.trim())
            .map_err(|_| EtlError::AmountFormatError { value: raw })?,
        FieldValue::Decimal(amount) => amount,
        other => return Ok(other),
    };

    // 保留原本的小數位數，最少兩位
    let (_, scale) = amount.as_bigint_and_exponent();
    let scaled = (amount * amount_multiplier()).with_scale_round(scale.max(2), RoundingMode::HalfEven);
    Ok(FieldValue::Decimal(scaled))
}
