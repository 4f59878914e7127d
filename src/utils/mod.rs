pub mod jwt;

use rust_decimal::Decimal;
use tiberius::numeric::Numeric;

/// Converts a `rust_decimal::Decimal` into a `tiberius::numeric::Numeric`
/// for query binding. Tiberius 0.12 only implements `ToSql` (by-reference)
/// for `Decimal`, not `IntoSql` (by-value, required by `Query::bind`), so
/// values are converted through `Numeric` — which tiberius does support by
/// value — using the same unpacking logic tiberius's own `Decimal: ToSql`
/// impl uses internally.
pub fn decimal_to_numeric(value: Decimal) -> Numeric {
    let unpacked = value.unpack();
    let mut raw = (((unpacked.hi as u128) << 64)
        + ((unpacked.mid as u128) << 32)
        + unpacked.lo as u128) as i128;

    if value.is_sign_negative() {
        raw = -raw;
    }

    Numeric::new_with_scale(raw, value.scale() as u8)
}
