use rust_decimal::Decimal;

use crate::payments::codec::format_amount;
use crate::payments::types::BasketItem;

/// Packs basket lines into the colon-delimited `Basket` field.
///
/// Each line contributes name, quantity, unit price, unit tax, unit gross and
/// line total, after a leading line count.
pub fn pack_basket(items: &[BasketItem]) -> String {
    let mut parts = Vec::with_capacity(1 + items.len() * 6);
    parts.push(items.len().to_string());

    for item in items {
        let gross = item.unit_price + item.unit_tax;
        let total = gross * Decimal::from(item.quantity);

        parts.push(item.name.replace(':', " -"));
        parts.push(item.quantity.to_string());
        parts.push(format_amount(item.unit_price));
        parts.push(format_amount(item.unit_tax));
        parts.push(format_amount(gross));
        parts.push(format_amount(total));
    }

    parts.join(":")
}
