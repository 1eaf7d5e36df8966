//! Common regex patterns for receipt text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Labeled amount: "TOTAL: $23.45", "Amount Due 1,200.00", "Rs. 450"
    pub static ref AMOUNT_LINE: Regex = Regex::new(
        r"(?i)\b(?:total|amount|subtotal|balance|due|net|sum|price|cost|charge|bill|pay|rupees|sar|rs)\b\.?[\s:]*(?:\$|€|£|₹|rs\.?|sar)?\s*(\d[\d,]*(?:\.\s*\d{1,2})?)"
    ).unwrap();

    // 15/03/2024, 03-15-24, 15.03.2024
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    // 2024-03-15, 2024/3/15
    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    // All-caps business name ending in a trade suffix
    pub static ref STORE_NAME: Regex = Regex::new(
        r"^([A-Z\s&'.\-]+(?:SUPERMARKET|MARKET|STORE|SHOP|MART|RESTAURANT|CAFE|PHARMACY|MALL|CENTER|STATION|COMPANY|INC|LLC|LTD))\.?$"
    ).unwrap();

    // Lines that are totals or boilerplate rather than a merchant name
    pub static ref NON_MERCHANT_WORDS: Regex = Regex::new(
        r"(?i)total|amount|subtotal|balance|due|net|thank|receipt"
    ).unwrap();

    pub static ref CURRENCY_SYMBOL: Regex = Regex::new(r"[$€£₹]").unwrap();
}
