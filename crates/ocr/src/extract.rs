use std::sync::OnceLock;

use regex::Regex;

use shelfscan_core::{BarcodeSet, ProductAttribute, ProductInfo};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_digit_run, r"[0-9]+");

// ── Barcode candidates ───────────────────────────────────────────────────────

/// A fixed-length numeric symbology, matched as an isolated digit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarcodePattern {
    pub name: &'static str,
    pub digits: usize,
}

pub const BARCODE_PATTERNS: [BarcodePattern; 3] = [
    BarcodePattern { name: "EAN-13", digits: 13 },
    BarcodePattern { name: "UPC-A", digits: 12 },
    BarcodePattern { name: "EAN-8", digits: 8 },
];

impl BarcodePattern {
    /// Every run of exactly `digits` ASCII digits not touching another digit.
    pub fn find_all<'t>(&self, text: &'t str) -> impl Iterator<Item = &'t str> {
        let digits = self.digits;
        re_digit_run()
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(move |run| run.len() == digits)
    }
}

// ── Product attribute rules ──────────────────────────────────────────────────
//
// Order is precedence. For each attribute the first rule that matches
// anywhere in the text decides the value, even when a later rule would
// give a more explicit answer. Keyword rules anchor only on the right, so
// a keyword may end a longer word ("colored" reads as red).

const PRODUCT_RULES: &[(ProductAttribute, &[&str])] = &[
    (
        ProductAttribute::Brand,
        &[
            r"(?i)(epson|hp|canon|brother|lexmark|xerox)\b",
            r"(?i)brand[:\s]+(\w+)",
        ],
    ),
    (
        ProductAttribute::Model,
        &[
            r"(?i)model[:\s]+([A-Z0-9\-]+)",
            r"(?i)(\d{2,3}[A-Z]{1,2})\b",
        ],
    ),
    (
        ProductAttribute::Color,
        &[
            r"(?i)(black|cyan|magenta|yellow|blue|red|green)\b",
            r"(?i)colou?r[:\s]+(\w+)",
        ],
    ),
    (
        ProductAttribute::Type,
        &[
            r"(?i)(ink|toner|cartridge|ribbon)\b",
            r"(?i)type[:\s]+(\w+)",
        ],
    ),
    (
        ProductAttribute::PartNumber,
        &[
            r"(?i)part[:\s#]*([A-Z0-9\-]+)",
            r"(?i)p/?n[:\s#]*([A-Z0-9\-]+)",
        ],
    ),
];

struct CompiledRules {
    attribute: ProductAttribute,
    rules: Vec<Regex>,
}

fn compiled_rules() -> &'static [CompiledRules] {
    static RULES: OnceLock<Vec<CompiledRules>> = OnceLock::new();
    RULES.get_or_init(|| {
        PRODUCT_RULES
            .iter()
            .map(|(attribute, patterns)| CompiledRules {
                attribute: *attribute,
                rules: patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("invalid regex"))
                    .collect(),
            })
            .collect()
    })
}

// ── Public extraction API ─────────────────────────────────────────────────────

/// Stateless rules over recognized text.
pub struct PatternExtractor;

impl PatternExtractor {
    /// Pool the candidates of every barcode pattern.
    ///
    /// Deliberately permissive: any isolated 8/12/13 digit run counts and
    /// check digits are not validated, so dates, phone numbers and lot codes
    /// of those lengths show up too.
    pub fn extract_barcodes(text: &str) -> BarcodeSet {
        BARCODE_PATTERNS
            .iter()
            .flat_map(|pattern| pattern.find_all(text))
            .map(str::to_string)
            .collect()
    }

    pub fn extract_product_info(text: &str) -> ProductInfo {
        let mut info = ProductInfo::new();
        for entry in compiled_rules() {
            if let Some(value) = first_match(&entry.rules, text) {
                info.set(entry.attribute, value);
            }
        }
        info
    }
}

/// Capture group 1 of the first rule that matches, in rule order.
fn first_match<'t>(rules: &[Regex], text: &'t str) -> Option<&'t str> {
    rules
        .iter()
        .find_map(|rule| rule.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
