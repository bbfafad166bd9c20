//! Column normalizer
//!
//! Maps the header spellings people actually use in brand and catalog sheets
//! onto one fixed internal schema. Unknown headers pass through unchanged.

use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

use crate::table::Sheet;

/// Canonical fields of the internal schema.
///
/// There is no brand field: brand always comes from the style code prefix,
/// so a brand column in a sheet is left as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    StyleCode,
    ItemCode,
    YearSeason,
    ColorCode,
    ColorName,
    SizeCode,
    ProductName,
    InboundQty,
    OutboundQty,
    StockQty,
    SalesQty,
    IsShot,
    IsRegistered,
    IsOnSale,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::StyleCode,
        Field::ItemCode,
        Field::YearSeason,
        Field::ColorCode,
        Field::ColorName,
        Field::SizeCode,
        Field::ProductName,
        Field::InboundQty,
        Field::OutboundQty,
        Field::StockQty,
        Field::SalesQty,
        Field::IsShot,
        Field::IsRegistered,
        Field::IsOnSale,
    ];

    /// Column name used for this field after normalization.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::StyleCode => "style_code",
            Field::ItemCode => "item_code",
            Field::YearSeason => "year_season",
            Field::ColorCode => "color_code",
            Field::ColorName => "color_name",
            Field::SizeCode => "size_code",
            Field::ProductName => "product_name",
            Field::InboundQty => "inbound_qty",
            Field::OutboundQty => "outbound_qty",
            Field::StockQty => "stock_qty",
            Field::SalesQty => "sales_qty",
            Field::IsShot => "is_shot",
            Field::IsRegistered => "is_registered",
            Field::IsOnSale => "is_on_sale",
        }
    }
}

/// Known header spellings and the field each one stands for.
pub const COLUMN_ALIASES: &[(&str, Field)] = &[
    ("스타일코드", Field::StyleCode),
    ("스타일 코드", Field::StyleCode),
    ("스타일", Field::StyleCode),
    ("품번", Field::StyleCode),
    ("STYLE", Field::StyleCode),
    ("Style", Field::StyleCode),
    ("styleCode", Field::StyleCode),
    ("상품코드", Field::ItemCode),
    ("품목코드", Field::ItemCode),
    ("SKU", Field::ItemCode),
    ("연도시즌", Field::YearSeason),
    ("년도시즌", Field::YearSeason),
    ("yearSeason", Field::YearSeason),
    ("컬러코드", Field::ColorCode),
    ("색상코드", Field::ColorCode),
    ("colorCode", Field::ColorCode),
    ("컬러명", Field::ColorName),
    ("색상명", Field::ColorName),
    ("컬러", Field::ColorName),
    ("colorName", Field::ColorName),
    ("사이즈", Field::SizeCode),
    ("사이즈코드", Field::SizeCode),
    ("sizeCode", Field::SizeCode),
    ("상품명", Field::ProductName),
    ("품명", Field::ProductName),
    ("productName", Field::ProductName),
    ("입고수량", Field::InboundQty),
    ("입고량", Field::InboundQty),
    ("입고", Field::InboundQty),
    ("inboundQty", Field::InboundQty),
    ("출고수량", Field::OutboundQty),
    ("출고량", Field::OutboundQty),
    ("출고", Field::OutboundQty),
    ("outboundQty", Field::OutboundQty),
    ("재고수량", Field::StockQty),
    ("재고", Field::StockQty),
    ("stockQty", Field::StockQty),
    ("판매수량", Field::SalesQty),
    ("판매량", Field::SalesQty),
    ("salesQty", Field::SalesQty),
    ("촬영여부", Field::IsShot),
    ("isShot", Field::IsShot),
    ("등록여부", Field::IsRegistered),
    ("isRegistered", Field::IsRegistered),
    ("판매여부", Field::IsOnSale),
    ("판매중", Field::IsOnSale),
    ("isOnSale", Field::IsOnSale),
];

/// Separate year / season headers combined into `year_season` when the
/// sheet has no combined column.
const YEAR_HEADERS: &[&str] = &["연도", "년도", "year"];
const SEASON_HEADERS: &[&str] = &["시즌", "season"];

/// NFKC, lowercase, whitespace removed. Used for fuzzy label comparison.
pub fn normalize_label(label: &str) -> String {
    label
        .nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn alias_target(header: &str, aliases: &[(&str, Field)]) -> Option<Field> {
    aliases
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|(_, field)| *field)
}

/// Compute the rename mapping (raw header -> canonical name) for a header row.
///
/// An alias is only applied when its canonical field is not already present
/// under its own name. When several aliases of one field are present, the
/// one listed first in `aliases` wins regardless of column order.
pub fn header_renames(headers: &[String], aliases: &[(&str, Field)]) -> BTreeMap<String, String> {
    let present: Vec<&str> = headers.iter().map(|h| h.trim()).collect();
    let mut claimed: Vec<Field> = Vec::new();
    let mut renames = BTreeMap::new();

    for (alias, field) in aliases {
        if claimed.contains(field) || present.contains(&field.as_str()) {
            continue;
        }
        let Some(header) = headers.iter().find(|h| h.trim() == *alias) else {
            continue;
        };
        claimed.push(*field);
        renames.insert(header.clone(), field.as_str().to_string());
    }

    renames
}

fn find_header(sheet: &Sheet, candidates: &[&str]) -> Option<usize> {
    sheet.headers().iter().position(|h| {
        let label = normalize_label(h);
        candidates.iter().any(|c| normalize_label(c) == label)
    })
}

/// Synthesize `year_season` from separate year and season columns.
///
/// Runs before alias resolution; a no-op when the sheet already carries a
/// combined column under its canonical name or any alias.
fn synthesize_year_season(sheet: &mut Sheet) {
    let has_combined = sheet.headers().iter().any(|h| {
        let h = h.trim();
        h == Field::YearSeason.as_str() || alias_target(h, COLUMN_ALIASES) == Some(Field::YearSeason)
    });
    if has_combined {
        return;
    }
    let (Some(year), Some(season)) = (
        find_header(sheet, YEAR_HEADERS),
        find_header(sheet, SEASON_HEADERS),
    ) else {
        return;
    };
    let combined: Vec<String> = sheet
        .column_values(year)
        .into_iter()
        .zip(sheet.column_values(season))
        .map(|(y, s)| format!("{}{}", y.trim(), s.trim()))
        .collect();
    sheet.push_column(Field::YearSeason.as_str(), combined);
}

/// Normalize a sheet's headers to the internal schema.
pub fn normalize_sheet(mut sheet: Sheet) -> Sheet {
    synthesize_year_season(&mut sheet);
    let mut renames = header_renames(sheet.headers(), COLUMN_ALIASES);
    if renames.is_empty() {
        return sheet;
    }
    // Duplicate raw headers: only the first occurrence is renamed.
    let targets: Vec<(usize, String)> = sheet
        .headers()
        .iter()
        .enumerate()
        .filter_map(|(i, h)| renames.remove(h).map(|to| (i, to)))
        .collect();
    for (index, name) in targets {
        sheet.rename_column(index, &name);
    }
    sheet
}

/// Canonical fields from `required` that the sheet does not carry.
pub fn missing_fields(sheet: &Sheet, required: &[Field]) -> Vec<Field> {
    required
        .iter()
        .copied()
        .filter(|f| !sheet.has_column(f.as_str()))
        .collect()
}
