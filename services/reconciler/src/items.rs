//! Base catalog rows after normalization and key derivation

use serde::Serialize;

use crate::codes::{brand_from_code, canonical_key, style_code_from_item_code, year_season_from_code};
use crate::columns::Field;
use crate::table::{RawRecord, Sheet};

/// Fields a base catalog sheet is expected to carry.
pub const BASE_FIELDS: &[Field] = &[
    Field::StyleCode,
    Field::YearSeason,
    Field::ColorName,
    Field::ProductName,
    Field::InboundQty,
    Field::OutboundQty,
    Field::StockQty,
    Field::SalesQty,
];

/// One physical-unit row of the base catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedItem {
    pub brand: String,
    pub style_code: String,
    pub year_season: String,
    pub color_code: String,
    pub color_name: String,
    pub size_code: String,
    pub product_name: String,
    pub inbound_qty: u64,
    pub outbound_qty: u64,
    pub stock_qty: u64,
    pub sales_qty: u64,
    pub is_shot: bool,
    pub is_registered: bool,
    pub is_on_sale: bool,
    /// Photography / retouch evidence from the brand's supplement sheet
    pub shot_done: bool,
    /// Official-site registration evidence from the brand's supplement sheet
    pub registered_done: bool,
}

impl NormalizedItem {
    /// Build an item from a normalized record.
    ///
    /// The style code falls back to the prefix of the item code, and the year
    /// season to the one encoded in the style code.
    pub fn from_record(record: &RawRecord<'_>) -> Self {
        let mut style_code = record.text(Field::StyleCode.as_str());
        if style_code.is_empty() {
            style_code = style_code_from_item_code(&record.text(Field::ItemCode.as_str()));
        }
        let brand = brand_from_code(&style_code);
        let mut year_season = record.text(Field::YearSeason.as_str());
        if year_season.is_empty() {
            year_season = year_season_from_code(&style_code, &brand).0;
        }

        Self {
            brand,
            style_code,
            year_season,
            color_code: record.text(Field::ColorCode.as_str()),
            color_name: record.text(Field::ColorName.as_str()),
            size_code: record.text(Field::SizeCode.as_str()),
            product_name: record.text(Field::ProductName.as_str()),
            inbound_qty: record.qty(Field::InboundQty.as_str()),
            outbound_qty: record.qty(Field::OutboundQty.as_str()),
            stock_qty: record.qty(Field::StockQty.as_str()),
            sales_qty: record.qty(Field::SalesQty.as_str()),
            is_shot: record.flag(Field::IsShot.as_str()),
            is_registered: record.flag(Field::IsRegistered.as_str()),
            is_on_sale: record.flag(Field::IsOnSale.as_str()),
            shot_done: false,
            registered_done: false,
        }
    }

    pub fn key(&self) -> String {
        canonical_key(&self.style_code)
    }

    /// Photographed either per the supplement sheet or a direct flag.
    pub fn photographed(&self) -> bool {
        self.shot_done || self.is_shot
    }

    pub fn registered(&self) -> bool {
        self.registered_done || self.is_registered
    }
}

/// Items of a normalized base sheet. Rows without a style code are dropped.
pub fn items_from_sheet(sheet: &Sheet) -> Vec<NormalizedItem> {
    sheet
        .records()
        .map(|record| NormalizedItem::from_record(&record))
        .filter(|item| !item.key().is_empty())
        .collect()
}
