//! Field catalog for the hotel performance report
//!
//! Maps the report's raw column headers to canonical output names and a
//! primitive type. The table is fixed at compile time and never mutated.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Primitive type of a catalog field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Date,
    DateTime,
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveType::String => write!(f, "string"),
            PrimitiveType::Integer => write!(f, "integer"),
            PrimitiveType::Number => write!(f, "number"),
            PrimitiveType::Date => write!(f, "date"),
            PrimitiveType::DateTime => write!(f, "datetime"),
        }
    }
}

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column header as it appears in the report
    pub raw: &'static str,
    /// Output field name
    pub canonical: &'static str,
    pub kind: PrimitiveType,
    /// Dimension column; part of a row's identity
    pub key: bool,
}

const fn field(
    raw: &'static str,
    canonical: &'static str,
    kind: PrimitiveType,
    key: bool,
) -> FieldSpec {
    FieldSpec {
        raw,
        canonical,
        kind,
        key,
    }
}

use PrimitiveType::{Date, DateTime, Integer, Number, String as Str};

/// Columns of the "Performance" report, in request order
pub const HOTEL_PERFORMANCE_FIELDS: &[FieldSpec] = &[
    // Dimensions
    field("HotelId", "hotel_id", Str, true),
    field("AdvertiserHotelId", "advertiser_hotel_id", Str, true),
    field("SubaccountId", "subaccount_id", Str, true),
    field("Date", "date", Date, true),
    field("DeviceType", "device_type", Str, true),
    field("UserCountry", "user_country", Str, true),
    field("SiteType", "site_type", Str, true),
    field("SlotType", "slot_type", Str, true),
    field("CheckInDate", "check_in_date", Date, true),
    field("LengthOfStay", "length_of_stay", Integer, true),
    field("AdvanceBookingWindow", "advance_booking_window", Integer, true),
    // Attributes
    field("HotelName", "hotel_name", Str, false),
    field("HotelCity", "hotel_city", Str, false),
    field("HotelStateRegion", "hotel_state_region", Str, false),
    field("HotelCountryCode", "hotel_country_code", Str, false),
    field("SubaccountName", "subaccount_name", Str, false),
    field("HotelGroup", "hotel_group", Str, false),
    field("TimePeriod", "time_period", DateTime, false),
    // Metrics
    field("Impressions", "impressions", Integer, false),
    field("EligibleImpressions", "eligible_impressions", Integer, false),
    field("MissedImpressions", "missed_impressions", Integer, false),
    field("Clicks", "clicks", Integer, false),
    field("Conversions", "conversions", Integer, false),
    field("Spend", "spend", Number, false),
    field("AverageCPC", "average_cpc", Number, false),
    field("CTR", "ctr", Number, false),
    field("ImpressionShare", "impression_share", Number, false),
    field("ClickShare", "click_share", Number, false),
    field("AveragePosition", "average_position", Number, false),
    field("ConversionRate", "conversion_rate", Number, false),
    field("Revenue", "revenue", Number, false),
    field("ROAS", "roas", Number, false),
];

static HOTEL_PERFORMANCE: LazyLock<FieldMapping> =
    LazyLock::new(|| FieldMapping::new(HOTEL_PERFORMANCE_FIELDS.to_vec()));

/// Lookup table over a set of [`FieldSpec`]s
#[derive(Debug, Clone)]
pub struct FieldMapping {
    fields: Vec<FieldSpec>,
    by_raw: HashMap<&'static str, usize>,
    by_canonical: HashMap<&'static str, usize>,
}

impl FieldMapping {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        let by_raw = fields.iter().enumerate().map(|(i, f)| (f.raw, i)).collect();
        let by_canonical = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.canonical, i))
            .collect();

        Self {
            fields,
            by_raw,
            by_canonical,
        }
    }

    /// The catalog for the hotel performance report
    pub fn hotel_performance() -> &'static FieldMapping {
        &HOTEL_PERFORMANCE
    }

    /// Look up a raw report column
    pub fn get(&self, raw: &str) -> Option<&FieldSpec> {
        self.by_raw.get(raw).map(|&i| &self.fields[i])
    }

    /// Look up a canonical field name
    pub fn by_canonical(&self, canonical: &str) -> Option<&FieldSpec> {
        self.by_canonical.get(canonical).map(|&i| &self.fields[i])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every raw column, in catalog order
    pub fn raw_columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.raw.to_string()).collect()
    }

    /// Canonical names of the dimension fields, in catalog order
    pub fn key_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.key)
            .map(|f| f.canonical.to_string())
            .collect()
    }
}
