use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One item of the ranking page's `data.list` array. Transient: consumed
/// by the detail fetch and assembler, never persisted on its own.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingSummary {
    pub brand_name: String,
    pub series_name: String,
    pub image: String,
    /// Sale volume for the ranking period.
    pub count: u64,
    pub min_price: f64,
    pub max_price: f64,
    pub sub_brand_name: String,
    pub rank: u32,
    pub series_id: u64,
}

/// The four labeled fields scraped off a detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFields {
    pub car_model: String,
    pub energy_type: String,
    pub market_time: String,
    pub insure: String,
}

/// Raw (min, max) price pair. On the wire (the CSV sink) this is a single
/// field holding a two-element JSON array, e.g. `[12.98, 18.98]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePair {
    pub min: f64,
    pub max: f64,
}

impl Serialize for PricePair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("[{}, {}]", self.min, self.max))
    }
}

impl<'de> Deserialize<'de> for PricePair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let pair: [f64; 2] = serde_json::from_str(&raw).map_err(serde::de::Error::custom)?;
        Ok(PricePair { min: pair[0], max: pair[1] })
    }
}

/// The durable unit: one fully extracted car per row of the sink.
/// All eleven fields are present before a record is ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    pub brand: String,
    #[serde(rename = "carName")]
    pub car_name: String,
    #[serde(rename = "carImg")]
    pub car_img: String,
    #[serde(rename = "saleVolume")]
    pub sale_volume: u64,
    pub price: PricePair,
    pub manufacturer: String,
    pub rank: u32,
    #[serde(rename = "carModel")]
    pub car_model: String,
    #[serde(rename = "energyType")]
    pub energy_type: String,
    #[serde(rename = "marketTime")]
    pub market_time: String,
    pub insure: String,
}

impl CarRecord {
    /// Pure merge of a listing summary with its detail fields. The price
    /// pair is carried as raw numbers; any formatting or averaging is the
    /// aggregation layer's job.
    pub fn assemble(summary: &ListingSummary, details: DetailFields) -> Self {
        Self {
            brand: summary.brand_name.clone(),
            car_name: summary.series_name.clone(),
            car_img: summary.image.clone(),
            sale_volume: summary.count,
            price: PricePair {
                min: summary.min_price,
                max: summary.max_price,
            },
            manufacturer: summary.sub_brand_name.clone(),
            rank: summary.rank,
            car_model: details.car_model,
            energy_type: details.energy_type,
            market_time: details.market_time,
            insure: details.insure,
        }
    }

    /// Parse a raw sink row. `None` when the row's shape or numeric
    /// fields don't hold up; the ingestion pass counts those as skipped.
    pub fn from_row(row: &csv::StringRecord) -> Option<Self> {
        if row.len() != 11 {
            return None;
        }
        let price: [f64; 2] = serde_json::from_str(row.get(4)?).ok()?;
        Some(Self {
            brand: row.get(0)?.to_string(),
            car_name: row.get(1)?.to_string(),
            car_img: row.get(2)?.to_string(),
            sale_volume: row.get(3)?.trim().parse().ok()?,
            price: PricePair {
                min: price[0],
                max: price[1],
            },
            manufacturer: row.get(5)?.to_string(),
            rank: row.get(6)?.trim().parse().ok()?,
            car_model: row.get(7)?.to_string(),
            energy_type: row.get(8)?.to_string(),
            market_time: row.get(9)?.to_string(),
            insure: row.get(10)?.to_string(),
        })
    }
}
