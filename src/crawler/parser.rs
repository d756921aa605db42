use scraper::{Html, Selector};
use serde::Deserialize;

use crate::crawler::models::{DetailFields, ListingSummary};
use crate::error::{FetchError, PartialExtractionError};

#[derive(Deserialize)]
struct RankEnvelope {
    data: Option<RankData>,
}

#[derive(Deserialize)]
struct RankData {
    list: Option<Vec<ListingSummary>>,
}

/// Decode a ranking response body into its listing summaries. The page
/// lives at `data.list`; a body that parses but lacks that path is as
/// broken as one that doesn't parse at all.
pub fn parse_rank_page(body: &str) -> Result<Vec<ListingSummary>, FetchError> {
    let envelope: RankEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::Schema(format!("malformed ranking response: {e}")))?;

    envelope
        .data
        .and_then(|d| d.list)
        .ok_or_else(|| FetchError::Schema("ranking response has no data.list".to_string()))
}

/// Detail rows are anchored by `data-row-anchor`; the value sits in the
/// row's second cell. Pairs are (page anchor, record field name).
const DETAIL_ANCHORS: [(&str, &str); 4] = [
    ("jb", "carModel"),
    ("fuel_form", "energyType"),
    ("market_time", "marketTime"),
    ("period", "insure"),
];

/// Extract the four labeled detail fields from a detail page. Every
/// missing anchor is reported by its record field name; the caller skips
/// the listing but keeps the rest of the page going.
pub fn extract_detail_fields(
    html: &str,
    series_id: u64,
) -> Result<DetailFields, PartialExtractionError> {
    let doc = Html::parse_document(html);

    let mut values = Vec::with_capacity(DETAIL_ANCHORS.len());
    let mut missing = Vec::new();
    for (anchor, field) in DETAIL_ANCHORS {
        match anchor_value(&doc, anchor) {
            Some(value) => values.push(value),
            None => missing.push(field),
        }
    }

    if !missing.is_empty() {
        return Err(PartialExtractionError { series_id, missing });
    }

    let mut values = values.into_iter();
    Ok(DetailFields {
        car_model: values.next().unwrap(),
        energy_type: values.next().unwrap(),
        market_time: values.next().unwrap(),
        insure: values.next().unwrap(),
    })
}

fn anchor_value(doc: &Html, anchor: &str) -> Option<String> {
    let selector =
        Selector::parse(&format!("div[data-row-anchor=\"{anchor}\"] > div:nth-child(2) > div"))
            .unwrap();

    let cell = doc.select(&selector).next()?;
    let text = cell.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_row(anchor: &str, value: &str) -> String {
        format!(
            "<div data-row-anchor=\"{anchor}\"><div><label>{anchor}</label></div>\
             <div><div>{value}</div></div></div>"
        )
    }

    fn detail_page(rows: &[(&str, &str)]) -> String {
        let body: String = rows.iter().map(|(a, v)| detail_row(a, v)).collect();
        format!("<html><body>{body}</body></html>")
    }

    #[test]
    fn parses_full_envelope() {
        let body = r#"{
            "data": {
                "list": [{
                    "brand_name": "比亚迪",
                    "series_name": "秦PLUS",
                    "image": "https://img.example.com/qin.webp",
                    "count": 20456,
                    "min_price": 7.98,
                    "max_price": 14.58,
                    "sub_brand_name": "比亚迪王朝网",
                    "rank": 2,
                    "series_id": 4180
                }]
            }
        }"#;

        let page = parse_rank_page(body).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].series_name, "秦PLUS");
        assert_eq!(page[0].series_id, 4180);
        assert_eq!(page[0].min_price, 7.98);
    }

    #[test]
    fn empty_list_is_a_valid_page() {
        let page = parse_rank_page(r#"{"data":{"list":[]}}"#).unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn missing_envelope_path_is_a_schema_error() {
        let err = parse_rank_page(r#"{"data":{}}"#).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));

        let err = parse_rank_page("<html>not json</html>").unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
    }

    #[test]
    fn extracts_all_four_fields() {
        let html = detail_page(&[
            ("jb", "紧凑型车"),
            ("fuel_form", "插电式混合动力"),
            ("market_time", "2023.02"),
            ("period", "整车质保6年或15万公里"),
        ]);

        let fields = extract_detail_fields(&html, 4180).unwrap();
        assert_eq!(fields.car_model, "紧凑型车");
        assert_eq!(fields.energy_type, "插电式混合动力");
        assert_eq!(fields.market_time, "2023.02");
        assert_eq!(fields.insure, "整车质保6年或15万公里");
    }

    #[test]
    fn missing_period_anchor_names_insure() {
        let html = detail_page(&[
            ("jb", "SUV"),
            ("fuel_form", "汽油"),
            ("market_time", "2021.06"),
        ]);

        let err = extract_detail_fields(&html, 99).unwrap_err();
        assert_eq!(err.series_id, 99);
        assert_eq!(err.missing, vec!["insure"]);
    }

    #[test]
    fn all_missing_anchors_are_named() {
        let html = detail_page(&[("market_time", "2022.09")]);

        let err = extract_detail_fields(&html, 7).unwrap_err();
        assert_eq!(err.missing, vec!["carModel", "energyType", "insure"]);
    }

    #[test]
    fn empty_value_cell_counts_as_missing() {
        let html = detail_page(&[
            ("jb", "SUV"),
            ("fuel_form", "  "),
            ("market_time", "2021.06"),
            ("period", "3年"),
        ]);

        let err = extract_detail_fields(&html, 12).unwrap_err();
        assert_eq!(err.missing, vec!["energyType"]);
    }
}
