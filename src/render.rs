use maud::{html, Markup};
use url::form_urlencoded;

use crate::models::ListingRecord;

const DEFAULT_BRAND_COLOR: &str = "0f172a";
const NO_CONCERNS: &str = "None mentioned";
const META_SEPARATOR: &str = " \u{2022} ";

/// Visual category of a tag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStyle {
    Info,
    Neutral,
    Warning,
}

impl TagStyle {
    fn class(self) -> &'static str {
        match self {
            TagStyle::Info => "tag",
            TagStyle::Neutral => "tag tag-option",
            TagStyle::Warning => "tag tag-concern",
        }
    }
}

// ── Formatting helpers ───────────────────────────────────────────────────────

/// `49000` → `"$49,000"`.
pub fn format_currency(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Exact, case-sensitive brand lookup.
pub fn brand_color(make: Option<&str>) -> &'static str {
    match make {
        Some("Porsche" | "Ferrari" | "Honda" | "Nissan" | "Mazda" | "Alfa Romeo") => "dc2626",
        Some("BMW" | "Volkswagen" | "Maserati") => "1e40af",
        Some("Mercedes" | "Mercedes-Benz" | "Lexus" | "Bentley" | "Rolls-Royce") => "1f2937",
        Some("Audi" | "Acura") => "374151",
        Some("Lamborghini" | "Chevrolet") => "eab308",
        Some("McLaren") => "ea580c",
        Some("Toyota" | "Jeep" | "Land Rover" | "Jaguar" | "Aston Martin") => "16a34a",
        Some("Ford" | "Subaru") => "2563eb",
        _ => DEFAULT_BRAND_COLOR,
    }
}

pub fn placeholder_image_url(make: Option<&str>, model: Option<&str>, year: Option<i32>) -> String {
    let make = present(make);
    let year = year.map(|y| y.to_string());
    let headline = [year.as_deref(), Some(make.unwrap_or("Vehicle"))]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let mut text = encode(&headline);
    if let Some(model) = present(model) {
        text.push_str("%0A");
        text.push_str(&encode(model));
    }
    format!(
        "https://placehold.co/400x280/{}/ffffff?text={}",
        brand_color(make),
        text
    )
}

/// Color, mileage and location joined in that order, skipping absent parts.
pub fn meta_line(record: &ListingRecord) -> Option<String> {
    let parts: Vec<&str> = [
        record.color.as_deref(),
        record.mileage.as_deref(),
        record.location.as_deref(),
    ]
    .into_iter()
    .filter_map(present)
    .collect();
    (!parts.is_empty()).then(|| parts.join(META_SEPARATOR))
}

/// Concerns to show, or `None` when the section is suppressed.
pub fn visible_concerns(record: &ListingRecord) -> Option<&[String]> {
    match record.concerns.first() {
        None => None,
        Some(first) if first == NO_CONCERNS => None,
        Some(_) => Some(&record.concerns),
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn encode(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

fn paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

// ── Markup ───────────────────────────────────────────────────────────────────

pub fn render(record: &ListingRecord) -> Markup {
    let specs = record.specs.clone().unwrap_or_default();
    let spec_cards = [
        ("Engine", specs.engine.as_deref()),
        ("Power", specs.power.as_deref()),
        ("Trans", specs.transmission.as_deref()),
        ("Drive", specs.drivetrain.as_deref()),
        ("Mileage", record.mileage.as_deref()),
    ];

    html! {
        section class="result" {
            h2 class="vehicle-title" { (record.title) }
            @if let Some(meta) = meta_line(record) {
                p class="vehicle-meta" { (meta) }
            }

            div class="result-grid" {
                div class="result-side" {
                    img class="vehicle-image"
                        src=(placeholder_image_url(record.make.as_deref(), record.model.as_deref(), record.year))
                        alt=(record.title);
                    div class="spec-grid" {
                        @for (label, value) in spec_cards {
                            @if let Some(value) = present(value) {
                                (spec_card(label, value))
                            }
                        }
                    }
                }
                div class="result-main" {
                    @if let Some(overview) = present(record.overview.as_deref()) {
                        p class="section-label" { "Overview" }
                        @for paragraph in paragraphs(overview) {
                            p class="overview-text" { (paragraph) }
                        }
                    }
                }
            }

            @if !record.options.is_empty() {
                (tag_section("Options & Features", &record.options, TagStyle::Neutral))
            }
            @if !record.highlights.is_empty() {
                (tag_section("Highlights", &record.highlights, TagStyle::Info))
            }
            @if let Some(concerns) = visible_concerns(record) {
                (tag_section("Notes & Concerns", concerns, TagStyle::Warning))
            }

            hr;
            p class="section-label" { "Estimated Value" }
            div class="value-grid" {
                (value_card("Low", record.values.low, false))
                (value_card("Medium", record.values.medium, true))
                (value_card("High", record.values.high, false))
            }
            @if let Some(factors) = present(record.value_factors.as_deref()) {
                p class="value-factors" { (factors) }
            }
        }
    }
}

fn spec_card(label: &str, value: &str) -> Markup {
    html! {
        div class="spec-card" {
            div class="spec-label" { (label) }
            div class="spec-value" { (value) }
        }
    }
}

pub fn tag_section(label: &str, items: &[String], style: TagStyle) -> Markup {
    html! {
        hr;
        p class="section-label" { (label) }
        div class="tags" {
            @for item in items {
                span class=(style.class()) { (item) }
            }
        }
    }
}

fn value_card(label: &str, amount: u64, emphasized: bool) -> Markup {
    html! {
        div.value-card.value-card-medium[emphasized] {
            div class="value-amount" { (format_currency(amount)) }
            div class="value-label" { (label) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Specs, ValueEstimates};

    fn record() -> ListingRecord {
        ListingRecord {
            title: "2003 Porsche 911 Carrera 4S".to_string(),
            year: Some(2003),
            make: Some("Porsche".to_string()),
            model: Some("911 Carrera 4S".to_string()),
            color: Some("Guards Red".to_string()),
            location: Some("Austin, TX".to_string()),
            specs: Some(Specs {
                engine: Some("3.6L flat-six".to_string()),
                power: None,
                torque: None,
                transmission: Some("6-speed manual".to_string()),
                drivetrain: Some("AWD".to_string()),
            }),
            mileage: Some("41,000 miles".to_string()),
            options: vec!["Sport seats".to_string(), "Sunroof delete".to_string()],
            highlights: vec!["IMS bearing replaced".to_string()],
            concerns: vec!["None mentioned".to_string()],
            overview: Some("First paragraph.\n\nSecond paragraph.".to_string()),
            values: ValueEstimates { low: 44500, medium: 49000, high: 55000 },
            value_factors: Some("Low mileage manual".to_string()),
        }
    }

    #[test]
    fn currency_is_thousands_grouped() {
        assert_eq!(format_currency(0), "$0");
        assert_eq!(format_currency(999), "$999");
        assert_eq!(format_currency(49000), "$49,000");
        assert_eq!(format_currency(1_500_000), "$1,500,000");
    }

    #[test]
    fn brand_lookup_is_exact() {
        assert_eq!(brand_color(Some("Porsche")), "dc2626");
        assert_eq!(brand_color(Some("Land Rover")), "16a34a");
        assert_eq!(brand_color(Some("porsche")), DEFAULT_BRAND_COLOR);
        assert_eq!(brand_color(Some("Tesla")), DEFAULT_BRAND_COLOR);
        assert_eq!(brand_color(None), DEFAULT_BRAND_COLOR);
    }

    #[test]
    fn placeholder_embeds_encoded_year_make_model() {
        assert_eq!(
            placeholder_image_url(Some("Porsche"), Some("911 Carrera 4S"), Some(2003)),
            "https://placehold.co/400x280/dc2626/ffffff?text=2003+Porsche%0A911+Carrera+4S"
        );
        assert_eq!(
            placeholder_image_url(None, None, None),
            "https://placehold.co/400x280/0f172a/ffffff?text=Vehicle"
        );
    }

    #[test]
    fn meta_line_keeps_order_and_skips_missing() {
        let mut r = record();
        assert_eq!(
            meta_line(&r).as_deref(),
            Some("Guards Red \u{2022} 41,000 miles \u{2022} Austin, TX")
        );
        r.mileage = None;
        r.color = Some("  ".to_string());
        assert_eq!(meta_line(&r).as_deref(), Some("Austin, TX"));
        r.location = None;
        assert_eq!(meta_line(&r), None);
    }

    #[test]
    fn none_mentioned_suppresses_concerns() {
        let html = render(&record()).into_string();
        assert!(!html.contains("Notes &amp; Concerns"));
        assert!(!html.contains("tag-concern"));
    }

    #[test]
    fn single_concern_renders_one_warning_tag() {
        let mut r = record();
        r.concerns = vec!["Rust on rear quarter".to_string()];
        let html = render(&r).into_string();
        assert!(html.contains("Notes &amp; Concerns"));
        assert_eq!(html.matches("class=\"tag tag-concern\"").count(), 1);
        assert!(html.contains("Rust on rear quarter"));
    }

    #[test]
    fn value_cards_render_in_order_with_medium_emphasized() {
        let html = render(&record()).into_string();
        let low = html.find("$44,500").unwrap();
        let medium = html.find("$49,000").unwrap();
        let high = html.find("$55,000").unwrap();
        assert!(low < medium && medium < high);

        let emphasized = html.find("value-card value-card-medium").unwrap();
        assert!(low < emphasized && emphasized < medium);
        assert_eq!(html.matches("value-card-medium").count(), 1);
    }

    #[test]
    fn missing_fields_are_omitted() {
        let mut r = record();
        r.specs = None;
        r.mileage = None;
        r.overview = None;
        r.options.clear();
        r.value_factors = None;
        let html = render(&r).into_string();
        assert!(!html.contains("spec-card"));
        assert!(!html.contains("Overview"));
        assert!(!html.contains("Options &amp; Features"));
        assert!(!html.contains("value-factors"));
        assert!(html.contains("Highlights"));
    }

    #[test]
    fn text_is_escaped() {
        let mut r = record();
        r.title = "<script>alert(1)</script>".to_string();
        let html = render(&r).into_string();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn overview_is_split_into_paragraphs() {
        let html = render(&record()).into_string();
        assert_eq!(html.matches("class=\"overview-text\"").count(), 2);
    }
}
