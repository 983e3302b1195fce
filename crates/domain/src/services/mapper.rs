//! Raw remote job to [`JobRecord`] mapping.
//!
//! The remote API returns loosely-structured JSON with many optional nested
//! paths, and webhook payloads carry arbitrary subsets of it. `map_job` is a
//! total extraction pass over that document: it never fails, every field has
//! a documented default (empty string for scalars, JSON null for raw
//! captures), and the same input always produces a byte-identical record.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::job::{JobAdSection, JobProperty, JobRecord};

/// Base URL for the public apply page, keyed by reference number.
const APPLY_URL_BASE: &str = "https://jobs.smartrecruiters.com/";

/// Map a raw remote job document into a [`JobRecord`].
pub fn map_job(raw: &Value) -> JobRecord {
    let location = &raw["location"];
    let job_ad = job_ad_object(raw);
    let sections = job_ad_sections(&job_ad);
    let properties = collect_properties(&raw["properties"]);

    JobRecord {
        external_id: scalar_string(&raw["id"]),

        title: text(&raw["title"]),
        ref_number: text(&raw["refNumber"]),
        status: text(&raw["status"]),
        posting_status: text(&raw["postingStatus"]),
        department: text(&raw["department"]["label"]),
        language: text(&raw["language"]["label"]),
        experience_level: experience_level_label(&raw["experienceLevel"]),
        experience_level_raw: raw["experienceLevel"].clone(),
        employment_type: text(&raw["typeOfEmployment"]["label"]),

        location_display: format_location(location),
        city: text(&location["city"]),
        country_code: text(&location["countryCode"]),
        region_code: text(&location["regionCode"]),
        postal_code: postal_code(location),
        remote: if is_remote(&location["remote"]) {
            "REMOTE".to_string()
        } else {
            "ONSITE".to_string()
        },
        location_raw: location.clone(),

        description: format_description(raw),
        company_description: section(&sections, "companyDescription"),
        job_description: section(&sections, "jobDescription"),
        qualifications: section(&sections, "qualifications"),
        additional_information: section(&sections, "additionalInformation"),
        video_urls: video_urls(&sections),
        job_ad_raw: job_ad,

        actions_raw: raw["actions"].clone(),
        details_url: text(&raw["actions"]["details"]["url"]),
        apply_url: apply_url(&raw["refNumber"]),
        apply_on_web_url: text(&raw["actions"]["applyOnWeb"]["url"]),

        properties,
        properties_raw: raw["properties"].clone(),
        partners: partners_label(&raw["properties"]),

        summary_raw: Value::Null,
        created_on: text(&raw["createdOn"]),
        updated_on: text(&raw["updatedOn"]),
        last_activity_on: text(&raw["lastActivityOn"]),
        target_hiring_date: text(&raw["targetHiringDate"]),
    }
}

/// Sanitize a property key into `[a-z0-9_-]` the way the store addresses it.
pub fn sanitize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

/// A string as-is, or a number rendered as a string.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// `experienceLevel` shows up both as an object and as a bare string.
fn experience_level_label(value: &Value) -> String {
    match value {
        Value::Object(_) => text(&value["label"]),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn postal_code(location: &Value) -> String {
    let postal = text(&location["postalCode"]);
    if postal.is_empty() {
        text(&location["zipCode"])
    } else {
        postal
    }
}

fn is_remote(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        _ => false,
    }
}

/// "city, regionCode, country" from whichever parts are present.
fn format_location(location: &Value) -> String {
    let parts: Vec<&str> = [
        location["city"].as_str(),
        location["regionCode"].as_str(),
        location["country"].as_str(),
    ]
    .into_iter()
    .flatten()
    .collect();
    parts.join(", ")
}

/// The job-ad object: `jobAd`, or the synonyms `jobAdSections` / `ad`.
/// First non-empty wins.
fn job_ad_object(raw: &Value) -> Value {
    for key in ["jobAd", "jobAdSections", "ad"] {
        if raw[key].as_object().is_some_and(|map| !map.is_empty()) {
            return raw[key].clone();
        }
    }
    Value::Null
}

/// The sections map inside a job-ad object; a bare sections map (the
/// `jobAdSections` shape) is accepted as-is.
fn job_ad_sections(job_ad: &Value) -> Value {
    if job_ad["sections"].as_object().is_some_and(|map| !map.is_empty()) {
        job_ad["sections"].clone()
    } else {
        job_ad.clone()
    }
}

fn section(sections: &Value, name: &str) -> JobAdSection {
    JobAdSection {
        title: text(&sections[name]["title"]),
        text: text(&sections[name]["text"]),
    }
}

fn video_urls(sections: &Value) -> Vec<String> {
    sections["videos"]["urls"]
        .as_array()
        .map(|urls| urls.iter().filter_map(|u| u.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn apply_url(ref_number: &Value) -> String {
    match ref_number.as_str() {
        Some(ref_number) if !ref_number.is_empty() => format!("{APPLY_URL_BASE}{ref_number}"),
        _ => String::new(),
    }
}

fn collect_properties(properties: &Value) -> BTreeMap<String, JobProperty> {
    let mut collected = BTreeMap::new();
    let Some(entries) = properties.as_array() else {
        return collected;
    };
    for entry in entries {
        let Some(key) = entry["key"].as_str() else {
            continue;
        };
        if entry["value"].is_null() {
            continue;
        }
        let sanitized = sanitize_key(key);
        if sanitized.is_empty() {
            continue;
        }
        collected.insert(
            sanitized,
            JobProperty {
                label: text(&entry["value"]["label"]),
                id: scalar_string(&entry["value"]["id"]),
                raw: entry.clone(),
            },
        );
    }
    collected
}

fn partners_label(properties: &Value) -> String {
    let Some(entries) = properties.as_array() else {
        return String::new();
    };
    entries
        .iter()
        .find(|entry| entry["key"].as_str() == Some("Partners"))
        .map(|entry| text(&entry["value"]["label"]))
        .unwrap_or_default()
}

/// Compose the HTML description shown on the listing.
fn format_description(raw: &Value) -> String {
    let mut description = String::from("<h3>Job Information</h3>");
    let field = |label: &str, value: &Value| {
        format!(
            "<p><strong>{}:</strong> {}</p>",
            label,
            value.as_str().filter(|s| !s.is_empty()).unwrap_or("N/A")
        )
    };
    description.push_str(&field("Title", &raw["title"]));
    description.push_str(&field("Reference Number", &raw["refNumber"]));
    description.push_str(&field("Status", &raw["status"]));
    description.push_str(&field("Posting Status", &raw["postingStatus"]));
    if let Some(department) = raw["department"]["label"].as_str() {
        description.push_str(&format!("<p><strong>Department:</strong> {department}</p>"));
    }
    let location = format_location(&raw["location"]);
    if !location.is_empty() {
        description.push_str(&format!("<p><strong>Location:</strong> {location}</p>"));
    }
    if let Some(language) = raw["language"]["label"].as_str() {
        description.push_str(&format!("<p><strong>Language:</strong> {language}</p>"));
    }
    if let Some(created) = raw["createdOn"].as_str() {
        description.push_str(&format!(
            "<p><strong>Created:</strong> {}</p>",
            format_timestamp(created)
        ));
    }
    if let Some(updated) = raw["updatedOn"].as_str() {
        description.push_str(&format!(
            "<p><strong>Last Updated:</strong> {}</p>",
            format_timestamp(updated)
        ));
    }
    description
}

/// Render an RFC 3339 timestamp as `YYYY-MM-DD HH:MM:SS`, falling back to
/// the raw value when it does not parse.
fn format_timestamp(value: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| value.to_string())
}
