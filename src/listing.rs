use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder for a field the source page did not provide.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Column order of a persisted listing; `description` is appended when present.
pub const COLUMNS: [&str; 9] = [
    "title",
    "company",
    "location",
    "duration",
    "post_date",
    "deadline",
    "field",
    "url",
    "page_number",
];

fn not_specified() -> String {
    NOT_SPECIFIED.to_string()
}

/// True when `value` holds real data rather than the placeholder.
pub fn is_specified(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != NOT_SPECIFIED
}

// Null and blank cells load as the placeholder.
fn string_or_sentinel<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(not_specified))
}

/// One traineeship posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub title: String,
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub company: String,
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub location: String,
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub duration: String,
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub post_date: String,
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub deadline: String,
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub field: String,
    #[serde(default = "not_specified", deserialize_with = "string_or_sentinel")]
    pub url: String,
    #[serde(default)]
    pub page_number: u32,
    /// `None` until the detail page has been consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Listing {
    /// A listing with every optional field set to the placeholder.
    pub fn new(title: impl Into<String>, url: impl Into<String>, page_number: u32) -> Self {
        Listing {
            title: title.into(),
            company: not_specified(),
            location: not_specified(),
            duration: not_specified(),
            post_date: not_specified(),
            deadline: not_specified(),
            field: not_specified(),
            url: url.into(),
            page_number,
            description: None,
        }
    }

    /// Rewrites blank string fields to the placeholder.
    pub fn fill_missing(&mut self) {
        for value in [
            &mut self.title,
            &mut self.company,
            &mut self.location,
            &mut self.duration,
            &mut self.post_date,
            &mut self.deadline,
            &mut self.field,
            &mut self.url,
        ] {
            if value.trim().is_empty() {
                *value = not_specified();
            }
        }
        if let Some(description) = &mut self.description {
            if description.trim().is_empty() {
                *description = not_specified();
            }
        }
    }

    /// Cell values in `COLUMNS` order, plus description when requested.
    pub fn row(&self, with_description: bool) -> Vec<String> {
        let mut row = vec![
            self.title.clone(),
            self.company.clone(),
            self.location.clone(),
            self.duration.clone(),
            self.post_date.clone(),
            self.deadline.clone(),
            self.field.clone(),
            self.url.clone(),
            self.page_number.to_string(),
        ];
        if with_description {
            row.push(self.description.clone().unwrap_or_else(not_specified));
        }
        row
    }

    /// Flattened text used for scoring.
    pub fn job_text(&self) -> String {
        format!(
            "Title: {}. Company: {}. Field: {}. Description: {}",
            self.title,
            self.company,
            self.field,
            self.description.as_deref().unwrap_or("")
        )
    }
}

/// Header row for a collection: the fixed columns plus `description` if any
/// listing carries one.
pub fn header(listings: &[Listing]) -> (Vec<String>, bool) {
    let with_description = listings.iter().any(|l| l.description.is_some());
    let mut header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    if with_description {
        header.push("description".to_string());
    }
    (header, with_description)
}

/// Supplementary values read from a listing's detail page.
/// `None` means the detail page had nothing for that field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Details {
    pub post_date: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
}

/// Fills the listing's missing fields from `incoming`. Values already
/// scraped from the index page are never replaced.
pub fn merge(mut base: Listing, incoming: &Details) -> Listing {
    fn fill(slot: &mut String, value: &Option<String>) {
        if !is_specified(slot) {
            *slot = value.clone().unwrap_or_else(not_specified);
        }
    }

    fill(&mut base.post_date, &incoming.post_date);
    fill(&mut base.duration, &incoming.duration);

    let description = base.description.get_or_insert_with(not_specified);
    fill(description, &incoming.description);

    base
}
