use crate::record::Record;
use chrono::NaiveDate;
use std::borrow::Cow;

pub const UTF8_BOM: &str = "\u{feff}";

/// One exported column: a record path (`name`, `course.name`) and its header label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: Cow<'static, str>,
    pub label: Cow<'static, str>,
}

impl Column {
    pub const fn new(key: &'static str, label: &'static str) -> Self {
        Self {
            key: Cow::Borrowed(key),
            label: Cow::Borrowed(label),
        }
    }

    pub fn owned(key: String, label: String) -> Self {
        Self {
            key: Cow::Owned(key),
            label: Cow::Owned(label),
        }
    }
}

/// Header row of labels, then one row per record in input order.
/// Fields holding the delimiter, a quote or a line break are quoted with
/// internal quotes doubled; missing fields are empty.
pub fn to_delimited_text(
    records: &[Record],
    columns: &[Column],
    delimiter: u8,
) -> anyhow::Result<String> {
    let mut w = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    w.write_record(columns.iter().map(|c| c.label.as_ref()))?;
    for rec in records {
        w.write_record(
            columns
                .iter()
                .map(|c| rec.text(&c.key).unwrap_or_default()),
        )?;
    }
    let bytes = w
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush export: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// `<report>-<YYYY-MM-DD>.csv`
pub fn export_file_name(report: &str, date: NaiveDate) -> String {
    let slug: String = report
        .trim()
        .chars()
        .flat_map(|c| {
            let keep = c.is_alphanumeric() || c == '-' || c == '_';
            let out: Vec<char> = if keep {
                c.to_lowercase().collect()
            } else {
                vec!['-']
            };
            out
        })
        .collect();
    let slug = if slug.chars().all(|c| c == '-') {
        "export".to_string()
    } else {
        slug
    };
    format!("{}-{}.csv", slug, date.format("%Y-%m-%d"))
}

pub fn with_bom(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + UTF8_BOM.len());
    out.push_str(UTF8_BOM);
    out.push_str(text);
    out
}
