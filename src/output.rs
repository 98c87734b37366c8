//! Writes the final lead set to disk in JSON, CSV and plain email-list formats.

use crate::error::Result;
use crate::models::Lead;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const LEAD_CSV_HEADER: [&str; 9] = [
    "url",
    "name",
    "title",
    "email",
    "linkedin",
    "company",
    "phone",
    "source_page",
    "confidence",
];

/// Paths of the files written by [`save_results`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub txt: PathBuf,
    pub emails_csv: PathBuf,
}

/// Quotes a CSV field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields.into_iter().map(csv_field).collect::<Vec<_>>().join(",")
}

fn lead_row(lead: &Lead) -> String {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    let confidence = lead.confidence.to_string();
    let values = [
        lead.url.clone(),
        opt(&lead.name),
        opt(&lead.title),
        opt(&lead.email),
        opt(&lead.linkedin),
        opt(&lead.company),
        opt(&lead.phone),
        opt(&lead.source_page),
        confidence,
    ];
    csv_row(values.iter().map(String::as_str))
}

fn write_lines(path: &Path, lines: impl IntoIterator<Item = String>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Saves leads as `<base>.json`, `<base>.csv`, `<base>_emails.txt` and
/// `<base>_emails.csv` inside `output_dir`, creating the directory if needed.
///
/// # Returns
/// * `Result<OutputFiles>` with the paths written.
pub(crate) fn save_results(leads: &[Lead], output_dir: &Path, base_filename: &str) -> Result<OutputFiles> {
    fs::create_dir_all(output_dir)?;

    let files = OutputFiles {
        json: output_dir.join(format!("{}.json", base_filename)),
        csv: output_dir.join(format!("{}.csv", base_filename)),
        txt: output_dir.join(format!("{}_emails.txt", base_filename)),
        emails_csv: output_dir.join(format!("{}_emails.csv", base_filename)),
    };

    fs::write(&files.json, serde_json::to_string_pretty(leads)?)?;
    tracing::info!("Saved JSON: {}", files.json.display());

    let rows = std::iter::once(csv_row(LEAD_CSV_HEADER)).chain(leads.iter().map(lead_row));
    write_lines(&files.csv, rows)?;
    tracing::info!("Saved CSV: {}", files.csv.display());

    let emails = || leads.iter().filter_map(|l| l.email.as_deref()).filter(|e| !e.is_empty());

    write_lines(&files.txt, emails().map(str::to_string))?;
    tracing::info!("Saved TXT: {}", files.txt.display());

    let email_rows = std::iter::once("email".to_string()).chain(emails().map(csv_field));
    write_lines(&files.emails_csv, email_rows)?;
    tracing::info!("Saved emails CSV: {}", files.emails_csv.display());

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(email: &str, name: Option<&str>) -> Lead {
        Lead {
            url: "https://x.com/team".to_string(),
            name: name.map(str::to_string),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Lee, Ann"), "\"Lee, Ann\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_save_results_writes_all_formats() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let leads = vec![lead("ann@x.com", Some("Lee, Ann")), lead("bo@x.com", None)];

        let files = save_results(&leads, &out, "acme").unwrap();
        assert_eq!(files.json, out.join("acme.json"));

        let json: Vec<Lead> = serde_json::from_str(&fs::read_to_string(&files.json).unwrap()).unwrap();
        assert_eq!(json, leads);

        let csv = fs::read_to_string(&files.csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("url,name,title,email,linkedin,company,phone,source_page,confidence")
        );
        assert_eq!(lines.next(), Some("https://x.com/team,\"Lee, Ann\",,ann@x.com,,,,,0"));
        assert_eq!(lines.next(), Some("https://x.com/team,,,bo@x.com,,,,,0"));

        assert_eq!(fs::read_to_string(&files.txt).unwrap(), "ann@x.com\nbo@x.com\n");
        assert_eq!(
            fs::read_to_string(&files.emails_csv).unwrap(),
            "email\nann@x.com\nbo@x.com\n"
        );
    }
}
